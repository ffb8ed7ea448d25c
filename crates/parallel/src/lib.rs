//! # SegElm Parallel
//!
//! Execution strategies for independent per-segment work items.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential execution or a fixed-size worker pool,
//!   selected from a `processes` count
//! - `ParallelStrategy`: index-ordered fallible map over a range of work items

pub mod strategy;

pub use strategy::{ParallelStrategy, ProcessingMode};
