//! Pipeline configuration

use crate::estimation::EstimatorParams;
use crate::segmentation::{SegmentParams, SlicParams};
use segelm_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Every tunable of the empirical line pipeline.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Principal components the segmentation clusters on
    pub n_components: usize,
    /// Requested number of segments
    pub target_segments: usize,
    /// Maximum SLIC rounds
    pub max_iterations: usize,
    /// Minimum segment size relative to the nominal size
    pub min_size_factor: f64,
    /// Maximum segment size relative to the nominal size
    pub max_size_factor: f64,
    /// Neighboring segments pooled per fit, the segment itself included
    pub neighbors: usize,
    /// 1 runs the estimation sequentially, more uses a worker pool
    pub processes: usize,
    /// Label that never becomes a segment (e.g. a water class)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_label: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let segment = SegmentParams::default();
        let estimator = EstimatorParams::default();
        Self {
            n_components: segment.n_components,
            target_segments: segment.target_segments,
            max_iterations: segment.max_iterations,
            min_size_factor: segment.min_size_factor,
            max_size_factor: segment.max_size_factor,
            neighbors: estimator.neighbors,
            processes: estimator.processes,
            excluded_label: None,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check every value before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(Error::invalid_parameter("n_components", self.n_components, "must be at least 1"));
        }
        SlicParams {
            target_segments: self.target_segments,
            max_iterations: self.max_iterations,
            min_size_factor: self.min_size_factor,
            max_size_factor: self.max_size_factor,
            ..Default::default()
        }
        .validate()?;
        self.estimator_params().validate()
    }

    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            n_components: self.n_components,
            target_segments: self.target_segments,
            max_iterations: self.max_iterations,
            min_size_factor: self.min_size_factor,
            max_size_factor: self.max_size_factor,
        }
    }

    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams {
            neighbors: self.neighbors,
            processes: self.processes,
        }
    }
}
