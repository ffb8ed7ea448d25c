//! End-to-end scenarios for the empirical line pipeline

use ndarray::Array3;
use segelm_algorithms::prelude::*;
use tracing_subscriber::EnvFilter;

const REGION_A: [f64; 4] = [10.0, 20.0, 30.0, 40.0];
const REGION_B: [f64; 4] = [50.0, 60.0, 70.0, 80.0];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 20x20, 4 bands: columns < 10 carry region A, the rest region B
fn two_region_cube() -> RasterCube {
    RasterCube::from_fn(20, 20, 4, |(_, c, b)| if c < 10 { REGION_A[b] } else { REGION_B[b] }).unwrap()
}

/// Exact retrieval `2x + 1` observed on both region spectra for every segment
fn affine_samples(segments: usize) -> ExactSamples {
    let inputs = Array3::from_shape_fn((2, segments, 4), |(o, _, b)| if o == 0 { REGION_A[b] } else { REGION_B[b] });
    let outputs = inputs.mapv(|x| 2.0 * x + 1.0);
    ExactSamples::new(inputs, outputs).unwrap()
}

/// Exact retrieval `2x + 1` applied to each segment's mean spectrum
fn retrieve_at_means(scene: &PreparedScene) -> Result<ExactSamples> {
    let means = scene.mean_spectra()?;
    let outputs = means.mapv(|x| 2.0 * x + 1.0);
    ExactSamples::from_segment_spectra(means, outputs)
}

fn pipeline(config: PipelineConfig) -> EmpiricalLinePipeline {
    EmpiricalLinePipeline::new(config).unwrap()
}

#[test]
fn two_region_scene_is_reconstructed_exactly() {
    init_tracing();
    let cube = two_region_cube();
    let elm = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    });

    let scene = elm.prepare(&cube, None).unwrap();
    assert!(scene.n_segments() >= 2);

    let result = scene.apply(affine_samples(scene.n_segments()), |_, _| {}).unwrap();
    assert_eq!(result.n_segments, scene.n_segments());
    assert_eq!(result.coefficients.total_degenerate(), 0);

    let output = result.to_cube().unwrap();
    assert_eq!(output.shape(), (20, 20, 4));
    for ((r, c, b), &v) in output.view().indexed_iter() {
        let x = cube.view()[[r, c, b]];
        assert_eq!(v, 2.0 * x + 1.0, "pixel ({r}, {c}) band {b}");
    }
}

#[test]
fn run_with_mean_spectrum_retrieval() {
    init_tracing();
    let cube = two_region_cube();
    let elm = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    });

    let result = elm.run(&cube, None, retrieve_at_means).unwrap();
    let expected = cube.flatten().data().mapv(|x| 2.0 * x + 1.0);
    assert_eq!(result.output.data(), &expected);
}

#[test]
fn every_pixel_carries_one_label() {
    let cube = two_region_cube();
    let scene = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    })
    .prepare(&cube, None)
    .unwrap();

    let labels = scene.labels();
    assert_eq!(labels.shape(), (20, 20));
    assert!(labels.data().iter().all(|&l| scene.registry().dense_id(l).is_some()));
    let pixels: usize = (0..scene.n_segments()).map(|i| scene.registry().pixel_count(i)).sum();
    assert_eq!(pixels, 400);
}

#[test]
fn target_larger_than_pixel_count_gives_one_pixel_segments() {
    let cube = RasterCube::from_fn(3, 3, 2, |(r, c, b)| (r * 3 + c + b * 10) as f64).unwrap();
    let elm = pipeline(PipelineConfig {
        target_segments: 50,
        n_components: 2,
        ..Default::default()
    });

    let result = elm.run(&cube, None, retrieve_at_means).unwrap();
    assert_eq!(result.n_segments, 9);
    let expected = cube.flatten().data().mapv(|x| 2.0 * x + 1.0);
    assert_eq!(result.output.data(), &expected);
}

#[test]
fn masked_pixels_come_out_nan() {
    let cube = two_region_cube();
    let mut mask: Raster<u8> = Raster::filled(20, 20, 1);
    for r in 0..5 {
        for c in 0..20 {
            mask.set(r, c, 0).unwrap();
        }
    }

    let elm = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    });
    let scene = elm.prepare(&cube, Some(&mask)).unwrap();
    let result = scene.apply(affine_samples(scene.n_segments()), |_, _| {}).unwrap();

    let output = result.to_cube().unwrap();
    for r in 0..20 {
        for c in 0..20 {
            let px = output.spectrum(r, c).unwrap();
            if mask.is_valid(r, c) {
                let x = cube.spectrum(r, c).unwrap();
                assert_eq!(px, x.mapv(|v| 2.0 * v + 1.0));
            } else {
                assert!(px.iter().all(|v| v.is_nan()), "masked pixel ({r}, {c})");
            }
        }
    }
}

#[test]
fn excluded_label_is_not_reconstructed() {
    let cube = two_region_cube();
    let elm = pipeline(PipelineConfig {
        target_segments: 4,
        excluded_label: Some(0),
        ..Default::default()
    });
    let scene = elm.prepare(&cube, None).unwrap();
    assert_eq!(scene.registry().dense_id(0), None);

    let result = scene.apply(affine_samples(scene.n_segments()), |_, _| {}).unwrap();
    for ((r, c), label) in scene.labels().indexed_iter() {
        let px = result.output.pixel(r * 20 + c);
        assert_eq!(label == 0, px.iter().all(|v| v.is_nan()), "pixel ({r}, {c})");
    }
}

#[test]
fn parallel_matches_sequential() {
    let cube = two_region_cube();
    let sequential = pipeline(PipelineConfig {
        target_segments: 16,
        ..Default::default()
    })
    .run(&cube, None, retrieve_at_means)
    .unwrap();
    let pooled = pipeline(PipelineConfig {
        target_segments: 16,
        processes: 4,
        ..Default::default()
    })
    .run(&cube, None, retrieve_at_means)
    .unwrap();

    assert_eq!(sequential.coefficients, pooled.coefficients);
    assert_eq!(sequential.output, pooled.output);
}

#[test]
fn progress_counts_every_segment() {
    let cube = two_region_cube();
    let scene = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    })
    .prepare(&cube, None)
    .unwrap();

    let mut last = (0, 0);
    let mut calls = 0;
    scene
        .apply(affine_samples(scene.n_segments()), |done, total| {
            calls += 1;
            last = (done, total);
        })
        .unwrap();
    assert_eq!(calls, scene.n_segments());
    assert_eq!(last, (scene.n_segments(), scene.n_segments()));
}

#[test]
fn sample_table_must_match_segment_count() {
    let cube = two_region_cube();
    let scene = pipeline(PipelineConfig {
        target_segments: 4,
        ..Default::default()
    })
    .prepare(&cube, None)
    .unwrap();

    let err = scene.apply(affine_samples(scene.n_segments() + 1), |_, _| {}).unwrap_err();
    assert!(matches!(err, Error::SegmentCountMismatch { .. }), "{err}");
}

#[test]
fn config_from_json_drives_the_run() {
    let config = PipelineConfig::from_json_str(r#"{ "target_segments": 4, "neighbors": 3 }"#).unwrap();
    let result = pipeline(config).run(&two_region_cube(), None, retrieve_at_means).unwrap();
    assert!(result.n_segments >= 2);
}
