//! Palette sharing across animation frames.

mod common;

use std::collections::BTreeSet;

use common::{assert_partition, gradient, solid, stripes};
use image::RgbaImage;
use image_to_color_layers_wasm::{
    Algorithm, Error, ProcessingConfig, layer_animations, process_frames, process_rgba_image,
};
use palette::Srgb;
use pretty_assertions::assert_eq;

#[test]
fn all_frames_share_the_first_frame_palette() {
    let frames = vec![
        stripes(&[[200, 0, 0], [0, 0, 200], [0, 200, 0]], 3, 3),
        stripes(&[[190, 10, 0], [0, 0, 210], [210, 210, 210]], 3, 3),
        solid(9, 3, [5, 180, 20]),
    ];
    let config = ProcessingConfig::new(3).with_seed(9);
    let results = process_frames(&frames, &config).unwrap();

    let canonical = process_rgba_image(&frames[0], &config).unwrap().centroids;
    assert_eq!(results.len(), 3);
    for (frame, result) in frames.iter().zip(&results) {
        assert_eq!(result.centroids, canonical);
        assert_partition(frame, result);
    }
    // First frame is reclassified against its own palette
    assert_eq!(results[0].pixel_counts(), vec![9, 9, 9]);
}

#[test]
fn locked_colors_seed_the_shared_palette() {
    let frames = vec![gradient(6, 6), gradient(6, 6)];
    let config = ProcessingConfig::new(3)
        .with_algorithm(Algorithm::MedianCut)
        .with_locked_centroids(vec![Srgb::new(255, 255, 255)]);
    let results = process_frames(&frames, &config).unwrap();

    for result in &results {
        assert_eq!(result.centroids.len(), 3);
        assert_eq!(result.centroids[0], Srgb::new(255, 255, 255));
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn mismatched_frames_are_rejected() {
    let frames = vec![RgbaImage::new(4, 4), RgbaImage::new(4, 4), RgbaImage::new(4, 3)];
    let err = process_frames(&frames, &ProcessingConfig::default()).unwrap_err();
    assert_eq!(
        err,
        Error::FrameSizeMismatch {
            index: 2,
            width: 4,
            height: 3,
            expected_width: 4,
            expected_height: 4,
        }
    );
}

#[test]
fn repeated_palette_colors_get_distinct_outputs() {
    // k-means pads a one-color image by repeating that color
    let frames = vec![solid(4, 4, [120, 50, 200]), solid(4, 4, [120, 50, 200])];
    let config = ProcessingConfig::new(3).with_seed(1234);
    let results = process_frames(&frames, &config).unwrap();
    assert_eq!(results[0].centroids, vec![Srgb::new(120, 50, 200); 3]);

    let stems = results[0].layer_stems();
    assert_eq!(stems, vec!["00_7832c8", "01_7832c8", "02_7832c8"]);
    assert_eq!(stems.iter().collect::<BTreeSet<_>>().len(), 3);

    let animations = layer_animations(&results);
    assert_eq!(
        animations.iter().map(|(stem, _)| stem.clone()).collect::<Vec<_>>(),
        stems
    );
    for (i, (_, layers)) in animations.iter().enumerate() {
        assert_eq!(layers.len(), frames.len());
        for (frame, layer) in layers.iter().enumerate() {
            assert_eq!(**layer, results[frame].layers[i]);
        }
    }
    assert_eq!(results[1].pixel_counts(), vec![16, 0, 0]);
}
