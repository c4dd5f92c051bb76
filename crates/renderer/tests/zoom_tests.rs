//! Tests for zoom-dependent rendering.

use raster_common::{BoundingBox, NoDataValues, TileCoord};
use renderer::encode::encode_png;
use renderer::ramp::{RampConfig, RampResolver};
use renderer::zoom::{render_for_zoom, LayerStyle, RenderOutput, ZoomAdaptiveLayer, ZoomPolicy};
use std::sync::Arc;
use test_utils::gradient_dataset;

fn style() -> LayerStyle {
    LayerStyle::new(
        RampResolver::new(&RampConfig::equal_interval(
            0.0,
            100.0,
            ["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"],
        )),
        NoDataValues::default(),
    )
}

fn dataset() -> Arc<raster_common::RasterDataset> {
    Arc::new(gradient_dataset(
        40,
        50,
        BoundingBox::new(34.0, -5.0, 42.0, 5.0),
    ))
}

#[test]
fn test_low_zoom_is_smoothed_full_image() {
    test_utils::init_tracing();
    let ds = dataset();
    let out = render_for_zoom(&ds, &style(), 6, &ZoomPolicy::default()).unwrap();
    match out {
        RenderOutput::Overlay {
            image,
            bounds,
            smoothing,
        } => {
            assert!(smoothing);
            assert_eq!((image.width(), image.height()), (40, 50));
            assert_eq!(&bounds, ds.bounds());
        }
        RenderOutput::Tiled(_) => panic!("expected overlay"),
    }
}

#[test]
fn test_high_zoom_sharp_is_upscaled() {
    let ds = dataset();
    let out = render_for_zoom(&ds, &style(), 8, &ZoomPolicy::default()).unwrap();
    let image = out.image().unwrap();
    assert_eq!((image.width(), image.height()), (80, 100));
    assert_eq!(image.pixel(0, 0), image.pixel(1, 1));
    assert!(matches!(out, RenderOutput::Overlay { smoothing: false, .. }));
}

#[test]
fn test_high_zoom_tiled() {
    let ds = dataset();
    let out = render_for_zoom(&ds, &style(), 9, &ZoomPolicy::tiled()).unwrap();
    let RenderOutput::Tiled(tiles) = out else {
        panic!("expected tiles");
    };
    assert_eq!(tiles.zoom_range(), (5, 18));

    let covering = tiles.covering_tiles(6);
    assert!(!covering.is_empty());
    let opaque: usize = covering
        .iter()
        .map(|c| tiles.tile(*c).unwrap().opaque_count())
        .sum();
    assert!(opaque > 0);

    // outside the tiled zoom range
    let coarse = tiles.tile(TileCoord::new(2, 2, 1)).unwrap();
    assert!(coarse.is_fully_transparent());
    assert!(tiles.covering_tiles(2).is_empty());
}

#[test]
fn test_tiled_layer_at_deepest_zoom() {
    let policy = ZoomPolicy {
        max_zoom: raster_common::MAX_TILE_ZOOM,
        ..ZoomPolicy::tiled()
    };
    assert!(policy.validate().is_ok());
    let out = render_for_zoom(&dataset(), &style(), 12, &policy).unwrap();
    let RenderOutput::Tiled(tiles) = out else {
        panic!("expected tiles");
    };

    assert!(tiles.covering_tiles(32).is_empty());
    let deep = tiles.tile(TileCoord::new(32, 0, 0)).unwrap();
    assert!(deep.is_fully_transparent());
    let edge = tiles
        .tile(TileCoord::new(raster_common::MAX_TILE_ZOOM, u32::MAX, u32::MAX))
        .unwrap();
    assert!(edge.is_fully_transparent());
}

#[test]
fn test_rendered_overlay_encodes_to_png() {
    let mut layer = ZoomAdaptiveLayer::new(dataset(), style(), ZoomPolicy::default());
    let output = layer.zoom_changed(4).unwrap().unwrap();
    let png = encode_png(output.image().unwrap()).unwrap();
    assert!(png.len() > 8);
}
