//! Tests for BoundingBox operations.

use raster_common::bbox::BoundingBox;

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
    assert_eq!(bbox.west(), -180.0);
    assert_eq!(bbox.south(), -90.0);
    assert_eq!(bbox.east(), 180.0);
    assert_eq!(bbox.north(), 90.0);
    assert!(bbox.is_valid());
}

#[test]
fn test_bbox_copy() {
    let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let bbox2 = bbox1;
    assert_eq!(bbox1, bbox2);
}

// ============================================================================
// Tie point tests
// ============================================================================

#[test]
fn test_tie_point_bounds_match_geotransform() {
    let (x0, y0, sx, sy, w, h) = (36.5, -1.25, 0.008333, 0.008333, 1200usize, 900usize);
    let bbox = BoundingBox::from_tie_point(x0, y0, sx, sy, w, h);

    assert_eq!(bbox.west(), x0);
    assert_eq!(bbox.north(), y0);
    assert!((bbox.east() - (x0 + sx * w as f64)).abs() < 1e-12);
    assert!((bbox.south() - (y0 - sy * h as f64)).abs() < 1e-12);
}

#[test]
fn test_tie_point_projected_meters() {
    let bbox = BoundingBox::from_tie_point(500_000.0, 4_000_000.0, 30.0, 30.0, 100, 50);
    assert_eq!(bbox.width(), 3000.0);
    assert_eq!(bbox.height(), 1500.0);
}

#[test]
fn test_degenerate_bbox_is_invalid() {
    assert!(!BoundingBox::new(1.0, 1.0, 1.0, 2.0).is_valid());
    assert!(!BoundingBox::new(2.0, 1.0, 1.0, 2.0).is_valid());
}

// ============================================================================
// Containment tests
// ============================================================================

#[test]
fn test_contains_point_edges_inclusive() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(bbox.contains_point(0.0, 0.0));
    assert!(bbox.contains_point(10.0, 10.0));
    assert!(bbox.contains_point(5.0, 5.0));
    assert!(!bbox.contains_point(10.0001, 5.0));
    assert!(!bbox.contains_point(5.0, -0.0001));
}

#[test]
fn test_touching_boxes_do_not_intersect() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_contained_intersection() {
    let outer = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
    let inner = BoundingBox::new(-1.0, -2.0, 3.0, 4.0);
    assert_eq!(outer.intersection(&inner), Some(inner));
}
