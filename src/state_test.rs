use super::*;

#[test]
fn canvas_object_serde_round_trip() {
    let obj = test_helpers::rect(100.0, 200.0, 50.0, 40.0, "red");
    let json = serde_json::to_string(&obj).unwrap();
    assert!(json.contains("\"zIndex\""));
    assert!(json.contains("\"rectangle\""));
    let restored: CanvasObject = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, obj);
}

#[test]
fn centers_use_bounding_box() {
    let obj = test_helpers::rect(100.0, 200.0, 50.0, 40.0, "red");
    assert!((obj.center_x() - 125.0).abs() < f64::EPSILON);
    assert!((obj.center_y() - 220.0).abs() < f64::EPSILON);
}

#[test]
fn intersects_touching_edges() {
    let obj = test_helpers::rect(100.0, 100.0, 50.0, 50.0, "red");
    assert!(obj.intersects(150.0, 150.0, 300.0, 300.0));
    assert!(!obj.intersects(151.0, 0.0, 300.0, 300.0));
}

#[test]
fn viewport_rect_scales_with_zoom() {
    let vp = Viewport { center_x: 1000.0, center_y: 1000.0, zoom: 2.0 };
    let (l, t, r, b) = vp.world_rect(1200.0, 800.0);
    assert!((l - 700.0).abs() < f64::EPSILON);
    assert!((r - 1300.0).abs() < f64::EPSILON);
    assert!((t - 800.0).abs() < f64::EPSILON);
    assert!((b - 1200.0).abs() < f64::EPSILON);
}

#[test]
fn viewport_zero_zoom_treated_as_one() {
    let vp = Viewport { center_x: 600.0, center_y: 400.0, zoom: 0.0 };
    assert_eq!(vp.world_rect(1200.0, 800.0), (0.0, 0.0, 1200.0, 800.0));
}

#[test]
fn partial_patch_leaves_other_fields() {
    let mut obj = test_helpers::rect(10.0, 20.0, 30.0, 40.0, "red");
    ObjectPatch { x: Some(99.0), ..ObjectPatch::default() }.apply(&mut obj);
    assert!((obj.x - 99.0).abs() < f64::EPSILON);
    assert!((obj.y - 20.0).abs() < f64::EPSILON);
    assert_eq!(obj.fill, "red");
}
