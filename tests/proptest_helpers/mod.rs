#![allow(dead_code)]

use bytes::Bytes;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use smearscope::model::{BBoxXYXY, Coord, Detection, Screen};
use smearscope::preview::{FailureKind, FrameOutcome};
use smearscope::viewport::PointerInput;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_screen_point() -> BoxedStrategy<Coord<Screen>> {
    (-500.0f64..1500.0, -500.0f64..1500.0)
        .prop_map(|(x, y)| Coord::new(x, y))
        .boxed()
}

fn arb_touches(max: usize) -> BoxedStrategy<Vec<Coord<Screen>>> {
    prop::collection::vec(arb_screen_point(), 0..=max).boxed()
}

/// Raw pointer input as a browser would deliver it, including wheel deltas
/// of either sign and the occasional zero.
pub fn arb_pointer_input() -> BoxedStrategy<PointerInput> {
    prop_oneof![
        arb_screen_point().prop_map(PointerInput::MouseDown),
        arb_screen_point().prop_map(PointerInput::MouseMove),
        Just(PointerInput::MouseUp),
        arb_touches(3).prop_map(PointerInput::TouchStart),
        arb_touches(3).prop_map(PointerInput::TouchMove),
        arb_touches(2).prop_map(PointerInput::TouchEnd),
        prop_oneof![Just(0.0), -300.0f64..300.0].prop_map(PointerInput::Wheel),
        Just(PointerInput::ZoomIn),
        Just(PointerInput::ZoomOut),
        Just(PointerInput::ResetZoom),
    ]
    .boxed()
}

pub fn arb_failure() -> BoxedStrategy<FailureKind> {
    prop_oneof![
        (400u16..600).prop_map(FailureKind::Status),
        Just(FailureKind::Timeout),
        Just(FailureKind::Transport),
    ]
    .boxed()
}

/// Frame outcomes without credential rejections, weighted towards failures
/// so runs of three appear often.
pub fn arb_frame_outcome() -> BoxedStrategy<FrameOutcome> {
    prop_oneof![
        1 => Just(FrameOutcome::Frame(Bytes::from_static(b"\xff\xd8frame"))),
        2 => arb_failure().prop_map(FrameOutcome::Failed),
    ]
    .boxed()
}

/// Detections with boxes that may be reversed, overhang the image, or be
/// empty.
pub fn arb_detection(width: u32, height: u32) -> BoxedStrategy<Detection> {
    let w = f64::from(width);
    let h = f64::from(height);
    (
        -w..2.0 * w,
        -h..2.0 * h,
        -w..2.0 * w,
        -h..2.0 * h,
        "[a-z]{1,12}",
        0.0f64..=1.0,
    )
        .prop_map(|(x1, y1, x2, y2, label, confidence)| {
            Detection::new(BBoxXYXY::from_xyxy(x1, y1, x2, y2), label, confidence)
        })
        .boxed()
}
