use image::{Rgb, RgbImage};
use smearscope::annotate::{self, TagPlacement, LABEL_TEXT, PALETTE};
use smearscope::model::{BBoxXYXY, Detection};

mod common;

use common::{png_bytes, trophozoite};

fn ring(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
    Detection::new(BBoxXYXY::from_xyxy(x1, y1, x2, y2), "ring", 0.624)
}

#[test]
fn single_trophozoite_on_small_image() {
    let source = annotate::decode(&png_bytes(100, 100)).unwrap();
    let annotated = annotate::annotate(&source, &[trophozoite()]).unwrap();

    assert_eq!(annotated.raster.dimensions(), (100, 100));
    assert_eq!(annotated.boxes.len(), 1);

    let drawn = &annotated.boxes[0];
    assert_eq!(drawn.index, 0);
    assert_eq!(drawn.bbox, BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0));
    assert_eq!(drawn.color, PALETTE[0]);
    assert_eq!(drawn.caption, "trophozoite 91.0%");
    // Ten pixels of headroom is less than one tag height.
    assert_eq!(drawn.tag, TagPlacement::Inside);

    // Bottom-right corner of the outline.
    assert_eq!(*annotated.raster.get_pixel(49, 49), PALETTE[0]);
    // Interior below the tag keeps the source pixel.
    assert_eq!(annotated.raster.get_pixel(30, 40), source.get_pixel(30, 40));
    // Some caption text was drawn inside the tag.
    let has_text = (10..50)
        .flat_map(|x| (10..22).map(move |y| (x, y)))
        .any(|(x, y)| *annotated.raster.get_pixel(x, y) == LABEL_TEXT);
    assert!(has_text);
}

#[test]
fn annotation_is_deterministic() {
    let source = annotate::decode(&png_bytes(160, 120)).unwrap();
    let detections = vec![
        trophozoite(),
        ring(70.0, 60.0, 120.0, 110.0),
        ring(150.0, 100.0, 200.0, 140.0),
    ];
    let first = annotate::annotate(&source, &detections).unwrap();
    let second = annotate::annotate(&source, &detections).unwrap();

    assert_eq!(first.raster, second.raster);
    assert_eq!(first.jpeg, second.jpeg);
    assert_eq!(first.boxes, second.boxes);
}

#[test]
fn jpeg_output_decodes_to_the_source_size() {
    let source = RgbImage::from_pixel(64, 40, Rgb([200, 190, 210]));
    let annotated = annotate::annotate(&source, &[ring(5.0, 30.0, 40.0, 39.0)]).unwrap();

    let decoded = annotate::decode(&annotated.jpeg).unwrap();
    assert_eq!(decoded.dimensions(), (64, 40));
    assert_eq!(annotated.boxes[0].tag, TagPlacement::Above);
    assert_eq!(annotated.boxes[0].caption, "ring 62.4%");
}

#[test]
fn reversed_and_overhanging_boxes_are_normalised() {
    let source = RgbImage::from_pixel(80, 80, Rgb([0, 0, 0]));
    let detections = vec![ring(70.0, 70.0, 20.0, 20.0), ring(-10.0, 60.0, 30.0, 500.0)];
    let annotated = annotate::annotate(&source, &detections).unwrap();

    assert_eq!(
        annotated.boxes[0].bbox,
        BBoxXYXY::from_xyxy(20.0, 20.0, 70.0, 70.0)
    );
    assert_eq!(
        annotated.boxes[1].bbox,
        BBoxXYXY::from_xyxy(0.0, 60.0, 30.0, 80.0)
    );
    assert_eq!(annotated.boxes[1].color, PALETTE[1]);
}

#[test]
fn no_detections_leaves_the_raster_untouched() {
    let source = annotate::decode(&png_bytes(32, 32)).unwrap();
    let annotated = annotate::annotate(&source, &[]).unwrap();
    assert_eq!(annotated.raster, source);
    assert!(annotated.boxes.is_empty());
}
