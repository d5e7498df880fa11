//! Pipeline and compositor contract

use image::{GrayImage, Luma};
use qr_pose::compositor::{SceneCompositor, SceneRequest};
use qr_pose::encoder::{encode_text, render_marker};
use qr_pose::error::ComposeError;
use qr_pose::{EcLevel, Error, LocateFailure, Pipeline, PlacementConfig, Settings};
use std::cell::RefCell;
use std::path::Path;

/// Records every request instead of rendering
#[derive(Default)]
struct RecordingCompositor {
    requests: RefCell<Vec<SceneRequest>>,
    fail: bool,
}

impl SceneCompositor for RecordingCompositor {
    fn compose(&self, request: &SceneRequest) -> Result<(), ComposeError> {
        self.requests.borrow_mut().push(request.clone());
        if self.fail {
            return Err(ComposeError::Failed {
                code: Some(2),
                stderr: "scene setup failed".into(),
            });
        }
        Ok(())
    }
}

fn write_demo(dir: &Path) -> std::path::PathBuf {
    let symbol = encode_text("demo", EcLevel::M).unwrap();
    let path = dir.join("demo.png");
    render_marker(&symbol, 8, 4).save(&path).unwrap();
    path
}

#[test]
fn detected_marker_is_composed() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_demo(dir.path());
    let output = dir.path().join("out.png");
    let model = dir.path().join("duck.obj");

    let pipeline = Pipeline::from_settings(&Settings::default(), RecordingCompositor::default());
    let outcome = pipeline.run(&input, &output, Some(&model)).unwrap();
    assert_eq!(outcome.pose.data, "demo");
    assert_eq!(outcome.output, output);

    let requests = pipeline.compositor().requests.borrow();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.background, input);
    assert_eq!(request.output, output);
    assert_eq!(request.model.as_deref(), Some(model.as_path()));
    assert_eq!(request.transform, outcome.transform);

    // Marker centered in the image lands at the plane origin
    let [x, y, z] = request.transform.translation();
    assert!(x.abs() < 0.02 && y.abs() < 0.02 && z == 0.0, "{x} {y} {z}");
    // 168 px of 232 on a plane of side 2
    let expected_scale = 168.0 / 232.0 * 2.0;
    assert!((request.transform.scale() - expected_scale).abs() < 0.03);
}

#[test]
fn missing_marker_never_reaches_the_compositor() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blank.png");
    GrayImage::from_pixel(240, 180, Luma([255])).save(&input).unwrap();

    let pipeline = Pipeline::from_settings(&Settings::default(), RecordingCompositor::default());
    let err = pipeline
        .run(&input, &dir.path().join("out.png"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MarkerNotDetected {
            reason: LocateFailure::MarkerNotFound,
            ..
        }
    ));
    assert!(pipeline.compositor().requests.borrow().is_empty());
}

#[test]
fn unreadable_input_never_reaches_the_compositor() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_settings(&Settings::default(), RecordingCompositor::default());
    let err = pipeline
        .run(&dir.path().join("absent.png"), &dir.path().join("out.png"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MarkerNotDetected {
            reason: LocateFailure::ImageLoad(_),
            ..
        }
    ));
    assert!(pipeline.compositor().requests.borrow().is_empty());
}

#[test]
fn compositor_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_demo(dir.path());
    let compositor = RecordingCompositor {
        fail: true,
        ..RecordingCompositor::default()
    };
    let pipeline = Pipeline::from_settings(&Settings::default(), compositor);
    let err = pipeline
        .run(&input, &dir.path().join("out.png"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Compose(ComposeError::Failed { code: Some(2), .. })
    ));
    assert_eq!(pipeline.compositor().requests.borrow().len(), 1);
}

#[test]
fn placement_settings_reach_the_transform() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_demo(dir.path());
    let settings = Settings {
        placement: PlacementConfig {
            plane_size: 4.0,
            lift: 0.5,
        },
        ..Settings::default()
    };
    let pipeline = Pipeline::from_settings(&settings, RecordingCompositor::default());
    let outcome = pipeline
        .run(&input, &dir.path().join("out.png"), None)
        .unwrap();
    assert_eq!(outcome.transform.translation()[2], 0.5);
    let expected_scale = 168.0 / 232.0 * 4.0;
    assert!((outcome.transform.scale() - expected_scale).abs() < 0.06);
}
