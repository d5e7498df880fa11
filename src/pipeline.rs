//! End-to-end flow: locate, estimate, place, compose.
//!
//! Each stage only runs when the previous one produced a value; an image
//! without a usable marker never reaches the compositor.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::compositor::{SceneCompositor, SceneRequest};
use crate::config::{PlacementConfig, Settings};
use crate::error::{Error, Result};
use crate::locator::{MarkerDetection, MarkerLocator};
use crate::placement::WorldTransform;
use crate::pose::PoseResult;

/// What one pipeline run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    /// Detection the pose was estimated from
    pub detection: MarkerDetection,
    /// Estimated pose
    pub pose: PoseResult,
    /// Object placement handed to the compositor
    pub transform: WorldTransform,
    /// Rendered image
    pub output: PathBuf,
}

/// Detection and rendering with an injected compositor
pub struct Pipeline<C> {
    locator: MarkerLocator,
    placement: PlacementConfig,
    compositor: C,
}

impl<C: SceneCompositor> Pipeline<C> {
    /// Assemble a pipeline
    pub fn new(locator: MarkerLocator, placement: PlacementConfig, compositor: C) -> Self {
        Self {
            locator,
            placement,
            compositor,
        }
    }

    /// Pipeline configured from a settings value
    pub fn from_settings(settings: &Settings, compositor: C) -> Self {
        Self::new(MarkerLocator::new(settings.locator), settings.placement, compositor)
    }

    /// The locator in use
    pub fn locator(&self) -> &MarkerLocator {
        &self.locator
    }

    /// The compositor in use
    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    /// Render `model` (or the compositor's default object) onto the marker
    /// found in `image`, writing `output`.
    #[instrument(skip(self), fields(image = %image.display()))]
    pub fn run(&self, image: &Path, output: &Path, model: Option<&Path>) -> Result<PipelineOutcome> {
        let detection = self
            .locator
            .try_locate_path(image)
            .map_err(|reason| Error::MarkerNotDetected {
                path: image.to_path_buf(),
                reason,
            })?;

        let pose = PoseResult::from_detection(&detection);
        let transform = WorldTransform::from_pose(&pose, detection.image_size, &self.placement)?;

        let request = SceneRequest {
            background: image.to_path_buf(),
            output: output.to_path_buf(),
            transform,
            model: model.map(Path::to_path_buf),
        };
        self.compositor.compose(&request)?;
        info!(output = %output.display(), angle = pose.angle, "scene rendered");

        Ok(PipelineOutcome {
            detection,
            pose,
            transform,
            output: request.output,
        })
    }
}
