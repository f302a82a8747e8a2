//! Face detection/analysis capability boundary.
//!
//! The restoration pipeline itself ships no detector. Backends implement
//! [`FaceLocator`] and are injected into the engine; [`NullLocator`] is the
//! always-available null-object used when no backend is linked in. Both
//! operations are fallible, and the engine treats any failure exactly like an
//! empty result, so backends never need their own fallback logic.

use image::RgbImage;

use crate::error::LocatorError;

/// A face region proposed by a detection backend.
#[derive(Debug, Clone)]
pub struct DetectionCandidate {
    /// The cropped (and possibly aligned) face region.
    pub crop: RgbImage,
    /// Detector-reported confidence in `[0, 1]` that the crop is a face.
    pub confidence: f32,
}

/// Demographic/emotion attributes reported by an analysis backend.
///
/// Maps attribute names (`age`, `gender`, `emotion`, ...) to backend-defined
/// values. Empty when analysis is unavailable or failed.
pub type AnalysisResult = serde_json::Map<String, serde_json::Value>;

/// External face detection and analysis capability.
pub trait FaceLocator {
    /// Locate face regions in an image.
    ///
    /// Returns zero or more candidates; order is backend-defined and is used
    /// by the engine to break confidence ties (first-listed wins).
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError`] if the backend is unavailable or fails. The
    /// engine converts this into "zero candidates".
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionCandidate>, LocatorError>;

    /// Estimate age, gender and dominant emotion for the primary face.
    ///
    /// Called on the original full image, never on a crop.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError`] if the backend is unavailable or fails. The
    /// engine converts this into an empty [`AnalysisResult`].
    fn analyze(&self, image: &RgbImage) -> Result<AnalysisResult, LocatorError>;
}

/// Null-object backend: always succeeds with empty results.
///
/// Using this instead of an `Option<Box<dyn FaceLocator>>` keeps conditional
/// branching out of the engine entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLocator;

impl FaceLocator for NullLocator {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionCandidate>, LocatorError> {
        Ok(Vec::new())
    }

    fn analyze(&self, _image: &RgbImage) -> Result<AnalysisResult, LocatorError> {
        Ok(AnalysisResult::new())
    }
}
