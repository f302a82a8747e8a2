//! Restoration engine: target selection, stage sequencing, degradation policy.

use std::path::Path;

use base64::Engine as _;
use image::RgbImage;
use log::{debug, warn};
use serde::Serialize;

use crate::defect::defect_mask;
use crate::enhance::enhance;
use crate::error::{Error, Result};
use crate::inpaint::inpaint;
use crate::locator::{AnalysisResult, DetectionCandidate, FaceLocator, NullLocator};

/// JPEG quality for the serialized output image.
pub const JPEG_QUALITY: u8 = 90;

/// Final output of one restoration invocation.
///
/// Constructed once per invocation and never mutated afterwards.
#[derive(Debug)]
pub struct ReconstructionResult {
    /// The enhanced (and, best-effort, inpainted) target region.
    pub image: RgbImage,
    /// Demographic/emotion annotation; empty when analysis was unavailable.
    pub analysis: AnalysisResult,
}

/// Serializable process-boundary bundle.
#[derive(Debug, Serialize)]
pub struct ProcessOutput {
    /// The restored image as a base64-encoded JPEG (quality 90).
    pub reconstructed_base64: String,
    /// Demographic/emotion annotation; `{}` when unavailable.
    pub analysis: AnalysisResult,
}

/// The restoration engine.
///
/// Holds the injected [`FaceLocator`] backend and nothing else; every
/// invocation is a pure (or best-effort) function of its inputs, so one
/// engine is safe to reuse across images and threads of independent work.
pub struct RestoreEngine {
    locator: Box<dyn FaceLocator>,
}

impl RestoreEngine {
    /// Create an engine with the given detection/analysis backend.
    #[must_use]
    pub fn new(locator: Box<dyn FaceLocator>) -> Self {
        Self { locator }
    }

    /// Create an engine with no detection backend.
    ///
    /// Detection yields zero candidates and analysis stays empty, so the
    /// pipeline always operates on the full input image.
    #[must_use]
    pub fn without_locator() -> Self {
        Self::new(Box::new(NullLocator))
    }

    /// Run the full restoration pipeline over one photograph.
    ///
    /// Detection, analysis and inpainting are best-effort: their failures
    /// are absorbed here and degrade the result instead of surfacing. The
    /// analysis always runs on the original full image, never on the crop.
    #[must_use]
    pub fn reconstruct(&self, image: &RgbImage) -> ReconstructionResult {
        let candidates = attempt_or("face detection", || self.locator.detect(image), Vec::new);
        debug!("detection produced {} candidate(s)", candidates.len());

        let target = select_target(image, &candidates);
        let enhanced = enhance(target);
        let mask = defect_mask(&enhanced);

        let result = attempt_or(
            "inpainting",
            || inpaint(&enhanced, &mask),
            // All-or-nothing: on failure the pre-inpaint image stands.
            || enhanced.clone(),
        );

        let analysis = attempt_or(
            "face analysis",
            || self.locator.analyze(image),
            AnalysisResult::new,
        );

        ReconstructionResult {
            image: result,
            analysis,
        }
    }

    /// Process a single image file: read, decode, reconstruct, serialize.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] if the path cannot be read or its bytes do
    /// not decode as an image, and [`Error::Encode`] if the restored image
    /// cannot be serialized to JPEG. No other failure propagates.
    pub fn process_file(&self, path: &Path) -> Result<ProcessOutput> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Input(format!("{}: {e}", path.display())))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| Error::Input(e.to_string()))?
            .to_rgb8();

        let result = self.reconstruct(&image);
        let reconstructed_base64 = encode_jpeg_base64(&result.image, JPEG_QUALITY)?;

        Ok(ProcessOutput {
            reconstructed_base64,
            analysis: result.analysis,
        })
    }
}

/// Run a fallible stage, substituting a fallback on any failure.
///
/// This is the single point where the degrade-on-failure policy lives:
/// failures are logged at warn level and never propagate past it.
pub fn attempt_or<T, E, F>(
    stage: &str,
    operation: impl FnOnce() -> std::result::Result<T, E>,
    fallback: F,
) -> T
where
    E: std::fmt::Display,
    F: FnOnce() -> T,
{
    match operation() {
        Ok(value) => value,
        Err(err) => {
            warn!("{stage} failed, continuing with degraded result: {err}");
            fallback()
        }
    }
}

/// Choose the region the pipeline operates on.
///
/// The candidate with the maximum confidence wins; ties go to the
/// first-listed candidate (strictly-greater comparison). With zero
/// candidates the full input image is the target.
fn select_target<'a>(image: &'a RgbImage, candidates: &'a [DetectionCandidate]) -> &'a RgbImage {
    let mut best: Option<&DetectionCandidate> = None;
    for candidate in candidates {
        if best.is_none_or(|b| candidate.confidence > b.confidence) {
            best = Some(candidate);
        }
    }
    best.map_or(image, |c| &c.crop)
}

/// Encode an image as a base64 JPEG string.
///
/// # Errors
///
/// Returns [`Error::Encode`] if JPEG serialization fails.
pub fn encode_jpeg_base64(image: &RgbImage, quality: u8) -> Result<String> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(Error::Encode)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(width: u32, height: u32, confidence: f32) -> DetectionCandidate {
        DetectionCandidate {
            crop: RgbImage::new(width, height),
            confidence,
        }
    }

    #[test]
    fn select_target_with_no_candidates_is_full_image() {
        let img = RgbImage::new(50, 40);
        let target = select_target(&img, &[]);
        assert_eq!(target.dimensions(), (50, 40));
    }

    #[test]
    fn select_target_picks_maximum_confidence() {
        let img = RgbImage::new(50, 40);
        let candidates = vec![
            candidate(10, 10, 0.9),
            candidate(20, 20, 0.95),
            candidate(30, 30, 0.3),
        ];
        let target = select_target(&img, &candidates);
        assert_eq!(target.dimensions(), (20, 20));
    }

    #[test]
    fn select_target_breaks_ties_by_listing_order() {
        let img = RgbImage::new(50, 40);
        let candidates = vec![candidate(10, 10, 0.95), candidate(20, 20, 0.95)];
        let target = select_target(&img, &candidates);
        assert_eq!(target.dimensions(), (10, 10));
    }

    #[test]
    fn attempt_or_passes_successes_through() {
        let value = attempt_or("noop", || Ok::<_, std::io::Error>(7), || 0);
        assert_eq!(value, 7);
    }

    #[test]
    fn attempt_or_substitutes_fallback_on_failure() {
        let value = attempt_or(
            "always fails",
            || Err::<i32, _>(std::io::Error::other("boom")),
            || 42,
        );
        assert_eq!(value, 42);
    }

    #[test]
    fn encode_jpeg_base64_produces_decodable_payload() {
        let img = RgbImage::from_pixel(16, 16, image::Rgb([200, 50, 50]));
        let encoded = encode_jpeg_base64(&img, JPEG_QUALITY).unwrap();

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn process_output_serializes_expected_keys() {
        let out = ProcessOutput {
            reconstructed_base64: "abcd".to_string(),
            analysis: AnalysisResult::new(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["reconstructed_base64"], "abcd");
        assert!(json["analysis"].as_object().unwrap().is_empty());
    }
}
