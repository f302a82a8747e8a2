//! Best-effort face photo restoration.
//!
//! Given one photograph, the engine asks an optional [`FaceLocator`] backend
//! for face candidates, picks the most confident one (or falls back to the
//! whole photo), and runs a deterministic restoration chain over it: CLAHE
//! contrast normalization, non-local-means denoising, unsharp-mask
//! sharpening, conditional 2x upscaling, and defect-mask-guided inpainting.
//! Detection, analysis and inpainting are best-effort — any of them failing
//! degrades the output instead of aborting it.
//!
//! # Quick Start
//!
//! ```no_run
//! use face_restore::RestoreEngine;
//!
//! let engine = RestoreEngine::without_locator();
//! let img = image::open("photo.jpg").unwrap().to_rgb8();
//! let result = engine.reconstruct(&img);
//! result.image.save("restored.jpg").unwrap();
//! ```
//!
//! # Pipeline stages
//!
//! Each stage is a pure function over an owned buffer and is exposed for
//! standalone use:
//!
//! ```no_run
//! use face_restore::{defect, enhance, inpaint};
//!
//! let img = image::open("photo.jpg").unwrap().to_rgb8();
//! let enhanced = enhance::enhance(&img);
//! let mask = defect::defect_mask(&enhanced);
//! let restored = inpaint::inpaint(&enhanced, &mask).unwrap_or(enhanced);
//! ```

#![deny(missing_docs)]

pub mod defect;
pub mod denoise;
mod engine;
pub mod enhance;
pub mod error;
pub mod inpaint;
pub mod locator;

pub use engine::{
    attempt_or, encode_jpeg_base64, ProcessOutput, ReconstructionResult, RestoreEngine,
    JPEG_QUALITY,
};
pub use error::{Error, InpaintError, LocatorError, Result};
pub use locator::{AnalysisResult, DetectionCandidate, FaceLocator, NullLocator};
