//! Error types for the face-restore crate.
//!
//! Only [`Error::Input`] and [`Error::Encode`] are allowed to terminate an
//! invocation. [`InpaintError`] and [`LocatorError`] are always absorbed by
//! the engine and surface only as a degraded (but valid) result.

/// Errors that can terminate a restoration invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input path could not be read, or its bytes are not a decodable image.
    #[error("failed to read input image: {0}")]
    Input(String),

    /// The final image could not be serialized to JPEG.
    #[error("failed to encode output image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Errors internal to the inpainting stage.
///
/// Never escapes the engine: any variant degrades the result to the
/// pre-inpaint enhanced image.
#[derive(Debug, thiserror::Error)]
pub enum InpaintError {
    /// Mask dimensions do not match the image being filled.
    #[error("mask dimensions {mask_width}x{mask_height} do not match image {width}x{height}")]
    MaskMismatch {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Mask width in pixels.
        mask_width: u32,
        /// Mask height in pixels.
        mask_height: u32,
    },

    /// Every pixel is masked, so there is no source texture to propagate.
    #[error("mask covers the entire image, no known pixels to fill from")]
    NoKnownPixels,

    /// A masked pixel had no valid neighbor within the fill radius.
    #[error("fill produced no valid contribution at pixel ({x}, {y})")]
    DegenerateFill {
        /// X coordinate of the unfillable pixel.
        x: u32,
        /// Y coordinate of the unfillable pixel.
        y: u32,
    },
}

/// Failure of an external face detection/analysis backend.
///
/// Treated by the engine exactly like an empty detection or analysis result.
#[derive(Debug, thiserror::Error)]
#[error("face locator backend failed: {0}")]
pub struct LocatorError(pub String);

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let input = Error::Input("no such file".to_string());
        assert!(input.to_string().contains("no such file"));

        let mismatch = InpaintError::MaskMismatch {
            width: 100,
            height: 80,
            mask_width: 50,
            mask_height: 40,
        };
        let msg = mismatch.to_string();
        assert!(msg.contains("50x40"));
        assert!(msg.contains("100x80"));

        let locator = LocatorError("backend not installed".to_string());
        assert!(locator.to_string().contains("backend not installed"));
    }
}
