use image::{GenericImageView, ImageFormat};

use crate::error::{Result, SpoofError};
use crate::formats::container::ContainerKind;

fn image_format(kind: ContainerKind) -> ImageFormat {
    match kind {
        ContainerKind::Png => ImageFormat::Png,
        ContainerKind::Jpeg => ImageFormat::Jpeg,
    }
}

/// Decodes both buffers and requires the same dimensions and RGBA pixels.
pub fn verify_render(kind: ContainerKind, original: &[u8], candidate: &[u8]) -> Result<()> {
    let format = image_format(kind);
    let before = image::load_from_memory_with_format(original, format)
        .map_err(|e| SpoofError::Render(format!("original does not decode: {}", e)))?;
    let after = image::load_from_memory_with_format(candidate, format)
        .map_err(|e| SpoofError::Render(format!("result does not decode: {}", e)))?;

    if before.dimensions() != after.dimensions() {
        return Err(SpoofError::Render(format!(
            "dimensions changed from {:?} to {:?}",
            before.dimensions(),
            after.dimensions()
        )));
    }
    if before.to_rgba8().as_raw() != after.to_rgba8().as_raw() {
        return Err(SpoofError::Render("pixel data differs".to_string()));
    }
    Ok(())
}
