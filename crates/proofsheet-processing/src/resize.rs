use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Output size for a target width: aspect ratio kept, never larger than the original.
pub fn fit_to_width(original_width: u32, original_height: u32, target_width: u32) -> (u32, u32) {
    if target_width == 0 || original_width == 0 || target_width >= original_width {
        return (original_width, original_height);
    }
    let height = (original_height as f64 * target_width as f64 / original_width as f64).round();
    (target_width, (height as u32).max(1))
}

/// Width-driven downscaling
pub struct ImageResize;

impl ImageResize {
    /// Downscale `img` to `target_width`. Images already narrower are returned unchanged.
    pub fn to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (new_width, new_height) = fit_to_width(width, height, target_width);
        if (new_width, new_height) == (width, height) {
            return img.clone();
        }

        tracing::debug!(
            from_width = width,
            from_height = height,
            to_width = new_width,
            to_height = new_height,
            "Resizing image"
        );

        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }
}
