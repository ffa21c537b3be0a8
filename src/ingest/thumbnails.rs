use image::codecs::jpeg::JpegEncoder;
use image::error::{LimitError, LimitErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageResult};

use crate::config::ThumbnailConfig;

/// A derived dimension may be at most this many times the configured one.
const MAX_ASPECT: u64 = 4;

/// Thumbnails larger than this are refused before any pixels are allocated.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Produces upright JPEG thumbnails that display correctly in viewers which
/// ignore EXIF orientation.
#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    width: u32,
    height: u32,
    quality: u8,
}

impl Thumbnailer {
    pub fn new(config: &ThumbnailConfig) -> Self {
        let (width, height) = if config.width == 0 && config.height == 0 {
            let default = ThumbnailConfig::default();
            (default.width, default.height)
        } else {
            (config.width, config.height)
        };
        Self {
            width,
            height,
            quality: config.quality.clamp(1, 100),
        }
    }

    /// Resize to the configured target, apply `orient`, and encode as JPEG.
    pub fn make(&self, img: &DynamicImage, orient: u8) -> ImageResult<Vec<u8>> {
        let (src_w, src_h) = img.dimensions();
        let (w, h) = target_dimensions(src_w, src_h, self.width, self.height);
        if w as u64 * h as u64 > MAX_PIXELS {
            return Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            )));
        }
        let resized = img.resize_exact(w, h, FilterType::Triangle);
        let upright = apply_orientation(resized, orient);

        // JPEG has no alpha channel.
        let rgb = upright.to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(&rgb)?;
        Ok(buf)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Output size for a `src_w`x`src_h` source. A zero in either target
/// dimension is derived from the other to keep the aspect ratio, but the
/// derived side never exceeds `MAX_ASPECT` times the configured one. Sources
/// more extreme than that shrink to fit, so a 1x100000 strip at width 1000
/// becomes 1x4000 rather than 1000x100000000.
pub fn target_dimensions(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (width.max(1), height.max(1));
    }
    match (width, height) {
        (0, 0) => (src_w, src_h),
        (w, 0) => fit(src_w, src_h, w as u64, w as u64 * MAX_ASPECT),
        (0, h) => fit(src_w, src_h, h as u64 * MAX_ASPECT, h as u64),
        (w, h) => (w, h),
    }
}

/// Largest size with the source's aspect ratio inside `box_w`x`box_h`.
fn fit(src_w: u32, src_h: u32, box_w: u64, box_h: u64) -> (u32, u32) {
    let (src_w, src_h) = (src_w as u128, src_h as u128);
    let (box_w, box_h) = (box_w as u128, box_h as u128);
    let scale = |n: u128, num: u128, den: u128| (n * num + den / 2) / den;

    let (w, h) = if src_w * box_h >= src_h * box_w {
        (box_w, scale(src_h, box_w, src_w))
    } else {
        (scale(src_w, box_h, src_h), box_h)
    };
    let clamp = |n: u128| n.clamp(1, u32::MAX as u128) as u32;
    (clamp(w), clamp(h))
}

/// Rotate and flip so that an image stored with EXIF orientation `orient`
/// reads upright. Rotations below are counter-clockwise degrees:
///
/// | orient | rotation | flip |
/// |---|---|---|
/// | 1 | 0 | no |
/// | 2 | 0 | yes |
/// | 3 | 180 | no |
/// | 4 | 180 | yes |
/// | 5 | 270 | yes |
/// | 6 | 270 | no |
/// | 7 | 90 | yes |
/// | 8 | 90 | no |
///
/// Unknown codes (0 and anything above 8) leave the image untouched.
pub fn apply_orientation(img: DynamicImage, orient: u8) -> DynamicImage {
    // image's rotate90/rotate270 are clockwise.
    let rotated = match orient {
        3 | 4 => img.rotate180(),
        5 | 6 => img.rotate90(),
        7 | 8 => img.rotate270(),
        _ => img,
    };
    match orient {
        2 | 4 | 5 | 7 => rotated.fliph(),
        _ => rotated,
    }
}
