use color_eyre::eyre::bail;
use color_eyre::Result;
use image::{imageops, DynamicImage, RgbaImage};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

/// Largest side of a crop; matches what browsers allow for a canvas.
pub const MAX_DIMENSION: i64 = 32_767;

/// Largest pixel count of a crop, the browser limit for a canvas area.
pub const MAX_AREA: i64 = 268_435_456;

// 2^63; the smallest f64 that no longer fits an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A selection rectangle in screenshot pixel coordinates.
///
/// Fields are signed because a selection dragged off screen can start at a
/// negative offset, and a degenerate one can have zero or negative size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(deserialize_with = "truncating")]
    pub x: i64,
    #[serde(deserialize_with = "truncating")]
    pub y: i64,
    #[serde(deserialize_with = "truncating")]
    pub width: i64,
    #[serde(deserialize_with = "truncating")]
    pub height: i64,
}

// Page scripts send CSS pixels scaled by the device pixel ratio, which are often fractional.
fn truncating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("coordinate is not a finite number"));
    }
    let value = value.trunc();
    if value < -I64_BOUND || value >= I64_BOUND {
        return Err(serde::de::Error::custom(format!(
            "coordinate {value} is out of range"
        )));
    }
    Ok(value as i64)
}

impl Region {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Copies `region` out of `image` into a new image of exactly the region's size.
///
/// Pixels of the region that fall outside the source stay fully transparent.
#[instrument(skip(image))]
pub fn crop(image: &DynamicImage, region: Region) -> Result<DynamicImage> {
    let Region {
        x,
        y,
        width,
        height,
    } = region;

    if width <= 0 || height <= 0 {
        bail!("Invalid selection area");
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        bail!("Selection area is too large ({width}x{height})");
    }
    if width * height > MAX_AREA {
        bail!("Selection area is too large ({width}x{height})");
    }
    let (Some(left), Some(top)) = (x.checked_neg(), y.checked_neg()) else {
        bail!("Selection offset is out of range ({x}, {y})");
    };

    let mut canvas = RgbaImage::new(width as u32, height as u32);
    imageops::replace(&mut canvas, image, left, top);
    debug!(
        "cropped {}x{} source to {width}x{height}",
        image.width(),
        image.height()
    );

    Ok(DynamicImage::ImageRgba8(canvas))
}
