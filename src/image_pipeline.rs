//! Rendering the first frame of a data set to RGBA,
//! which shows that its pixel data can be displayed.
use dicom::object::DefaultDicomObject;
use dicom::pixeldata::{DecodedPixelData, PhotometricInterpretation, PixelDecoder};

/// An 8-bit RGBA rendering of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePreview {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl FramePreview {
    fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, String> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(format!(
                "RGBA buffer has {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            ));
        }
        Ok(FramePreview {
            width,
            height,
            rgba,
        })
    }

    /// Gray level of the pixel at (`x`, `y`), taken from the red channel.
    pub fn gray_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(offset).copied()
    }

    /// Decode the first frame, or `None` if the object has no frames.
    pub fn render_first_frame(object: &DefaultDicomObject) -> Result<Option<Self>, String> {
        let decoded = object
            .decode_pixel_data()
            .map_err(|err| format!("Failed to decode pixel data: {err}"))?;

        if decoded.number_of_frames() == 0 {
            return Ok(None);
        }

        Self::render_frame(&decoded, 0).map(Some)
    }

    pub fn render_frame(decoded: &DecodedPixelData<'_>, frame_idx: u32) -> Result<Self, String> {
        if frame_idx >= decoded.number_of_frames() {
            return Err(format!(
                "Requested frame {frame_idx}, but only {} frame(s) are available",
                decoded.number_of_frames()
            ));
        }

        match decoded.photometric_interpretation() {
            photometric if photometric.is_monochrome() => {
                Self::render_monochrome(decoded, frame_idx)
            }
            other => Self::render_color(decoded, frame_idx, other.as_str()),
        }
    }

    fn render_monochrome(decoded: &DecodedPixelData<'_>, frame_idx: u32) -> Result<Self, String> {
        let width = decoded.columns();
        let height = decoded.rows();
        let invert = matches!(
            decoded.photometric_interpretation(),
            PhotometricInterpretation::Monochrome1
        );

        let grays = if decoded.bits_allocated() <= 8 {
            decoded
                .to_vec_frame::<u8>(frame_idx)
                .map_err(|err| format!("Failed to materialize frame data: {err}"))?
        } else {
            let samples = decoded
                .to_vec_frame::<u16>(frame_idx)
                .map_err(|err| format!("Failed to materialize frame data: {err}"))?;
            let (min, max) = min_max_u16(&samples).unwrap_or((0, 0));
            samples
                .iter()
                .map(|&value| normalize_u16(value, min, max))
                .collect()
        };

        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for gray in grays {
            let value = if invert { 255 - gray } else { gray };
            rgba.extend_from_slice(&[value, value, value, 255]);
        }
        Self::from_rgba(width, height, rgba)
    }

    /// Color frames go through the library's image conversion,
    /// which handles planar layouts and YBR color spaces.
    fn render_color(
        decoded: &DecodedPixelData<'_>,
        frame_idx: u32,
        interpretation: &str,
    ) -> Result<Self, String> {
        let image = decoded.to_dynamic_image(frame_idx).map_err(|err| {
            format!("Unsupported photometric interpretation `{interpretation}`: {err}")
        })?;
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }
}

fn min_max_u16(values: &[u16]) -> Option<(u16, u16)> {
    values.iter().copied().fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}

fn normalize_u16(value: u16, min: u16, max: u16) -> u8 {
    if max <= min {
        return 0;
    }

    let range = (max - min) as f32;
    let normalized = (value.saturating_sub(min)) as f32 / range;
    (normalized * 255.0).clamp(0.0, 255.0).round() as u8
}
