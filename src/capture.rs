use std::io::Cursor;
use std::str::FromStr;

use image::{ImageFormat, RgbaImage};
use log::{info, warn};
use screenshots::Screen;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Sub-rectangle of the screen to capture, in screen coordinates.
/// Absence means "capture the entire primary display".
///
/// Stored in settings as `"x,y,width,height"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn to_setting(&self) -> String {
        format!("{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for CaptureRegion {
    type Err = AnalysisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(AnalysisError::CaptureFailed(format!(
                "invalid capture region '{value}', expected 'x,y,width,height'"
            )));
        }

        let mut numbers = [0u32; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                AnalysisError::CaptureFailed(format!(
                    "invalid capture region '{value}', '{part}' is not a non-negative integer"
                ))
            })?;
        }

        Ok(CaptureRegion {
            x: numbers[0],
            y: numbers[1],
            width: numbers[2],
            height: numbers[3],
        })
    }
}

/// Produces a single lossless PNG frame of the screen or a sub-region.
///
/// Implementations block; the pipeline runs them via `spawn_blocking` so the
/// capture syscall never sits on the async runtime.
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, region: Option<&CaptureRegion>) -> Result<Vec<u8>, AnalysisError>;
}

/// Captures the primary display through the `screenshots` crate.
pub struct PrimaryDisplayCapturer;

impl ScreenCapturer for PrimaryDisplayCapturer {
    fn capture(&self, region: Option<&CaptureRegion>) -> Result<Vec<u8>, AnalysisError> {
        let screens = Screen::all().ok_or_else(|| {
            AnalysisError::CaptureFailed("no screens available".to_string())
        })?;

        let screen = screens
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::CaptureFailed("no screens found".to_string()))?;

        info!(
            "Capturing screen {}x{} (scale: {})",
            screen.display_info.width, screen.display_info.height, screen.display_info.scale_factor
        );

        let image = match region {
            Some(r) => {
                info!("Capturing region {},{} {}x{}", r.x, r.y, r.width, r.height);
                screen
                    .capture_area(r.x as i32, r.y as i32, r.width, r.height)
                    .ok_or_else(|| {
                        AnalysisError::CaptureFailed(format!(
                            "region capture returned nothing ({},{} {}x{})",
                            r.x, r.y, r.width, r.height
                        ))
                    })?
            }
            None => screen.capture().ok_or_else(|| {
                AnalysisError::CaptureFailed("screen capture returned nothing".to_string())
            })?,
        };

        encode_png(image.buffer(), image.width(), image.height())
    }
}

/// Convert a raw capture buffer to PNG bytes. The `screenshots` crate may
/// hand back 3 or 4 bytes per pixel, and on Windows the channel order is
/// BGRA rather than RGBA.
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AnalysisError> {
    let total_pixels = (width as usize) * (height as usize);
    if buffer.is_empty() || total_pixels == 0 {
        return Err(AnalysisError::CaptureFailed(format!(
            "empty capture buffer for {width}x{height} image"
        )));
    }

    let bytes_per_pixel = buffer.len() / total_pixels;
    let rgba: Vec<u8> = match bytes_per_pixel {
        4 => {
            if cfg!(target_os = "windows") {
                buffer
                    .chunks_exact(4)
                    .flat_map(|px| [px[2], px[1], px[0], px[3]])
                    .collect()
            } else {
                buffer[..total_pixels * 4].to_vec()
            }
        }
        3 => buffer
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        other => {
            return Err(AnalysisError::CaptureFailed(format!(
                "unsupported pixel format: {other} bytes per pixel"
            )))
        }
    };

    let image = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        AnalysisError::CaptureFailed(format!(
            "capture buffer does not match {width}x{height} dimensions"
        ))
    })?;

    let mut png = Cursor::new(Vec::new());
    if let Err(err) = image.write_to(&mut png, ImageFormat::Png) {
        warn!("PNG encoding failed: {err}");
        return Err(AnalysisError::CaptureFailed(format!(
            "PNG encoding failed: {err}"
        )));
    }

    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_setting_round_trips() {
        let region = CaptureRegion {
            x: 10,
            y: 20,
            width: 640,
            height: 480,
        };
        let parsed: CaptureRegion = region.to_setting().parse().unwrap();
        assert_eq!(parsed, region);
    }

    #[test]
    fn region_rejects_malformed_strings() {
        assert!("10,20,640".parse::<CaptureRegion>().is_err());
        assert!("10,20,-5,480".parse::<CaptureRegion>().is_err());
        assert!("a,b,c,d".parse::<CaptureRegion>().is_err());
    }

    // Channel order is swapped on Windows, so exact reproduction is only
    // asserted where the buffer is already RGBA.
    #[cfg(not(target_os = "windows"))]
    #[test]
    fn encode_png_produces_decodable_lossless_output() {
        // 2x2 RGBA checkerboard
        let pixels = [
            255u8, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let png = encode_png(&pixels, 2, 2).unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.into_raw(), pixels.to_vec());
    }

    #[test]
    fn encode_png_expands_rgb_input() {
        let pixels = [10u8, 20, 30, 40, 50, 60];
        let png = encode_png(&pixels, 2, 1).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn encode_png_rejects_empty_buffer() {
        assert!(encode_png(&[], 2, 2).is_err());
    }
}
