//! Video frames and audio/video timing

use std::sync::Arc;
use yc_ffi::types::{
    GameGeometry, SystemAvInfo, SystemTiming, PIXEL_FORMAT_0RGB1555, PIXEL_FORMAT_RGB565,
    PIXEL_FORMAT_XRGB8888,
};

/// Framebuffer pixel layout negotiated through `SET_PIXEL_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// libretro's default until the core asks for something else
    #[default]
    Rgb1555,
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            PIXEL_FORMAT_0RGB1555 => Some(Self::Rgb1555),
            PIXEL_FORMAT_XRGB8888 => Some(Self::Xrgb8888),
            PIXEL_FORMAT_RGB565 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb1555 | Self::Rgb565 => 2,
            Self::Xrgb8888 => 4,
        }
    }
}

/// Owned copy of one core framebuffer, rows tightly packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `data`
    pub pitch: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Copy a core framebuffer, dropping the row padding.
    ///
    /// Returns `None` when `src` is too short for the described image.
    pub fn copy_from(
        src: &[u8],
        width: u32,
        height: u32,
        src_pitch: usize,
        format: PixelFormat,
    ) -> Option<Self> {
        let row = width as usize * format.bytes_per_pixel();
        let rows = height as usize;
        if row == 0 || rows == 0 || src_pitch < row {
            return None;
        }
        let needed = src_pitch * (rows - 1) + row;
        if src.len() < needed {
            return None;
        }

        let mut data = Vec::with_capacity(row * rows);
        for y in 0..rows {
            let start = y * src_pitch;
            data.extend_from_slice(&src[start..start + row]);
        }

        Some(Self {
            width,
            height,
            pitch: row,
            format,
            data,
        })
    }

    /// Convert to RGBA8888 for presentation
    pub fn to_rgba8(&self) -> Vec<u8> {
        let pixels = self.width as usize * self.height as usize;
        let mut out = Vec::with_capacity(pixels * 4);
        match self.format {
            PixelFormat::Xrgb8888 => {
                for px in self.data.chunks_exact(4) {
                    let v = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                    out.extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8, 0xFF]);
                }
            }
            PixelFormat::Rgb565 => {
                for px in self.data.chunks_exact(2) {
                    let v = u16::from_le_bytes([px[0], px[1]]);
                    let r = ((v >> 11) & 0x1F) as u8;
                    let g = ((v >> 5) & 0x3F) as u8;
                    let b = (v & 0x1F) as u8;
                    out.extend_from_slice(&[
                        (r << 3) | (r >> 2),
                        (g << 2) | (g >> 4),
                        (b << 3) | (b >> 2),
                        0xFF,
                    ]);
                }
            }
            PixelFormat::Rgb1555 => {
                for px in self.data.chunks_exact(2) {
                    let v = u16::from_le_bytes([px[0], px[1]]);
                    let r = ((v >> 10) & 0x1F) as u8;
                    let g = ((v >> 5) & 0x1F) as u8;
                    let b = (v & 0x1F) as u8;
                    out.extend_from_slice(&[
                        (r << 3) | (r >> 2),
                        (g << 3) | (g >> 2),
                        (b << 3) | (b >> 2),
                        0xFF,
                    ]);
                }
            }
        }
        out
    }
}

/// Output geometry reported by the core
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

impl Geometry {
    /// Display aspect ratio; non-positive values mean square pixels
    pub fn display_aspect(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else if self.base_height > 0 {
            self.base_width as f32 / self.base_height as f32
        } else {
            1.0
        }
    }
}

impl From<GameGeometry> for Geometry {
    fn from(g: GameGeometry) -> Self {
        Self {
            base_width: g.base_width,
            base_height: g.base_height,
            max_width: g.max_width,
            max_height: g.max_height,
            aspect_ratio: g.aspect_ratio,
        }
    }
}

/// Frame and sample rate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timing {
    pub fps: f64,
    pub sample_rate: f64,
}

impl From<SystemTiming> for Timing {
    fn from(t: SystemTiming) -> Self {
        Self {
            fps: t.fps,
            sample_rate: t.sample_rate,
        }
    }
}

/// Audio/video parameters of the loaded content
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvInfo {
    pub geometry: Geometry,
    pub timing: Timing,
}

impl From<SystemAvInfo> for AvInfo {
    fn from(info: SystemAvInfo) -> Self {
        Self {
            geometry: info.geometry.into(),
            timing: info.timing.into(),
        }
    }
}

/// Receives finished frames for presentation
pub trait VideoSink: Send {
    /// Negotiated geometry or pixel format changed
    fn configure(&mut self, _av: &AvInfo, _format: PixelFormat) {}

    fn present(&mut self, frame: &Arc<VideoFrame>);
}

/// Sink that keeps only the most recent frame; used headless and in tests
#[derive(Debug, Default)]
pub struct LatestFrame {
    pub frame: Option<Arc<VideoFrame>>,
    pub presented: u64,
}

impl VideoSink for LatestFrame {
    fn present(&mut self, frame: &Arc<VideoFrame>) {
        self.frame = Some(Arc::clone(frame));
        self.presented += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_strips_padding() {
        // 2x2 RGB565 with 2 bytes of padding per row
        let src = [1, 2, 3, 4, 0xAA, 0xAA, 5, 6, 7, 8, 0xAA, 0xAA];
        let frame = VideoFrame::copy_from(&src, 2, 2, 6, PixelFormat::Rgb565).unwrap();
        assert_eq!(frame.pitch, 4);
        assert_eq!(frame.data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_copy_rejects_short_source() {
        let src = [0u8; 10];
        assert!(VideoFrame::copy_from(&src, 2, 2, 6, PixelFormat::Rgb565).is_none());
        assert!(VideoFrame::copy_from(&src, 4, 1, 4, PixelFormat::Rgb565).is_none());
        assert!(VideoFrame::copy_from(&src, 0, 1, 4, PixelFormat::Rgb565).is_none());
    }

    #[test]
    fn test_last_row_needs_no_padding() {
        let src = [9u8; 6 + 4];
        let frame = VideoFrame::copy_from(&src, 2, 2, 6, PixelFormat::Rgb565).unwrap();
        assert_eq!(frame.data.len(), 8);
    }

    #[test]
    fn test_rgba_conversion() {
        let xrgb = VideoFrame {
            width: 1,
            height: 1,
            pitch: 4,
            format: PixelFormat::Xrgb8888,
            data: 0x0012_3456u32.to_le_bytes().to_vec(),
        };
        assert_eq!(xrgb.to_rgba8(), vec![0x12, 0x34, 0x56, 0xFF]);

        let rgb565 = VideoFrame {
            width: 1,
            height: 1,
            pitch: 2,
            format: PixelFormat::Rgb565,
            data: 0xF800u16.to_le_bytes().to_vec(),
        };
        assert_eq!(rgb565.to_rgba8(), vec![0xFF, 0, 0, 0xFF]);

        let rgb1555 = VideoFrame {
            width: 1,
            height: 1,
            pitch: 2,
            format: PixelFormat::Rgb1555,
            data: 0x001Fu16.to_le_bytes().to_vec(),
        };
        assert_eq!(rgb1555.to_rgba8(), vec![0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_pixel_format_from_raw() {
        assert_eq!(PixelFormat::from_raw(1), Some(PixelFormat::Xrgb8888));
        assert_eq!(PixelFormat::from_raw(3), None);
    }

    #[test]
    fn test_display_aspect() {
        let g = Geometry {
            base_width: 256,
            base_height: 224,
            aspect_ratio: 0.0,
            ..Default::default()
        };
        assert!((g.display_aspect() - 256.0 / 224.0).abs() < 1e-6);
    }
}
