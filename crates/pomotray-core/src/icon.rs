//! Tray icon rendering.
//!
//! Icons are plain RGBA buffers so any tray host can present them.

use serde::Serialize;
use tracing::warn;

pub const ICON_SIZE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, `width * height * 4` bytes.
    #[serde(skip)]
    pub rgba: Vec<u8>,
}

impl IconImage {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    fn put(&mut self, x: u32, y: u32, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.rgba[i..i + 4].copy_from_slice(&[color.0, color.1, color.2, 255]);
    }
}

pub trait IconRenderer: Send + Sync {
    /// The remaining minutes as text in `color`.
    fn render_text(&self, value: &str, color: &str) -> IconImage;

    /// A solid marker, used for DONE and STARTING.
    fn render_circle(&self, color: &str) -> IconImage;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

const WHITE: Rgb = Rgb(255, 255, 255);

/// Parse `#rrggbb` (the `#` is optional).
pub fn parse_color(color: &str) -> Option<Rgb> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn color_or_white(color: &str) -> Rgb {
    parse_color(color).unwrap_or_else(|| {
        warn!(%color, "invalid icon color, using white");
        WHITE
    })
}

/// 3x5 digit glyphs, one byte per row, low three bits used.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

/// Bitmap-font renderer producing 64x64 icons.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelIconRenderer;

impl IconRenderer for PixelIconRenderer {
    fn render_text(&self, value: &str, color: &str) -> IconImage {
        let rgb = color_or_white(color);
        let glyphs: Vec<&[u8; 5]> = value
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| &DIGITS[d as usize])
            .collect();
        let mut icon = IconImage::blank(ICON_SIZE, ICON_SIZE);
        if glyphs.is_empty() {
            return icon;
        }

        let n = glyphs.len() as u32;
        let cols = n * (GLYPH_W + 1) - 1;
        let scale = (ICON_SIZE / cols).min(ICON_SIZE / GLYPH_H).max(1);
        let left = ICON_SIZE.saturating_sub(cols * scale) / 2;
        let top = ICON_SIZE.saturating_sub(GLYPH_H * scale) / 2;

        for (i, glyph) in glyphs.iter().enumerate() {
            let gx = left + i as u32 * (GLYPH_W + 1) * scale;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                        continue;
                    }
                    let x0 = gx + col * scale;
                    let y0 = top + row as u32 * scale;
                    for dy in 0..scale {
                        for dx in 0..scale {
                            icon.put(x0 + dx, y0 + dy, rgb);
                        }
                    }
                }
            }
        }
        icon
    }

    fn render_circle(&self, color: &str) -> IconImage {
        let rgb = color_or_white(color);
        let mut icon = IconImage::blank(ICON_SIZE, ICON_SIZE);
        let center = ICON_SIZE as i64 / 2;
        let radius = center - 4;
        for y in 0..ICON_SIZE {
            for x in 0..ICON_SIZE {
                let dx = x as i64 - center;
                let dy = y as i64 - center;
                if dx * dx + dy * dy <= radius * radius {
                    icon.put(x, y, rgb);
                }
            }
        }
        icon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(icon: &IconImage) -> usize {
        icon.rgba.chunks(4).filter(|p| p[3] == 255).count()
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#e74c3c"), Some(Rgb(0xe7, 0x4c, 0x3c)));
        assert_eq!(parse_color("2ecc71"), Some(Rgb(0x2e, 0xcc, 0x71)));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("#gggggg"), None);
    }

    #[test]
    fn circle_fills_center_not_corners() {
        let icon = PixelIconRenderer.render_circle("#f1c40f");
        assert_eq!(icon.rgba.len(), 64 * 64 * 4);
        assert_eq!(icon.pixel(32, 32), [0xf1, 0xc4, 0x0f, 255]);
        assert_eq!(icon.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn text_uses_state_color() {
        let icon = PixelIconRenderer.render_text("25", "#e74c3c");
        assert!(lit(&icon) > 0);
        assert!(icon
            .rgba
            .chunks(4)
            .filter(|p| p[3] == 255)
            .all(|p| p[..3] == [0xe7, 0x4c, 0x3c]));
    }

    #[test]
    fn different_values_render_differently() {
        let a = PixelIconRenderer.render_text("1", "#ffffff");
        let b = PixelIconRenderer.render_text("8", "#ffffff");
        assert!(lit(&b) > lit(&a));
        assert_ne!(
            PixelIconRenderer.render_text("120", "#ffffff"),
            PixelIconRenderer.render_text("12", "#ffffff")
        );
    }

    #[test]
    fn bad_color_falls_back_to_white() {
        let icon = PixelIconRenderer.render_circle("red");
        assert_eq!(icon.pixel(32, 32), [255, 255, 255, 255]);
    }
}
