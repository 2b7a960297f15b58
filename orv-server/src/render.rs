//! Server-side frame rendering
//!
//! Draws the track silhouette once per session and composites per-frame
//! driver markers on top of it, returning encoded PNGs. The drawing
//! primitives are hand-rolled over an RGB8 buffer; the `image` crate only
//! does the PNG encoding.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use orv_core::geom::{Projection, TrackExtents};
use orv_core::model::{CarMetrics, DriverRoster, MergedSample};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("track extents are degenerate, nothing to draw")]
    DegenerateExtents,
    #[error("failed to encode PNG")]
    Encode(#[from] image::ImageError),
}

/// Marker coloring for composited frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Team,
    Gear,
}

// ============================================================================
// Color Palette
// ============================================================================

struct Palette;
impl Palette {
    const BACKGROUND: [u8; 3] = [14, 17, 23]; // #0E1117
    const TRACK_LINE: [u8; 3] = [68, 68, 68]; // #444444
    const OUTLINE: [u8; 3] = [0, 0, 0];
    const TEXT: [u8; 3] = [255, 255, 255];
    const PLAQUE: [u8; 3] = [0, 0, 0];
    const BRAKE_HALO: [u8; 3] = [255, 20, 20];
}

/// Marker fill per gear in gear mode: neutral first, then a low-to-high ramp.
pub const GEAR_COLORS: [[u8; 3]; 9] = [
    [255, 255, 255], // N
    [255, 0, 0],     // 1
    [255, 69, 0],    // 2
    [255, 140, 0],   // 3
    [255, 215, 0],   // 4
    [173, 255, 47],  // 5
    [0, 255, 0],     // 6
    [0, 191, 255],   // 7
    [30, 144, 255],  // 8
];

const TRACK_LINE_WIDTH: u32 = 5;
const MARKER_RADIUS: u32 = 12;
const MARKER_OUTLINE_WIDTH: u32 = 2;
const BRAKE_HALO_EXTRA: u32 = 8;
const BRAKE_HALO_ALPHA: u8 = 200;
const BRAKE_HIGHLIGHT_THRESHOLD: f64 = 50.0;
const PLAQUE_ALPHA: u8 = 160;
const TEXT_SCALE: u32 = 2;
const LABEL_GAP: i64 = 6;

// ============================================================================
// Embedded 5x7 Bitmap Font (ASCII 32..=90: punctuation, digits, uppercase)
// ============================================================================

/// Each glyph: 7 rows, each row's lower 5 bits = pixels (MSB=left).
/// Character cell: 6px wide (5+1 spacing) before scaling.
const CHAR_W: u32 = 6;

#[rustfmt::skip]
const FONT_5X7: [[u8; 7]; 59] = [
    [0x00,0x00,0x00,0x00,0x00,0x00,0x00], // 32 ' '
    [0x04,0x04,0x04,0x04,0x04,0x00,0x04], // 33 '!'
    [0x0A,0x0A,0x0A,0x00,0x00,0x00,0x00], // 34 '"'
    [0x0A,0x0A,0x1F,0x0A,0x1F,0x0A,0x0A], // 35 '#'
    [0x04,0x0F,0x14,0x0E,0x05,0x1E,0x04], // 36 '$'
    [0x18,0x19,0x02,0x04,0x08,0x13,0x03], // 37 '%'
    [0x0C,0x12,0x14,0x08,0x15,0x12,0x0D], // 38 '&'
    [0x04,0x04,0x08,0x00,0x00,0x00,0x00], // 39 '''
    [0x02,0x04,0x08,0x08,0x08,0x04,0x02], // 40 '('
    [0x08,0x04,0x02,0x02,0x02,0x04,0x08], // 41 ')'
    [0x00,0x04,0x15,0x0E,0x15,0x04,0x00], // 42 '*'
    [0x00,0x04,0x04,0x1F,0x04,0x04,0x00], // 43 '+'
    [0x00,0x00,0x00,0x00,0x00,0x04,0x08], // 44 ','
    [0x00,0x00,0x00,0x1F,0x00,0x00,0x00], // 45 '-'
    [0x00,0x00,0x00,0x00,0x00,0x00,0x04], // 46 '.'
    [0x00,0x01,0x02,0x04,0x08,0x10,0x00], // 47 '/'
    [0x0E,0x11,0x13,0x15,0x19,0x11,0x0E], // 48 '0'
    [0x04,0x0C,0x04,0x04,0x04,0x04,0x0E], // 49 '1'
    [0x0E,0x11,0x01,0x02,0x04,0x08,0x1F], // 50 '2'
    [0x1F,0x02,0x04,0x02,0x01,0x11,0x0E], // 51 '3'
    [0x02,0x06,0x0A,0x12,0x1F,0x02,0x02], // 52 '4'
    [0x1F,0x10,0x1E,0x01,0x01,0x11,0x0E], // 53 '5'
    [0x06,0x08,0x10,0x1E,0x11,0x11,0x0E], // 54 '6'
    [0x1F,0x01,0x02,0x04,0x08,0x08,0x08], // 55 '7'
    [0x0E,0x11,0x11,0x0E,0x11,0x11,0x0E], // 56 '8'
    [0x0E,0x11,0x11,0x0F,0x01,0x02,0x0C], // 57 '9'
    [0x00,0x00,0x04,0x00,0x00,0x04,0x00], // 58 ':'
    [0x00,0x00,0x04,0x00,0x00,0x04,0x08], // 59 ';'
    [0x02,0x04,0x08,0x10,0x08,0x04,0x02], // 60 '<'
    [0x00,0x00,0x1F,0x00,0x1F,0x00,0x00], // 61 '='
    [0x08,0x04,0x02,0x01,0x02,0x04,0x08], // 62 '>'
    [0x0E,0x11,0x01,0x02,0x04,0x00,0x04], // 63 '?'
    [0x0E,0x11,0x17,0x15,0x17,0x10,0x0E], // 64 '@'
    [0x0E,0x11,0x11,0x1F,0x11,0x11,0x11], // 65 'A'
    [0x1E,0x11,0x11,0x1E,0x11,0x11,0x1E], // 66 'B'
    [0x0E,0x11,0x10,0x10,0x10,0x11,0x0E], // 67 'C'
    [0x1C,0x12,0x11,0x11,0x11,0x12,0x1C], // 68 'D'
    [0x1F,0x10,0x10,0x1E,0x10,0x10,0x1F], // 69 'E'
    [0x1F,0x10,0x10,0x1E,0x10,0x10,0x10], // 70 'F'
    [0x0E,0x11,0x10,0x17,0x11,0x11,0x0F], // 71 'G'
    [0x11,0x11,0x11,0x1F,0x11,0x11,0x11], // 72 'H'
    [0x0E,0x04,0x04,0x04,0x04,0x04,0x0E], // 73 'I'
    [0x07,0x02,0x02,0x02,0x02,0x12,0x0C], // 74 'J'
    [0x11,0x12,0x14,0x18,0x14,0x12,0x11], // 75 'K'
    [0x10,0x10,0x10,0x10,0x10,0x10,0x1F], // 76 'L'
    [0x11,0x1B,0x15,0x15,0x11,0x11,0x11], // 77 'M'
    [0x11,0x11,0x19,0x15,0x13,0x11,0x11], // 78 'N'
    [0x0E,0x11,0x11,0x11,0x11,0x11,0x0E], // 79 'O'
    [0x1E,0x11,0x11,0x1E,0x10,0x10,0x10], // 80 'P'
    [0x0E,0x11,0x11,0x11,0x15,0x12,0x0D], // 81 'Q'
    [0x1E,0x11,0x11,0x1E,0x14,0x12,0x11], // 82 'R'
    [0x0F,0x10,0x10,0x0E,0x01,0x01,0x1E], // 83 'S'
    [0x1F,0x04,0x04,0x04,0x04,0x04,0x04], // 84 'T'
    [0x11,0x11,0x11,0x11,0x11,0x11,0x0E], // 85 'U'
    [0x11,0x11,0x11,0x11,0x11,0x0A,0x04], // 86 'V'
    [0x11,0x11,0x11,0x15,0x15,0x1B,0x11], // 87 'W'
    [0x11,0x11,0x0A,0x04,0x0A,0x11,0x11], // 88 'X'
    [0x11,0x11,0x0A,0x04,0x04,0x04,0x04], // 89 'Y'
    [0x1F,0x01,0x02,0x04,0x08,0x10,0x1F], // 90 'Z'
];

// ============================================================================
// Canvas — RGB8 buffer with clipping primitives
// ============================================================================

#[derive(Clone)]
struct Canvas {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32, fill: [u8; 3]) -> Self {
        let mut buf = vec![0u8; (width * height * 3) as usize];
        for chunk in buf.chunks_exact_mut(3) {
            chunk.copy_from_slice(&fill);
        }
        Self { width, height, buf }
    }

    #[inline]
    fn set_pixel(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 3) as usize;
        self.buf[idx..idx + 3].copy_from_slice(&color);
    }

    #[inline]
    fn blend_pixel(&mut self, x: i64, y: i64, color: [u8; 3], alpha: u8) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 3) as usize;
        let a = alpha as u16;
        for c in 0..3 {
            let base = self.buf[idx + c] as u16;
            self.buf[idx + c] = ((color[c] as u16 * a + base * (255 - a)) / 255) as u8;
        }
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: [u8; 3]) {
        for dy in 0..h as i64 {
            for dx in 0..w as i64 {
                self.set_pixel(x + dx, y + dy, color);
            }
        }
    }

    fn blend_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: [u8; 3], alpha: u8) {
        for dy in 0..h as i64 {
            for dx in 0..w as i64 {
                self.blend_pixel(x + dx, y + dy, color, alpha);
            }
        }
    }

    fn draw_dot(&mut self, cx: i64, cy: i64, radius: u32, color: [u8; 3]) {
        let r = radius as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn blend_dot(&mut self, cx: i64, cy: i64, radius: u32, color: [u8; 3], alpha: u8) {
        let r = radius as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.blend_pixel(cx + dx, cy + dy, color, alpha);
                }
            }
        }
    }

    /// Thick line segment, drawn by stamping round dots along the span
    fn draw_line(&mut self, from: (i64, i64), to: (i64, i64), width: u32, color: [u8; 3]) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).max(1);
        let r = width / 2;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = from.0 as f64 + (to.0 - from.0) as f64 * t;
            let y = from.1 as f64 + (to.1 - from.1) as f64 * t;
            self.draw_dot(x.round() as i64, y.round() as i64, r, color);
        }
    }

    fn draw_polyline(&mut self, points: &[(i64, i64)], width: u32, color: [u8; 3]) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], width, color);
        }
    }

    fn draw_char(&mut self, x: i64, y: i64, ch: char, color: [u8; 3], scale: u32) {
        let code = ch as u32;
        if !(32..=90).contains(&code) {
            return;
        }
        let glyph = &FONT_5X7[(code - 32) as usize];
        let s = scale as i64;
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0x10 >> col) != 0 {
                    self.fill_rect(x + col as i64 * s, y + row as i64 * s, scale, scale, color);
                }
            }
        }
    }

    fn draw_text(&mut self, x: i64, y: i64, text: &str, color: [u8; 3], scale: u32) {
        for (i, ch) in text.chars().enumerate() {
            self.draw_char(x + i as i64 * (CHAR_W * scale) as i64, y, ch, color, scale);
        }
    }

    fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        let encoder = PngEncoder::new(&mut out);
        encoder.write_image(&self.buf, self.width, self.height, ExtendedColorType::Rgb8)?;
        Ok(out)
    }

    #[cfg(test)]
    fn pixel(&self, x: i64, y: i64) -> [u8; 3] {
        let idx = ((y as u32 * self.width + x as u32) * 3) as usize;
        [self.buf[idx], self.buf[idx + 1], self.buf[idx + 2]]
    }
}

// ============================================================================
// TrackMap — cached background plus per-frame composition
// ============================================================================

/// Per-session renderer: the projection and the track silhouette, drawn once
/// when the session loads. Composition never touches the cached background.
pub struct TrackMap {
    projection: Projection,
    background: Canvas,
}

impl TrackMap {
    /// Build the background from one driver's path through the session.
    pub fn new(extents: TrackExtents, path: &[(f64, f64)]) -> Result<Self, RenderError> {
        let projection = Projection::new(extents).ok_or(RenderError::DegenerateExtents)?;
        let mut background = Canvas::new(
            projection.canvas_width(),
            projection.canvas_height(),
            Palette::BACKGROUND,
        );
        let points: Vec<(i64, i64)> = path.iter().map(|&(x, y)| projection.project(x, y)).collect();
        background.draw_polyline(&points, TRACK_LINE_WIDTH, Palette::TRACK_LINE);
        Ok(Self {
            projection,
            background,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Composite one frame onto a copy of the background and encode it.
    pub fn compose(
        &self,
        rows: &BTreeMap<u32, MergedSample>,
        roster: &DriverRoster,
        mode: DisplayMode,
        selected: Option<&[u32]>,
    ) -> Result<Vec<u8>, RenderError> {
        self.compose_canvas(rows, roster, mode, selected).to_png()
    }

    fn compose_canvas(
        &self,
        rows: &BTreeMap<u32, MergedSample>,
        roster: &DriverRoster,
        mode: DisplayMode,
        selected: Option<&[u32]>,
    ) -> Canvas {
        let mut canvas = self.background.clone();
        for (&driver, sample) in rows {
            if let Some(selected) = selected {
                if !selected.contains(&driver) {
                    continue;
                }
            }
            let (px, py) = self.projection.project(sample.x, sample.y);

            let color = match mode {
                DisplayMode::Team => roster.color_rgb(driver),
                DisplayMode::Gear => gear_color(sample.car),
            };

            if mode == DisplayMode::Gear {
                if let Some(car) = sample.car {
                    if car.brake.0 > BRAKE_HIGHLIGHT_THRESHOLD {
                        canvas.blend_dot(
                            px,
                            py,
                            MARKER_RADIUS + BRAKE_HALO_EXTRA,
                            Palette::BRAKE_HALO,
                            BRAKE_HALO_ALPHA,
                        );
                    }
                }
            }

            canvas.draw_dot(px, py, MARKER_RADIUS, Palette::OUTLINE);
            canvas.draw_dot(px, py, MARKER_RADIUS - MARKER_OUTLINE_WIDTH, color);

            draw_label(&mut canvas, px, py, &roster.display_acronym(driver));
        }
        canvas
    }
}

fn gear_color(car: Option<CarMetrics>) -> [u8; 3] {
    match car {
        Some(car) => GEAR_COLORS[(car.gear.0 as usize).min(GEAR_COLORS.len() - 1)],
        None => GEAR_COLORS[0],
    }
}

/// Acronym on a translucent plaque above the marker
fn draw_label(canvas: &mut Canvas, px: i64, py: i64, text: &str) {
    let scale = TEXT_SCALE as i64;
    let tw = (text.chars().count() as i64 * CHAR_W as i64 - 1) * scale;
    let th = 7 * scale;
    let tx = px - tw / 2;
    let ty = py - MARKER_RADIUS as i64 - LABEL_GAP - th;
    canvas.blend_rect(
        tx - 3,
        ty - 2,
        (tw + 6) as u32,
        (th + 4) as u32,
        Palette::PLAQUE,
        PLAQUE_ALPHA,
    );
    canvas.draw_text(tx, ty, text, Palette::TEXT, TEXT_SCALE);
}
