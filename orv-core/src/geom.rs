//! Track geometry
//!
//! World-coordinate extents and the world-to-pixel projection shared by the
//! background renderer and the frame compositor. The extents are computed
//! once per session from every observed position and never change
//! afterwards, so every frame of a session draws in the same pixel space.

use serde::Serialize;

/// Axis-aligned bounding box of all observed world positions in a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackExtents {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl TrackExtents {
    /// Bounding box of a point set. `None` when the set is empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut ext = Self {
            min_x: x0,
            max_x: x0,
            min_y: y0,
            max_y: y0,
        };
        for (x, y) in iter {
            ext.min_x = ext.min_x.min(x);
            ext.max_x = ext.max_x.max(x);
            ext.min_y = ext.min_y.min(y);
            ext.max_y = ext.max_y.max(y);
        }
        Some(ext)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the box has no area, e.g. a session whose samples all sit
    /// on one spot. Projection through such a box would divide by zero.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Fraction of the canvas left blank on each side.
const MARGIN_FRAC: f64 = 0.05;

/// Canvas width in pixels; height follows the track's aspect ratio.
const CANVAS_WIDTH: u32 = 1000;

/// Shortest and tallest canvas allowed, so a long thin circuit still
/// produces a usable image.
const MIN_CANVAS_HEIGHT: u32 = 200;
const MAX_CANVAS_HEIGHT: u32 = 2000;

/// Mapping from world coordinates into a fixed pixel canvas.
///
/// World +y points up; pixel +y points down, so the projection flips the
/// vertical axis. Points outside the extents project outside the margin
/// (the drawing primitives clip, so that is allowed).
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    extents: TrackExtents,
    width: u32,
    height: u32,
}

impl Projection {
    /// Build the projection for a session. `None` when the extents are
    /// degenerate.
    pub fn new(extents: TrackExtents) -> Option<Self> {
        if extents.is_degenerate() {
            return None;
        }
        let aspect = extents.height() / extents.width();
        let height = (CANVAS_WIDTH as f64 * aspect).round() as u32;
        let height = height.clamp(MIN_CANVAS_HEIGHT, MAX_CANVAS_HEIGHT);
        Some(Self {
            extents,
            width: CANVAS_WIDTH,
            height,
        })
    }

    pub fn canvas_width(&self) -> u32 {
        self.width
    }

    pub fn canvas_height(&self) -> u32 {
        self.height
    }

    /// World position to pixel position, margin applied, y flipped.
    pub fn project(&self, x: f64, y: f64) -> (i64, i64) {
        let usable_w = self.width as f64 * (1.0 - 2.0 * MARGIN_FRAC);
        let usable_h = self.height as f64 * (1.0 - 2.0 * MARGIN_FRAC);
        let margin_x = self.width as f64 * MARGIN_FRAC;
        let margin_y = self.height as f64 * MARGIN_FRAC;
        let x_frac = (x - self.extents.min_x) / self.extents.width();
        let y_frac = (self.extents.max_y - y) / self.extents.height();
        let px = margin_x + x_frac * usable_w;
        let py = margin_y + y_frac * usable_h;
        (px.round() as i64, py.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_of_empty_point_set_is_none() {
        assert!(TrackExtents::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn extents_cover_all_points() {
        let ext =
            TrackExtents::from_points(vec![(0.0, 5.0), (-10.0, 2.0), (4.0, -3.0)]).unwrap();
        assert_eq!(ext.min_x, -10.0);
        assert_eq!(ext.max_x, 4.0);
        assert_eq!(ext.min_y, -3.0);
        assert_eq!(ext.max_y, 5.0);
        assert!(!ext.is_degenerate());
    }

    #[test]
    fn flat_extents_are_degenerate() {
        let ext = TrackExtents::from_points(vec![(0.0, 7.0), (100.0, 7.0)]).unwrap();
        assert!(ext.is_degenerate());
        assert!(Projection::new(ext).is_none());
    }

    #[test]
    fn canvas_height_follows_aspect_ratio() {
        let ext = TrackExtents::from_points(vec![(0.0, 0.0), (100.0, 50.0)]).unwrap();
        let proj = Projection::new(ext).unwrap();
        assert_eq!(proj.canvas_width(), 1000);
        assert_eq!(proj.canvas_height(), 500);
    }

    #[test]
    fn canvas_height_is_clamped_for_extreme_aspects() {
        let thin = TrackExtents::from_points(vec![(0.0, 0.0), (1000.0, 10.0)]).unwrap();
        assert_eq!(Projection::new(thin).unwrap().canvas_height(), 200);
        let tall = TrackExtents::from_points(vec![(0.0, 0.0), (10.0, 1000.0)]).unwrap();
        assert_eq!(Projection::new(tall).unwrap().canvas_height(), 2000);
    }

    #[test]
    fn projection_flips_y_and_keeps_margin() {
        let ext = TrackExtents::from_points(vec![(0.0, 0.0), (100.0, 100.0)]).unwrap();
        let proj = Projection::new(ext).unwrap();
        let (left, top) = proj.project(0.0, 100.0);
        let (right, bottom) = proj.project(100.0, 0.0);
        // world top-left lands in the canvas top-left, inside the margin
        assert_eq!((left, top), (50, 50));
        assert_eq!((right, bottom), (950, 950));
        // a point above the midline lands in the upper half
        let (_, upper) = proj.project(50.0, 75.0);
        let (_, lower) = proj.project(50.0, 25.0);
        assert!(upper < lower);
    }
}
