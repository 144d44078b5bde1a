//! Coordinate systems: how the two position channels land on the drawing plane.

use std::f64::consts::PI;

/// Latitude beyond which the Mercator projection diverges.
pub const MERCATOR_MAX_LAT: f64 = 85.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Plate carrée: longitude and latitude used directly.
    #[default]
    Equirectangular,
    Mercator,
}

impl Projection {
    /// Project `(longitude, latitude)` in degrees.
    pub fn project(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Equirectangular => (lon, lat),
            Projection::Mercator => {
                let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                let y = (PI / 4.0 + lat / 2.0).tan().ln().to_degrees();
                (lon, y)
            }
        }
    }
}

/// Longitude/latitude bounding window of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Window {
    pub fn new(xlim: (f64, f64), ylim: (f64, f64)) -> Self {
        Window {
            xmin: xlim.0.min(xlim.1),
            xmax: xlim.0.max(xlim.1),
            ymin: ylim.0.min(ylim.1),
            ymax: ylim.0.max(ylim.1),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

/// Coordinate system of a plot; exactly one per plot.
#[derive(Debug, Clone, PartialEq)]
pub enum Coord {
    Cartesian {
        /// Swap the horizontal and vertical roles of x and y.
        flip: bool,
        /// Visible x range; data outside stays in the scales.
        xlim: Option<(f64, f64)>,
        ylim: Option<(f64, f64)>,
    },
    Map {
        projection: Projection,
        window: Option<Window>,
    },
}

impl Default for Coord {
    fn default() -> Self {
        Coord::cartesian()
    }
}

impl Coord {
    pub fn cartesian() -> Self {
        Coord::Cartesian {
            flip: false,
            xlim: None,
            ylim: None,
        }
    }

    pub fn flip() -> Self {
        Coord::Cartesian {
            flip: true,
            xlim: None,
            ylim: None,
        }
    }

    pub fn map(projection: Projection) -> Self {
        Coord::Map {
            projection,
            window: None,
        }
    }

    /// Zoom a cartesian system, or set the window of a map.
    pub fn xlim(mut self, min: f64, max: f64) -> Self {
        match &mut self {
            Coord::Cartesian { xlim, .. } => *xlim = Some((min, max)),
            Coord::Map { window, .. } => {
                let w = window.get_or_insert(Window::new((min, max), (-90.0, 90.0)));
                *w = Window::new((min, max), (w.ymin, w.ymax));
            }
        }
        self
    }

    pub fn ylim(mut self, min: f64, max: f64) -> Self {
        match &mut self {
            Coord::Cartesian { ylim, .. } => *ylim = Some((min, max)),
            Coord::Map { window, .. } => {
                let w = window.get_or_insert(Window::new((-180.0, 180.0), (min, max)));
                *w = Window::new((w.xmin, w.xmax), (min, max));
            }
        }
        self
    }

    pub fn is_flipped(&self) -> bool {
        matches!(self, Coord::Cartesian { flip: true, .. })
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Coord::Map { .. })
    }

    /// Map a data point to plane coordinates; `None` when a map window excludes it.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self {
            Coord::Cartesian { .. } => Some((x, y)),
            Coord::Map { projection, window } => {
                if let Some(w) = window {
                    if !w.contains(x, y) {
                        return None;
                    }
                }
                Some(projection.project(x, y))
            }
        }
    }

    /// Project without the window check, for geometry already clipped to it.
    pub fn project_clipped(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Coord::Cartesian { .. } => (x, y),
            Coord::Map { projection, .. } => projection.project(x, y),
        }
    }

    /// Clip a polygon ring to the map window (unchanged without one).
    pub fn clip_ring(&self, ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
        match self {
            Coord::Map {
                window: Some(w), ..
            } => clip_polygon(ring, (w.xmin, w.ymin), (w.xmax, w.ymax)),
            _ => ring.to_vec(),
        }
    }

    /// Longitude/latitude corners of the map window.
    pub fn window_bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        match self {
            Coord::Map {
                window: Some(w), ..
            } => Some(((w.xmin, w.ymin), (w.xmax, w.ymax))),
            _ => None,
        }
    }

    /// Visible x/y extents in projected space, if fixed by the coordinate system.
    pub fn position_limits(&self) -> (Option<(f64, f64)>, Option<(f64, f64)>) {
        match self {
            Coord::Cartesian { xlim, ylim, .. } => (*xlim, *ylim),
            Coord::Map {
                projection,
                window: Some(w),
            } => {
                let (x0, y0) = projection.project(w.xmin, w.ymin);
                let (x1, y1) = projection.project(w.xmax, w.ymax);
                (Some((x0, x1)), Some((y0, y1)))
            }
            Coord::Map { window: None, .. } => (None, None),
        }
    }

    /// Unit-interval scale outputs to (horizontal, vertical) fractions of the panel.
    pub fn orient(&self, ux: f64, uy: f64) -> (f64, f64) {
        if self.is_flipped() {
            (uy, ux)
        } else {
            (ux, uy)
        }
    }
}

/// Sutherland–Hodgman clipping of a polygon against an axis-aligned rectangle.
pub fn clip_polygon(ring: &[(f64, f64)], min: (f64, f64), max: (f64, f64)) -> Vec<(f64, f64)> {
    #[derive(Clone, Copy)]
    enum Edge {
        Left(f64),
        Right(f64),
        Bottom(f64),
        Top(f64),
    }

    fn inside(p: (f64, f64), edge: Edge) -> bool {
        match edge {
            Edge::Left(x) => p.0 >= x,
            Edge::Right(x) => p.0 <= x,
            Edge::Bottom(y) => p.1 >= y,
            Edge::Top(y) => p.1 <= y,
        }
    }

    fn intersect(a: (f64, f64), b: (f64, f64), edge: Edge) -> (f64, f64) {
        match edge {
            Edge::Left(x) | Edge::Right(x) => {
                let t = (x - a.0) / (b.0 - a.0);
                (x, a.1 + t * (b.1 - a.1))
            }
            Edge::Bottom(y) | Edge::Top(y) => {
                let t = (y - a.1) / (b.1 - a.1);
                (a.0 + t * (b.0 - a.0), y)
            }
        }
    }

    let mut output = ring.to_vec();
    for edge in [Edge::Left(min.0), Edge::Right(max.0), Edge::Bottom(min.1), Edge::Top(max.1)] {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &current in &input {
            match (inside(current, edge), inside(prev, edge)) {
                (true, true) => output.push(current),
                (true, false) => {
                    output.push(intersect(prev, current, edge));
                    output.push(current);
                }
                (false, true) => output.push(intersect(prev, current, edge)),
                (false, false) => {}
            }
            prev = current;
        }
    }
    output
}

/// Liang–Barsky clipping of a segment; `None` when it misses the rectangle.
pub fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    min: (f64, f64),
    max: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [
        (-dx, a.0 - min.0),
        (dx, max.0 - a.0),
        (-dy, a.1 - min.1),
        (dy, max.1 - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

/// Clip a polyline, splitting it where it leaves the rectangle.
pub fn clip_polyline(points: &[(f64, f64)], min: (f64, f64), max: (f64, f64)) -> Vec<Vec<(f64, f64)>> {
    let mut runs: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for pair in points.windows(2) {
        match clip_segment(pair[0], pair[1], min, max) {
            Some((s, e)) => {
                if current.last() != Some(&s) {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(s);
                }
                current.push(e);
            }
            None => {
                if current.len() > 1 {
                    runs.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if current.len() > 1 {
        runs.push(current);
    }
    runs
}
