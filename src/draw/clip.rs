//! Clipping of canvas geometry against a window
//!
//! At deep zoom levels canvas coordinates exceed what `f32` represents
//! exactly. Geometry is clipped to a window around the tile in `f64` before it
//! reaches the rasterizer, keeping tile-local coordinates small.

use crate::core::bounds::Bounds;
use crate::core::geo::Point;

/// Clips segment `a`-`b` to `window` (Liang–Barsky)
pub fn clip_segment(a: Point, b: Point, window: &Bounds) -> Option<(Point, Point)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let checks = [
        (-dx, a.x - window.min.x),
        (dx, window.max.x - a.x),
        (-dy, a.y - window.min.y),
        (dy, window.max.y - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| Point::new(a.x + t * dx, a.y + t * dy);
    Some((at(t0), at(t1)))
}

/// Clips an open polyline, returning the visible runs
pub fn clip_polyline(points: &[Point], window: &Bounds) -> Vec<Vec<Point>> {
    if points.len() == 1 {
        return if window.contains(&points[0]) {
            vec![points.to_vec()]
        } else {
            Vec::new()
        };
    }

    let mut runs: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for pair in points.windows(2) {
        match clip_segment(pair[0], pair[1], window) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(start);
                }
                current.push(end);
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

#[derive(Clone, Copy)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    fn inside(self, p: &Point, w: &Bounds) -> bool {
        match self {
            Self::Left => p.x >= w.min.x,
            Self::Right => p.x <= w.max.x,
            Self::Top => p.y >= w.min.y,
            Self::Bottom => p.y <= w.max.y,
        }
    }

    fn cross(self, a: Point, b: Point, w: &Bounds) -> Point {
        match self {
            Self::Left => lerp_x(a, b, w.min.x),
            Self::Right => lerp_x(a, b, w.max.x),
            Self::Top => lerp_y(a, b, w.min.y),
            Self::Bottom => lerp_y(a, b, w.max.y),
        }
    }
}

/// Clips a closed polygon to `window` (Sutherland–Hodgman)
pub fn clip_polygon(points: &[Point], window: &Bounds) -> Vec<Point> {
    let mut output = points.to_vec();
    for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &current in &input {
            let current_in = edge.inside(&current, window);
            if current_in {
                if !edge.inside(&prev, window) {
                    output.push(edge.cross(prev, current, window));
                }
                output.push(current);
            } else if edge.inside(&prev, window) {
                output.push(edge.cross(prev, current, window));
            }
            prev = current;
        }
    }
    output
}

fn lerp_x(a: Point, b: Point, x: f64) -> Point {
    let t = (x - a.x) / (b.x - a.x);
    Point::new(x, a.y + t * (b.y - a.y))
}

fn lerp_y(a: Point, b: Point, y: f64) -> Point {
    let t = (y - a.y) / (b.y - a.y);
    Point::new(a.x + t * (b.x - a.x), y)
}

/// Whether segment `a`-`b` comes within `margin` of `rect`
pub fn segment_touches(a: Point, b: Point, rect: &Bounds, margin: f64) -> bool {
    clip_segment(a, b, &rect.expanded(margin)).is_some()
}

/// Even-odd point in polygon test
pub fn point_in_polygon(point: &Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
