//! Arc splitting at quadrant lines
//!
//! The BANDIT can only interpolate arcs that stay inside one quadrant of
//! their circle. Longer arcs are cut at the lines through the centre
//! parallel to the X and Y axes.

use cgmath::{InnerSpace, Point2};
use std::f64::consts::{FRAC_PI_2, PI};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub center: Point2<f64>,
    pub clockwise: bool,
}

impl Arc {
    pub fn radius(&self) -> f64 {
        (self.start - self.center).magnitude()
    }

    fn angle_of(&self, p: Point2<f64>) -> f64 {
        let v = p - self.center;
        v.y.atan2(v.x)
    }

    /// Swept angle in radians, always positive. Coincident start and end
    /// points describe a full circle.
    pub fn sweep(&self) -> f64 {
        let a0 = self.angle_of(self.start);
        let a1 = self.angle_of(self.end);
        let raw = if self.clockwise { a0 - a1 } else { a1 - a0 };
        let sweep = raw.rem_euclid(2.0 * PI);
        if sweep < EPS {
            2.0 * PI
        } else {
            sweep
        }
    }
}

/// Point on the circle at quadrant line `k` (k * 90 degrees), placed exactly
/// on the axis line
fn quadrant_point(center: Point2<f64>, radius: f64, k: i64) -> Point2<f64> {
    match k.rem_euclid(4) {
        0 => Point2::new(center.x + radius, center.y),
        1 => Point2::new(center.x, center.y + radius),
        2 => Point2::new(center.x - radius, center.y),
        _ => Point2::new(center.x, center.y - radius),
    }
}

/// Split `arc` at the quadrant lines it crosses. Crossings closer than
/// `tolerance` (arc length) to either end are not split off, so no segment
/// is shorter than the output resolution.
pub fn split_at_quadrants(arc: &Arc, tolerance: f64) -> Vec<Arc> {
    let radius = arc.radius();
    if radius < EPS {
        return vec![*arc];
    }
    let angle_tolerance = (tolerance / radius).max(EPS);

    let mut segments = Vec::new();
    let mut angle = arc.angle_of(arc.start);
    let mut remaining = arc.sweep();
    let mut from = arc.start;

    loop {
        // next quadrant line in the direction of travel
        let k = if arc.clockwise {
            (angle / FRAC_PI_2 - EPS).ceil() as i64 - 1
        } else {
            (angle / FRAC_PI_2 + EPS).floor() as i64 + 1
        };
        let to_line = (k as f64 * FRAC_PI_2 - angle).abs();

        if remaining <= to_line + angle_tolerance {
            segments.push(Arc { start: from, end: arc.end, ..*arc });
            break;
        }

        angle = k as f64 * FRAC_PI_2;
        remaining -= to_line;

        // start sits a hair before the line: carry on from it
        if to_line < angle_tolerance {
            continue;
        }

        let to = quadrant_point(arc.center, radius, k);
        segments.push(Arc { start: from, end: to, ..*arc });
        from = to;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_circle(deg: f64, r: f64) -> Point2<f64> {
        let a = deg.to_radians();
        Point2::new(r * a.cos(), r * a.sin())
    }

    fn arc(from_deg: f64, to_deg: f64, clockwise: bool) -> Arc {
        Arc {
            start: on_circle(from_deg, 10.0),
            end: on_circle(to_deg, 10.0),
            center: Point2::new(0.0, 0.0),
            clockwise,
        }
    }

    fn close(a: Point2<f64>, b: Point2<f64>) -> bool {
        (a - b).magnitude() < 1e-6
    }

    fn assert_single_quadrant(seg: &Arc) {
        assert!(seg.sweep() <= FRAC_PI_2 + 1e-6, "segment sweeps {}", seg.sweep());
    }

    #[test]
    fn test_arc_within_quadrant_is_unchanged() {
        let a = arc(10.0, 80.0, false);
        let segments = split_at_quadrants(&a, EPS);
        assert_eq!(segments, vec![a]);
    }

    #[test]
    fn test_135_degree_arc_is_split() {
        let a = arc(0.0, 135.0, false);
        let segments = split_at_quadrants(&a, EPS);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, Point2::new(0.0, 10.0));
        assert!(close(segments[1].end, a.end));
        segments.iter().for_each(assert_single_quadrant);
    }

    #[test]
    fn test_arc_starting_mid_quadrant() {
        let segments = split_at_quadrants(&arc(45.0, 180.0, false), EPS);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, Point2::new(0.0, 10.0));
        assert!(close(segments[1].end, Point2::new(-10.0, 0.0)));
    }

    #[test]
    fn test_clockwise_split() {
        let segments = split_at_quadrants(&arc(90.0, -45.0, true), EPS);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, Point2::new(10.0, 0.0));
        assert!(segments.iter().all(|s| s.clockwise));
        segments.iter().for_each(assert_single_quadrant);
    }

    #[test]
    fn test_full_circle() {
        let a = arc(0.0, 0.0, false);
        let segments = split_at_quadrants(&a, EPS);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1].start, Point2::new(0.0, 10.0));
        assert_eq!(segments[2].start, Point2::new(-10.0, 0.0));
        assert!(close(segments[3].end, a.start));
    }

    #[test]
    fn test_offset_center() {
        let a = Arc {
            start: Point2::new(15.0, 5.0),
            end: Point2::new(5.0, 5.0),
            center: Point2::new(10.0, 5.0),
            clockwise: false,
        };
        let segments = split_at_quadrants(&a, EPS);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, Point2::new(10.0, 10.0));
        assert_eq!(segments[1].end, Point2::new(5.0, 5.0));
    }

    #[test]
    fn test_remainder_below_resolution_is_not_split_off() {
        let a = Arc {
            start: Point2::new(10.0, 0.0),
            end: Point2::new(-0.0004, 10.0),
            center: Point2::new(0.0, 0.0),
            clockwise: false,
        };
        assert_eq!(split_at_quadrants(&a, 0.0005), vec![a]);
        // finer output still splits
        assert_eq!(split_at_quadrants(&a, 0.00005).len(), 2);
    }

    #[test]
    fn test_start_just_before_line_is_not_split_off() {
        let a = Arc {
            start: Point2::new(0.0004, 10.0),
            end: Point2::new(-10.0, 0.0),
            center: Point2::new(0.0, 0.0),
            clockwise: false,
        };
        let segments = split_at_quadrants(&a, 0.0005);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, a.start);
        assert_eq!(segments[0].end, a.end);
    }
}
