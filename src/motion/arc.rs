//! Center-format arc interpolation in the XY plane.
//!
//! The arc is approximated by equal angular steps; Z moves linearly with the
//! swept angle. The start radius is assumed to equal the end radius and is
//! not re-checked.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::arm::{Direction, Point};

const EPSILON: f64 = 1e-9;

/// How the swept angle between start and end is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcSweep {
    /// Sweep `|end - start|` in the requested direction, whichever arc that lands on.
    Absolute,
    /// Sweep the arc that actually travels in the requested direction from
    /// start to end; coincident start and end is a full circle.
    #[default]
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcSettings {
    pub sweep: ArcSweep,
    /// Arc length per segment, in millimetres.
    pub segment_length: f64,
}

impl Default for ArcSettings {
    fn default() -> Self {
        Self {
            sweep: ArcSweep::default(),
            segment_length: 1.0,
        }
    }
}

/// Forward-only sequence of segment end points along an arc.
#[derive(Debug, Clone)]
pub struct ArcPath {
    center: Point,
    radius: f64,
    start_angle: f64,
    sign: f64,
    sweep: f64,
    angle_step: f64,
    z0: f64,
    dz: f64,
    steps: usize,
    step: usize,
    degenerate: Option<Point>,
}

impl ArcPath {
    pub fn new(
        start: Point,
        target: Point,
        center: Point,
        direction: Direction,
        settings: ArcSettings,
    ) -> Self {
        let radius = (start.x - center.x).hypot(start.y - center.y);
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let end_angle = (target.y - center.y).atan2(target.x - center.x);
        let sign = direction.sign();

        let sweep = match settings.sweep {
            ArcSweep::Absolute => (end_angle - start_angle).abs(),
            ArcSweep::Directional => {
                let sweep = (sign * (end_angle - start_angle)).rem_euclid(TAU);
                if sweep < EPSILON || TAU - sweep < EPSILON { TAU } else { sweep }
            }
        };

        let mut path = Self {
            center,
            radius,
            start_angle,
            sign,
            sweep,
            angle_step: 0.0,
            z0: start.z,
            dz: target.z - start.z,
            steps: 0,
            step: 0,
            degenerate: None,
        };

        if radius < EPSILON || settings.segment_length <= 0.0 {
            path.degenerate = Some(target);
            path.steps = 1;
            return path;
        }
        path.angle_step = settings.segment_length / radius;
        path.steps = (sweep / path.angle_step).ceil() as usize;
        path
    }

    /// Total number of points the path yields.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Unsigned swept angle in radians.
    pub fn sweep(&self) -> f64 {
        self.sweep
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Iterator for ArcPath {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.step >= self.steps {
            return None;
        }
        self.step += 1;
        if let Some(target) = self.degenerate {
            return Some(target);
        }
        let swept = (self.step as f64 * self.angle_step).min(self.sweep);
        let angle = self.start_angle + self.sign * swept;
        Some(Point::new(
            self.radius * angle.cos() + self.center.x,
            self.radius * angle.sin() + self.center.y,
            self.z0 + swept * (self.dz / self.sweep),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.steps - self.step;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ArcPath {}
