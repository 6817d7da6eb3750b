//! Arm protocol contract shared by the serial client and the simulator.

pub mod client;
pub mod simulator;

use std::fmt;
use std::ops::Add;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::arc::{ArcPath, ArcSettings};

pub use client::{ArmClient, SerialArm};
pub use simulator::ArmSimulator;

/// Cartesian position in the arm's frame, in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:8.2} {:8.2} {:8.2}", self.x, self.y, self.z)
    }
}

/// Rotation sense of an arc seen from +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// +1 for counter-clockwise, -1 for clockwise.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Clockwise => -1.0,
            Direction::CounterClockwise => 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArmError {
    #[error("error talking to arm: {0}")]
    Io(#[from] std::io::Error),
    #[error("arm connection closed")]
    Disconnected,
    #[error("error from arm: {reply}")]
    Rejected { reply: String },
    #[error("malformed reply from arm: {reply}")]
    MalformedReply { reply: String },
    #[error("out of range: {point}")]
    OutOfRange { point: Point },
    #[error("arc segment to {point} failed: {source}")]
    ArcSegment {
        point: Point,
        #[source]
        source: Box<ArmError>,
    },
}

/// Motion capabilities of one arm controller.
///
/// Every call blocks until the controller acknowledges; requests are never
/// pipelined.
#[async_trait]
pub trait Arm: Send {
    /// Joint-interpolated move to `target`; the path is not guaranteed straight.
    async fn move_to(&mut self, target: Point) -> Result<(), ArmError>;

    /// Straight-line move to `target`.
    async fn move_straight(&mut self, target: Point) -> Result<(), ArmError>;

    /// Break: ask the controller where it is and adopt that as the believed position.
    async fn resync(&mut self) -> Result<Point, ArmError>;

    /// Believed current position.
    fn position(&self) -> Point;

    /// Arc about `center` from the believed position to `target`, sent as a
    /// run of straight segments. Stops at the first failed segment.
    async fn arc_center(
        &mut self,
        target: Point,
        center: Point,
        direction: Direction,
        settings: ArcSettings,
    ) -> Result<(), ArmError> {
        let path = ArcPath::new(self.position(), target, center, direction, settings);
        tracing::debug!("arc through {} segments", path.steps());
        for point in path {
            self.move_straight(point)
                .await
                .map_err(|source| ArmError::ArcSegment {
                    point,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}
