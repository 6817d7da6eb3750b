//! Offline stand-in for the arm: checks targets against a bounding cube and
//! acknowledges everything inside it without any I/O.

use async_trait::async_trait;

use super::{Arm, ArmError, Point};

pub const DEFAULT_LIMIT: f64 = 200.0;

#[derive(Debug, Clone)]
pub struct ArmSimulator {
    limit: f64,
    position: Point,
    moves: u64,
}

impl ArmSimulator {
    /// Accepts targets with every coordinate within `[-limit, limit]`.
    pub fn new(limit: f64) -> Self {
        Self {
            limit,
            position: Point::default(),
            moves: 0,
        }
    }

    /// Number of acknowledged moves.
    pub fn moves(&self) -> u64 {
        self.moves
    }

    fn simulate(&mut self, target: Point) -> Result<(), ArmError> {
        let inside = |v: f64| v.abs() <= self.limit;
        if !(inside(target.x) && inside(target.y) && inside(target.z)) {
            return Err(ArmError::OutOfRange { point: target });
        }
        tracing::debug!("dummy move to {}", target);
        self.position = target;
        self.moves += 1;
        Ok(())
    }
}

impl Default for ArmSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

#[async_trait]
impl Arm for ArmSimulator {
    async fn move_to(&mut self, target: Point) -> Result<(), ArmError> {
        self.simulate(target)
    }

    async fn move_straight(&mut self, target: Point) -> Result<(), ArmError> {
        self.simulate(target)
    }

    async fn resync(&mut self) -> Result<Point, ArmError> {
        Ok(self.position)
    }

    fn position(&self) -> Point {
        self.position
    }
}
