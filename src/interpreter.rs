//! G-code command interpreter.
//!
//! Axis words update a persistent environment; G0/G1/G2/G3 queue motion.
//! Once a line has been scanned, the queued motions are bound to the
//! environment as it stands at the end of that line and executed in order.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::arm::{Arm, ArmError, Direction, Point};
use crate::gcode::parser::{Code, InvalidNumber, Line};
use crate::motion::arc::ArcSettings;
use crate::weblog::LogBroadcaster;

/// Letters whose payload is stored in the axis environment.
pub const AXIS_LETTERS: [char; 8] = ['X', 'Y', 'Z', 'I', 'J', 'K', 'E', 'F'];

/// Peripheral M-codes (fan, extruder, heaters) that are accepted and ignored.
const PERIPHERAL_CODES: [&str; 12] = [
    "M82", "M84", "M101", "M103", "M104", "M105", "M106", "M107", "M108", "M109", "M140", "M190",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisEnvironment {
    values: BTreeMap<char, f64>,
}

impl AxisEnvironment {
    /// Last value set for `axis`, or 0.
    pub fn get(&self, axis: char) -> f64 {
        self.values.get(&axis.to_ascii_uppercase()).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, axis: char, value: f64) {
        self.values.insert(axis.to_ascii_uppercase(), value);
    }

    /// (X, Y, Z)
    pub fn target(&self) -> Point {
        Point::new(self.get('X'), self.get('Y'), self.get('Z'))
    }

    /// (I, J, K)
    pub fn center(&self) -> Point {
        Point::new(self.get('I'), self.get('J'), self.get('K'))
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Millimetres,
    Inches,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InterpreterConfig {
    /// Added to every X/Y/Z and I/J/K before it reaches the arm.
    pub origin: Point,
    pub arc: ArcSettings,
}

/// A motion bound to concrete arm-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Move { target: Point },
    MoveStraight { target: Point },
    Arc { target: Point, center: Point, direction: Direction },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Move { target } => write!(f, "Move {}", target),
            Operation::MoveStraight { target } => write!(f, "Line {}", target),
            Operation::Arc { target, center, direction: Direction::Clockwise } => {
                write!(f, "Clockwise Arc to {}, around {}", target, center)
            }
            Operation::Arc { target, center, direction: Direction::CounterClockwise } => {
                write!(f, "Anti-clockwise Arc to {}, around {}", target, center)
            }
        }
    }
}

/// Runs one operation against the arm.
pub async fn execute(operation: &Operation, arm: &mut dyn Arm, arc: ArcSettings) -> Result<(), ArmError> {
    match *operation {
        Operation::Move { target } => arm.move_to(target).await,
        Operation::MoveStraight { target } => arm.move_straight(target).await,
        Operation::Arc { target, center, direction } => arm.arc_center(target, center, direction, arc).await,
    }
}

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("couldn't parse value of {code}: {source}")]
    NumericFormat {
        code: String,
        #[source]
        source: InvalidNumber,
    },
    #[error("{operation} failed: {source}")]
    Arm {
        operation: Operation,
        #[source]
        source: ArmError,
    },
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Rapid,
    Linear,
    Arc(Direction),
}

pub struct Interpreter {
    env: AxisEnvironment,
    config: InterpreterConfig,
    units: Units,
    log: LogBroadcaster,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig, env: AxisEnvironment, log: LogBroadcaster) -> Self {
        Self {
            env,
            config,
            units: Units::default(),
            log,
        }
    }

    pub fn environment(&self) -> &AxisEnvironment {
        &self.env
    }

    pub fn into_environment(self) -> AxisEnvironment {
        self.env
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Scans `line`, updating the axis environment, and returns the
    /// operations it asks for.
    ///
    /// A malformed axis value fails the whole line; nothing from it runs.
    pub fn compile(&mut self, line: &Line) -> Result<Vec<Operation>, InterpreterError> {
        let mut queue = Vec::new();
        for code in &line.codes {
            match code.class() {
                'G' | 'M' => {
                    if let Some(motion) = self.dispatch(code) {
                        queue.push(motion);
                    }
                }
                c if AXIS_LETTERS.contains(&c) => self.set_axis(code)?,
                _ => tracing::warn!("unknown code class: {} ({})", code, line),
            }
        }
        Ok(queue.into_iter().map(|motion| self.bind(motion)).collect())
    }

    /// Compiles and executes `line`, stopping at the first failed operation.
    pub async fn execute_line(&mut self, line: &Line, arm: &mut dyn Arm) -> Result<(), InterpreterError> {
        let operations = self.compile(line)?;
        if !operations.is_empty() {
            tracing::debug!("executing line {}", line);
        }
        for operation in operations {
            match execute(&operation, arm, self.config.arc).await {
                Ok(()) => self.log.info(format!("{} → OK", operation)),
                Err(source) => return Err(InterpreterError::Arm { operation, source }),
            }
        }
        Ok(())
    }

    fn set_axis(&mut self, code: &Code) -> Result<(), InterpreterError> {
        let value = code.number().map_err(|source| InterpreterError::NumericFormat {
            code: code.to_string(),
            source,
        })?;
        self.env.set(code.class(), value);
        Ok(())
    }

    fn dispatch(&mut self, code: &Code) -> Option<Motion> {
        let mnemonic = code.mnemonic();
        match mnemonic.as_str() {
            "G0" => Some(Motion::Rapid),
            "G1" => Some(Motion::Linear),
            // Centre format only: target plus centre coordinates.
            "G2" => Some(Motion::Arc(Direction::Clockwise)),
            "G3" => Some(Motion::Arc(Direction::CounterClockwise)),
            "G20" => {
                tracing::warn!("G20: inch units selected, coordinates are not converted");
                self.units = Units::Inches;
                None
            }
            "G21" => {
                self.units = Units::Millimetres;
                None
            }
            m if PERIPHERAL_CODES.contains(&m) => {
                tracing::info!("ignoring: {}", m);
                None
            }
            _ => {
                tracing::warn!("unknown code: {}", code);
                None
            }
        }
    }

    fn bind(&self, motion: Motion) -> Operation {
        let target = self.env.target() + self.config.origin;
        match motion {
            Motion::Rapid => Operation::Move { target },
            Motion::Linear => Operation::MoveStraight { target },
            Motion::Arc(direction) => Operation::Arc {
                target,
                center: self.env.center() + self.config.origin,
                direction,
            },
        }
    }
}
