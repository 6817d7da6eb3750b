pub mod arm;
pub mod config;
pub mod feed;
pub mod gcode;
pub mod interpreter;
pub mod motion;
pub mod run;
pub mod web;
pub mod weblog;

pub use arm::{Arm, ArmClient, ArmError, ArmSimulator, Direction, Point, SerialArm};
pub use config::{Config, ConfigError, load_config, parse_origin};
pub use interpreter::{AxisEnvironment, Interpreter, InterpreterConfig, InterpreterError, Operation};
pub use run::{AxisStartup, RunController, RunError, RunOutcome, RunSettings, RunState};
pub use weblog::{LogBroadcaster, LogEvent, LogLevel, LogSubscription};
