pub mod arc;

pub use arc::{ArcPath, ArcSettings, ArcSweep};
