//! Contains the data models for API requests and responses.

use serde::Serialize;
use uuid::Uuid;

use crate::run::RunState;

/// Current state of the run controller.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: RunState,
    pub run: Option<Uuid>,
    pub log_subscribers: usize,
}

/// Reply to a stop request.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopping: bool,
}
