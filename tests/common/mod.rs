// Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use armdmux::arm::{Arm, ArmError, Point};
use armdmux::run::{RunController, RunSettings};
use armdmux::weblog::{LogBroadcaster, LogEvent, LogSubscription};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Move(Point),
    Line(Point),
    Resync,
}

/// Arm that records every request and rejects targets with |x| above a bound.
pub struct RecordingArm {
    calls: Arc<Mutex<Vec<Call>>>,
    position: Point,
    reject_beyond: f64,
    gate: Option<(Arc<Semaphore>, usize)>,
}

impl RecordingArm {
    pub fn new() -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let arm = Self {
            calls: calls.clone(),
            position: Point::default(),
            reject_beyond: f64::INFINITY,
            gate: None,
        };
        (arm, calls)
    }

    pub fn rejecting_beyond(mut self, limit: f64) -> Self {
        self.reject_beyond = limit;
        self
    }

    /// Lets the first `free` calls through; every later call waits for a permit.
    pub fn gated(mut self, free: usize) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some((gate.clone(), free));
        (self, gate)
    }

    async fn wait_at_gate(&self) {
        if let Some((gate, free)) = &self.gate {
            let made = self.calls.lock().unwrap().len();
            if made > *free {
                gate.acquire().await.unwrap().forget();
            }
        }
    }

    async fn record(&mut self, call: Call, target: Point) -> Result<(), ArmError> {
        self.calls.lock().unwrap().push(call);
        self.wait_at_gate().await;
        if target.x.abs() > self.reject_beyond {
            return Err(ArmError::Rejected { reply: "ERR unreachable".to_string() });
        }
        self.position = target;
        Ok(())
    }
}

#[async_trait]
impl Arm for RecordingArm {
    async fn move_to(&mut self, target: Point) -> Result<(), ArmError> {
        self.record(Call::Move(target), target).await
    }

    async fn move_straight(&mut self, target: Point) -> Result<(), ArmError> {
        self.record(Call::Line(target), target).await
    }

    async fn resync(&mut self) -> Result<Point, ArmError> {
        self.calls.lock().unwrap().push(Call::Resync);
        self.wait_at_gate().await;
        Ok(self.position)
    }

    fn position(&self) -> Point {
        self.position
    }
}

pub fn settings_without_resync() -> RunSettings {
    RunSettings {
        resync_on_start: false,
        ..Default::default()
    }
}

pub fn controller(settings: RunSettings) -> (RunController, Arc<Mutex<Vec<Call>>>) {
    let (arm, calls) = RecordingArm::new();
    (RunController::new(Box::new(arm), settings, LogBroadcaster::new(1024)), calls)
}

pub fn controller_with(arm: RecordingArm, settings: RunSettings) -> RunController {
    RunController::new(Box::new(arm), settings, LogBroadcaster::new(1024))
}

pub fn calls(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
    calls.lock().unwrap().clone()
}

/// Waits until at least `n` calls have been recorded.
pub async fn wait_for_calls(recorded: &Arc<Mutex<Vec<Call>>>, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while recorded.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for arm calls");
}

pub fn drain(subscription: &mut LogSubscription) -> Vec<LogEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}
