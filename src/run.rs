//! Run/stop control for motion programs.
//!
//! At most one program runs at a time: a run holds the arm's lock for its
//! whole duration and a start request that cannot take the lock is rejected.
//! Stopping is cooperative and takes effect at the next line boundary.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::watch;
use uuid::Uuid;

use crate::arm::Arm;
use crate::gcode::parser::{ParseError, Parser};
use crate::interpreter::{AxisEnvironment, Interpreter, InterpreterConfig};
use crate::weblog::{LogBroadcaster, LogSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

/// Axis environment a new run starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisStartup {
    /// Every axis starts at 0.
    #[default]
    Reset,
    /// Axes keep the values the previous run left behind.
    Inherit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub interpreter: InterpreterConfig,
    pub axis_startup: AxisStartup,
    /// Issue a Break at the start of each run so arcs start from the true position.
    pub resync_on_start: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            axis_startup: AxisStartup::default(),
            resync_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RunOutcome {
    /// The source ran out.
    Completed { lines: usize },
    /// A stop request ended the run.
    Cancelled { lines: usize },
    /// The run hit an error on `line` (0 before the first line).
    Aborted { line: usize, error: String },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("the arm is already running")]
    AlreadyRunning,
}

/// Cancellation handle for one run.
#[derive(Debug)]
pub struct RunSession {
    id: Uuid,
    cancel: watch::Sender<bool>,
}

impl RunSession {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the session is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

struct Inner {
    arm: tokio::sync::Mutex<Box<dyn Arm>>,
    active: Mutex<Option<Arc<RunSession>>>,
    carried: Mutex<AxisEnvironment>,
    settings: RunSettings,
    log: LogBroadcaster,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the active slot when a run ends, including when its future is dropped.
struct ActiveRun<'a> {
    active: &'a Mutex<Option<Arc<RunSession>>>,
    session: Arc<RunSession>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut active = lock(self.active);
        if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, &self.session)) {
            *active = None;
        }
    }
}

/// Entry point for the transport layer: start, stop, subscribe.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl RunController {
    pub fn new(arm: Box<dyn Arm>, settings: RunSettings, log: LogBroadcaster) -> Self {
        Self {
            inner: Arc::new(Inner {
                arm: tokio::sync::Mutex::new(arm),
                active: Mutex::new(None),
                carried: Mutex::new(AxisEnvironment::default()),
                settings,
                log,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        match lock(&self.inner.active).as_ref() {
            None => RunState::Idle,
            Some(session) if session.is_cancelled() => RunState::Stopping,
            Some(_) => RunState::Running,
        }
    }

    /// Id of the active run, if any.
    pub fn active_run(&self) -> Option<Uuid> {
        lock(&self.inner.active).as_ref().map(|s| s.id())
    }

    pub fn log(&self) -> &LogBroadcaster {
        &self.inner.log
    }

    pub fn subscribe(&self) -> LogSubscription {
        self.inner.log.subscribe()
    }

    /// Runs the motion program read from `source` to completion.
    ///
    /// `requester` only labels log messages. Fails with
    /// [`RunError::AlreadyRunning`] without touching the active run if one
    /// is in progress.
    pub async fn start<R>(&self, source: R, requester: &str) -> Result<RunOutcome, RunError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let log = &self.inner.log;
        let session = Arc::new(RunSession::new());
        // The active slot is held across try_lock so a concurrent stop sees
        // either no run or this one.
        let mut arm = {
            let mut active = lock(&self.inner.active);
            let Ok(arm) = self.inner.arm.try_lock() else {
                drop(active);
                log.warn(format!("Got run request from {}, but the arm is already running.", requester));
                return Err(RunError::AlreadyRunning);
            };
            *active = Some(session.clone());
            arm
        };
        let _active = ActiveRun {
            active: &self.inner.active,
            session: session.clone(),
        };
        log.info(format!("Got run request from {}", requester));
        log.info(format!("RUNNING GCODE! (run {})", session.id()));

        let outcome = self.run(&mut **arm, source, &session).await;

        match &outcome {
            RunOutcome::Completed { lines } => log.info(format!("Done. {} lines", lines)),
            RunOutcome::Cancelled { lines } => log.info(format!("Stopped after {} lines", lines)),
            RunOutcome::Aborted { line, .. } => log.info(format!("Aborted at line {}", line)),
        }
        drop(arm);
        Ok(outcome)
    }

    /// Requests cancellation of the active run. Returns false when idle.
    pub fn stop(&self, requester: &str) -> bool {
        let active = lock(&self.inner.active).clone();
        match active {
            Some(session) if !session.is_cancelled() => {
                session.cancel();
                self.inner.log.info(format!("Got stop request from {}", requester));
                self.inner.log.info("Stopped sending Gcode");
                true
            }
            Some(_) => {
                self.inner.log.warn(format!("Got stop request from {}, but the run is already stopping.", requester));
                false
            }
            None => {
                self.inner.log.warn(format!("Got stop request from {}, but the arm isn't running.", requester));
                false
            }
        }
    }

    async fn run<R>(&self, arm: &mut dyn Arm, source: R, session: &RunSession) -> RunOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        let settings = &self.inner.settings;
        let log = &self.inner.log;

        if settings.resync_on_start {
            match arm.resync().await {
                Ok(position) => log.info(format!("Arm at {}", position)),
                Err(e) => {
                    log.error(format!("Couldn't read arm position: {}", e));
                    return RunOutcome::Aborted { line: 0, error: e.to_string() };
                }
            }
        }

        let env = match settings.axis_startup {
            AxisStartup::Reset => AxisEnvironment::default(),
            AxisStartup::Inherit => lock(&self.inner.carried).clone(),
        };
        let mut interpreter = Interpreter::new(settings.interpreter, env, log.clone());
        let mut parser = Parser::new(BufReader::new(source));
        let outcome = drive(&mut interpreter, &mut parser, arm, session, log).await;
        *lock(&self.inner.carried) = interpreter.into_environment();
        outcome
    }
}

async fn drive<R>(
    interpreter: &mut Interpreter,
    parser: &mut Parser<BufReader<R>>,
    arm: &mut dyn Arm,
    session: &RunSession,
    log: &LogBroadcaster,
) -> RunOutcome
where
    R: AsyncRead + Unpin + Send,
{
    let mut lines = 0;
    loop {
        if session.is_cancelled() {
            return RunOutcome::Cancelled { lines };
        }
        let next = tokio::select! {
            biased;
            _ = session.cancelled() => return RunOutcome::Cancelled { lines },
            next = parser.next_line() => next,
        };
        let number = parser.line_number();
        let line = match next {
            None => return RunOutcome::Completed { lines },
            Some(Ok(line)) => line,
            Some(Err(ParseError::Io(e))) => {
                log.error(format!("Error reading motion program after line {}: {}", number, e));
                return RunOutcome::Aborted { line: number, error: e.to_string() };
            }
            Some(Err(e)) => {
                log.warn(format!("Parse error on line {}: {}", number, e));
                continue;
            }
        };
        // Checked again so a stop that lands while a line is being read wins.
        if session.is_cancelled() {
            return RunOutcome::Cancelled { lines };
        }
        if let Err(e) = interpreter.execute_line(&line, arm).await {
            log.error(format!("Line {} ({}): {}", number, line, e));
            return RunOutcome::Aborted { line: number, error: e.to_string() };
        }
        lines += 1;
    }
}
