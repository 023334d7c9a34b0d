//! # Periodic Session Monitor
//!
//! Background task that re-validates the session token on a fixed interval.
//! Each tick runs [`SessionController::revalidate`]: a definite rejection
//! tears the session down, anything inconclusive is ignored until the next
//! tick. Ticks while signed out do nothing.
//!
//! The task holds only a weak reference to the controller and exits once the
//! controller is dropped. It is also aborted by [`SessionMonitor::stop`] and
//! when the monitor handle itself is dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gavel::client::session::SessionController;
//! use std::sync::Arc;
//!
//! # fn example(controller: Arc<SessionController>) {
//! let mut monitor = controller.start_monitor();
//! // ...
//! monitor.stop();
//! # }
//! ```

use crate::client::session::SessionController;
use crate::client::validator::{TokenState, Validation};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Counters for the checks run so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    /// Ticks that found an authenticated session and validated it
    pub checks: u64,
    /// Checks that ended in a definite rejection
    pub rejections: u64,
    /// Checks that were inconclusive
    pub inconclusive: u64,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SessionMonitor {
    interval: Duration,
    state: Arc<RwLock<MonitorState>>,
    task: Option<JoinHandle<()>>,
}

impl SessionMonitor {
    /// Spawn the monitor. The first check runs one full interval after start.
    pub fn start(controller: Weak<SessionController>, interval: Duration) -> Self {
        let state = Arc::new(RwLock::new(MonitorState::default()));
        let task = tokio::spawn(Self::run(controller, interval, Arc::clone(&state)));
        tracing::debug!("Session monitor started ({:?} interval)", interval);
        Self {
            interval,
            state,
            task: Some(task),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn state(&self) -> MonitorState {
        self.state.read().await.clone()
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Session monitor stopped");
        }
    }

    async fn run(
        controller: Weak<SessionController>,
        period: Duration,
        state: Arc<RwLock<MonitorState>>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(controller) = controller.upgrade() else {
                tracing::debug!("Session controller dropped, monitor exiting");
                return;
            };
            let Some(outcome) = controller.revalidate().await else {
                continue;
            };
            drop(controller);

            let mut state = state.write().await;
            state.checks += 1;
            state.last_check = Some(Utc::now());
            match outcome {
                Validation::Definite(TokenState::Invalid) => state.rejections += 1,
                Validation::Indeterminate(_) => state.inconclusive += 1,
                Validation::Definite(TokenState::Valid(_)) => {}
            }
        }
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
