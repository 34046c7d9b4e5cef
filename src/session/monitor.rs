//! Continuous status monitoring

use super::ChargerSession;
use super::transport::Connector;
use crate::status::ChargerStatus;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Longest single sleep between cancellation checks
const CANCEL_POLL_SLICE: Duration = Duration::from_millis(100);

/// Settings of one monitor run
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// Stop once this much time has elapsed; `None` runs until cancelled
    pub duration: Option<Duration>,
    pub retries: u32,
    pub use_cache: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            duration: None,
            retries: super::DEFAULT_RETRIES,
            use_cache: true,
        }
    }
}

/// Counters reported when a monitor run ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub ticks: u64,
    /// Ticks that produced a status (fresh or cached)
    pub updates: u64,
    pub errors: u64,
}

impl<C: Connector> ChargerSession<C> {
    /// Poll status every `interval` until `duration` elapses or `cancel`
    /// turns true.
    ///
    /// Each tick runs [`ChargerSession::get_status`]; a status goes to
    /// `callback`, or is printed when there is none. Tick errors are logged
    /// and counted, never fatal.
    pub fn monitor(
        &mut self,
        options: &MonitorOptions,
        cancel: &watch::Receiver<bool>,
        mut callback: Option<&mut dyn FnMut(&ChargerStatus)>,
    ) -> MonitorSummary {
        let started = Instant::now();
        let mut summary = MonitorSummary::default();
        self.logger.info(&format!(
            "Monitoring every {:?}{}",
            options.interval,
            options
                .duration
                .map(|d| format!(" for {:?}", d))
                .unwrap_or_default()
        ));

        while !should_stop(started, options.duration, cancel) {
            summary.ticks += 1;
            match self.get_status(options.retries, options.use_cache) {
                Ok(Some(status)) => {
                    summary.updates += 1;
                    match callback.as_deref_mut() {
                        Some(cb) => cb(&status),
                        None => println!("{}", status),
                    }
                }
                Ok(None) => self.logger.debug("No status update this tick"),
                Err(e) => {
                    summary.errors += 1;
                    self.logger.warn(&format!("Monitor tick failed: {}", e));
                }
            }

            sleep_unless_cancelled(options.interval, started, options.duration, cancel);
        }

        self.logger.info(&format!(
            "Monitor stopped after {} ticks ({} updates, {} errors)",
            summary.ticks, summary.updates, summary.errors
        ));
        summary
    }
}

fn should_stop(started: Instant, duration: Option<Duration>, cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || duration.is_some_and(|d| started.elapsed() >= d)
}

fn sleep_unless_cancelled(
    interval: Duration,
    started: Instant,
    duration: Option<Duration>,
    cancel: &watch::Receiver<bool>,
) {
    // An interval past the clock's range sleeps until cancelled or done
    let wake = Instant::now().checked_add(interval);
    loop {
        if should_stop(started, duration, cancel) {
            return;
        }
        let now = Instant::now();
        let remaining = match wake {
            Some(wake) if now >= wake => return,
            Some(wake) => wake - now,
            None => CANCEL_POLL_SLICE,
        };
        std::thread::sleep(remaining.min(CANCEL_POLL_SLICE));
    }
}
