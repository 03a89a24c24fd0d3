//! The daemon loop: splay, run a pass, sleep, repeat.
//!
//! Scheduling is an explicit timer rather than literal blocking
//! sleeps: all waiting goes through the [`Sleeper`] trait, so tests
//! substitute a scripted sleeper to simulate elapsed time and forced
//! cancellation deterministically. Stop requests are honored at sleep
//! boundaries only, never mid-pass; an in-flight external command
//! always runs to completion.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use rand::Rng;

use crate::error::Result;
use crate::types::PassSummary;

/// Scheduling configuration for the daemon loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerConfig {
    /// Sleep this long between passes; `None` means run once and exit
    pub interval: Option<Duration>,
    /// Sleep a uniformly random duration in `[0, splay)` before each
    /// pass, so many hosts polling a central catalog do not
    /// synchronize their load
    pub splay: Option<Duration>,
}

/// Cooperative stop signal plus the real, interruptible timer.
///
/// `wait` blocks on a condvar with a timeout, so a stop request wakes
/// the sleeping loop immediately instead of after the full interval.
#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; wakes any in-progress wait.
    pub fn stop(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap() = true;
        condvar.notify_all();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Wait for `duration` or until stopped, whichever comes first.
    /// Returns true if a stop was requested.
    pub fn wait(&self, duration: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let stopped = flag.lock().unwrap();
        let (stopped, _timeout) = condvar
            .wait_timeout_while(stopped, duration, |stopped| !*stopped)
            .unwrap();
        *stopped
    }
}

/// Interruptible timer used by the daemon loop.
pub trait Sleeper {
    /// Sleep for `duration`; returns true if a stop was requested
    /// before or during the sleep.
    fn sleep(&self, duration: Duration) -> bool;
}

impl Sleeper for StopToken {
    fn sleep(&self, duration: Duration) -> bool {
        self.wait(duration)
    }
}

/// Drives convergence passes once or perpetually.
///
/// One-shot (no interval): a pass failure propagates and the caller
/// exits nonzero. Periodic: failures are logged and retried after the
/// interval; the process never exits on a transient convergence
/// failure as long as it is meant to run forever.
pub struct ConvergenceRunner<S: Sleeper> {
    config: RunnerConfig,
    sleeper: S,
}

impl<S: Sleeper> ConvergenceRunner<S> {
    pub fn new(config: RunnerConfig, sleeper: S) -> Self {
        Self { config, sleeper }
    }

    /// Run `pass` according to the configured schedule. Returns the
    /// last completed pass's summary when the schedule ends (one-shot
    /// completion or a stop request).
    pub fn run<F>(&self, mut pass: F) -> Result<PassSummary>
    where
        F: FnMut() -> Result<PassSummary>,
    {
        let mut rng = rand::thread_rng();
        let mut last = PassSummary::default();

        loop {
            if let Some(splay) = self.config.splay
                && !splay.is_zero()
            {
                let jitter =
                    Duration::from_secs_f64(rng.gen_range(0.0..splay.as_secs_f64()));
                log::debug!("splay sleep {}ms", jitter.as_millis());
                if self.sleeper.sleep(jitter) {
                    return Ok(last);
                }
            }

            match pass() {
                Ok(summary) => {
                    log::info!(
                        "pass complete: {}/{} resources updated",
                        summary.updated,
                        summary.total
                    );
                    last = summary;
                    match self.config.interval {
                        Some(interval) => {
                            log::debug!("sleeping {}s until next pass", interval.as_secs());
                            if self.sleeper.sleep(interval) {
                                return Ok(last);
                            }
                        }
                        None => return Ok(last),
                    }
                }
                Err(e) => match self.config.interval {
                    Some(interval) => {
                        log::error!("convergence pass failed: {e}");
                        log::error!("retrying in {}s", interval.as_secs());
                        if self.sleeper.sleep(interval) {
                            return Ok(last);
                        }
                    }
                    None => return Err(e),
                },
            }
        }
    }
}
