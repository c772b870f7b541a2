//! Per-action repeating timers.
//!
//! Timers are cooperative: nothing runs in the background. The owner asks
//! [`TimerManager::due`] which timers have elapsed and fires their stimulus
//! on its own thread. A timer's stimulus is the action tag it was started
//! under.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

/// Shortest accepted timer interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
/// Longest accepted timer interval (one week).
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Convert a configured interval in seconds. `None` when the value is not a
/// number of seconds within [`MIN_INTERVAL`, `MAX_INTERVAL`].
pub fn interval_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| (MIN_INTERVAL..=MAX_INTERVAL).contains(d))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
}

#[derive(Debug, Clone)]
struct Timer {
    interval: Duration,
    /// `None` when the deadline is not representable; such a timer never fires.
    next_due: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct TimerManager {
    timers: BTreeMap<String, Timer>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the timer for `tag` if it runs, otherwise start one whose first
    /// tick is one `interval` after `now`.
    pub fn toggle(&mut self, tag: &str, interval: Duration, now: Instant) -> Toggle {
        if self.timers.remove(tag).is_some() {
            return Toggle::Stopped;
        }
        self.timers.insert(
            tag.to_string(),
            Timer {
                interval,
                next_due: now.checked_add(interval),
            },
        );
        Toggle::Started
    }

    /// Idempotent stop. Returns whether a timer was running.
    pub fn stop(&mut self, tag: &str) -> bool {
        self.timers.remove(tag).is_some()
    }

    pub fn is_running(&self, tag: &str) -> bool {
        self.timers.contains_key(tag)
    }

    pub fn list_active(&self) -> BTreeSet<String> {
        self.timers.keys().cloned().collect()
    }

    /// Tags whose deadline is at or before `now`, in tag order.
    ///
    /// Each returned timer is rescheduled one interval later; if it fell
    /// more than one interval behind, the missed ticks collapse into this one.
    pub fn due(&mut self, now: Instant) -> Vec<String> {
        let mut fired = Vec::new();
        for (tag, timer) in &mut self.timers {
            let Some(deadline) = timer.next_due else {
                continue;
            };
            if deadline > now {
                continue;
            }
            timer.next_due = deadline
                .checked_add(timer.interval)
                .filter(|next| *next > now)
                .or_else(|| now.checked_add(timer.interval));
            fired.push(tag.clone());
        }
        fired
    }

    /// Earliest pending deadline, if any timer runs.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().filter_map(|t| t.next_due).min()
    }
}
