//! Time sources for message timestamps.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;

/// Source of send times in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that replays a fixed sequence of instants, then repeats the last one.
///
/// Useful for simulations and tests that need exact timestamps.
#[derive(Debug, Default)]
pub struct ScriptedClock {
    ticks: Mutex<VecDeque<i64>>,
    last: Mutex<i64>,
}

impl ScriptedClock {
    pub fn new(ticks: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ticks: Mutex::new(ticks.into_iter().collect()),
            last: Mutex::new(0),
        }
    }
}

impl Clock for ScriptedClock {
    fn now_millis(&self) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = self
            .ticks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            *last = next;
        }
        *last
    }
}
