//! # Heartbeat Watchdog
//!
//! Pure bookkeeping for the channel's timestamps. The channel keeps one
//! `HeartbeatMonitor` behind its state mutex, so every read-modify-write
//! below happens under that lock.
//!
//! ```text
//!   last_success ──────────────── now
//!        │◄──────── silence ────────►│
//!
//!   silence > timeout && !breached  ──► fire TimeoutReached, breached = true
//!   silence > timeout &&  breached  ──► nothing (once per breach)
//!   record_success()                ──► breached = false
//!
//!   now - last_attempt < debounce   ──► connect() is a no-op
//! ```

/// Timestamps shared by the heartbeat task, the reader task and `connect()`.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout_ms: i64,
    debounce_ms: i64,
    last_attempt: Option<i64>,
    last_success: i64,
    breached: bool,
}

impl HeartbeatMonitor {
    /// Starts the silence window at `now`.
    pub fn new(now: i64, timeout_ms: i64, debounce_ms: i64) -> Self {
        HeartbeatMonitor {
            timeout_ms,
            debounce_ms,
            last_attempt: None,
            last_success: now,
            breached: false,
        }
    }

    /// Claims a connection attempt unless one started within the debounce window.
    pub fn try_begin_attempt(&mut self, now: i64) -> bool {
        match self.last_attempt {
            Some(last) if now - last < self.debounce_ms => false,
            _ => {
                self.last_attempt = Some(now);
                true
            }
        }
    }

    /// Any successful send or receive.
    pub fn record_success(&mut self, now: i64) {
        self.last_success = now;
        self.breached = false;
    }

    /// Returns true exactly once per breach of the timeout.
    pub fn check_timeout(&mut self, now: i64) -> bool {
        if self.breached || now - self.last_success <= self.timeout_ms {
            return false;
        }
        self.breached = true;
        true
    }

    pub fn is_breached(&self) -> bool {
        self.breached
    }

    pub fn last_success(&self) -> i64 {
        self.last_success
    }

    pub fn last_attempt(&self) -> Option<i64> {
        self.last_attempt
    }
}
