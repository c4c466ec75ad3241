//! Scheduled-message polling: cooldown gate and poll endpoint client.
//!
//! The gate is the only shared mutable state in the client. The host may
//! re-enter the message handler while a previous poll's network call is still
//! outstanding, so `in_flight` acts as a single-slot mutex; `last_poll`
//! rate-limits to one attempt per interval. A stuck `in_flight` flag would
//! permanently disable polling, so the claimed slot is an RAII guard: it is
//! released on drop, which covers normal returns, panics in host hooks, and
//! poll futures that are dropped mid-request.

use crate::relay::{truncate, RelayError, DEBUG_SNIPPET_LEN};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One queued outbound message from the poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledMessage {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub message: String,
}

impl ScheduledMessage {
    /// Dispatchable only when both room and message are present.
    pub fn is_dispatchable(&self) -> bool {
        !self.room.is_empty() && !self.message.is_empty()
    }
}

/// Poll endpoint response body.
#[derive(Debug, Default, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<ScheduledMessage>,
}

/// Cooldown and overlap guard for poll attempts. Callers pass `now`
/// explicitly so tests can drive the gate with a fake clock.
#[derive(Debug, Default)]
pub struct PollGate {
    last_poll: Option<Instant>,
    in_flight: bool,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a poll slot. Returns false when a poll is already in flight or
    /// the interval has not elapsed since the last attempt. On success the
    /// caller owns the slot and must call `finish` when the attempt ends.
    pub fn try_begin(&mut self, now: Instant, interval: Duration) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.in_flight = true;
        self.last_poll = Some(now);
        true
    }

    /// Release the slot. Runs on every exit path of a poll attempt.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Shared handle to the gate. The lock is only ever taken for the flag
/// flips, never across an await.
#[derive(Clone, Default)]
pub struct SharedGate {
    inner: Arc<Mutex<PollGate>>,
}

impl SharedGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a poll slot. The returned guard releases the slot when dropped,
    /// whatever the exit path of the attempt.
    pub fn claim(&self, now: Instant, interval: Duration) -> Option<PollSlot> {
        if !lock_gate(&self.inner).try_begin(now, interval) {
            return None;
        }
        Some(PollSlot {
            gate: Arc::clone(&self.inner),
        })
    }

    pub fn in_flight(&self) -> bool {
        lock_gate(&self.inner).in_flight()
    }
}

/// A claimed poll slot. Dropping it clears `in_flight`.
pub struct PollSlot {
    gate: Arc<Mutex<PollGate>>,
}

impl Drop for PollSlot {
    fn drop(&mut self) {
        lock_gate(&self.gate).finish();
    }
}

// A panic while the flag is being flipped poisons the mutex; recover the
// inner gate rather than wedging all future polls.
fn lock_gate(gate: &Mutex<PollGate>) -> MutexGuard<'_, PollGate> {
    match gate.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Client for the poll endpoint.
#[derive(Clone)]
pub struct PollClient {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl PollClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// POST to the poll endpoint (empty body, JSON content type) and parse
    /// the queued-message list.
    pub async fn fetch(&self) -> Result<PollResponse, RelayError> {
        let res = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let snippet = truncate(&res.text().await.unwrap_or_default(), DEBUG_SNIPPET_LEN);
            return Err(RelayError::Status { status, snippet });
        }
        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|e| RelayError::Parse(e.to_string()))
    }
}
