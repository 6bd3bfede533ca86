// ── Request/response correlation ──
//
// Turns "publish a request, a response shows up later on another queue"
// into a single awaitable call. At most one request per correlation key
// is in flight; the pending slot is released by a guard so a timed out,
// answered or dropped wait never leaves the key locked.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command::{CorrelationKey, Outbound, Request, RequestEnvelope};
use crate::error::CoreError;
use crate::model::Response;
use crate::queue::{MessageQueue, TimedOut};

/// A request waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub key: CorrelationKey,
    pub req_id: u64,
    pub issued_at: DateTime<Utc>,
    pub timeout: Duration,
}

/// How a correlated wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Response(Response),
    /// No matching response within the given duration. The correlator
    /// never retries on its own.
    TimedOut(Duration),
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::TimedOut(_) => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

pub struct Correlator {
    outbound: Arc<MessageQueue<Outbound>>,
    responses: Arc<MessageQueue<Response>>,
    pending: DashMap<CorrelationKey, PendingRequest>,
    next_req_id: AtomicU64,
}

impl Correlator {
    pub fn new(outbound: Arc<MessageQueue<Outbound>>, responses: Arc<MessageQueue<Response>>) -> Self {
        Self {
            outbound,
            responses,
            pending: DashMap::new(),
            next_req_id: AtomicU64::new(1),
        }
    }

    /// Publish `request` and wait up to `timeout` for a response under `key`.
    ///
    /// A response carrying a `req_id` only answers the request with that
    /// id; replies to earlier, timed out requests under the same key are
    /// dropped. Responses without a `req_id` match on the key alone.
    ///
    /// Fails with [`CoreError::DuplicateRequest`] if `key` is already in
    /// flight and with [`CoreError::Validation`] if the request is
    /// malformed. A missing response is `Ok(Outcome::TimedOut)`.
    /// Transport loss is indistinguishable from a slow device: both end
    /// as a timeout.
    pub async fn request_and_wait(
        &self,
        key: CorrelationKey,
        request: Request,
        timeout: Duration,
    ) -> Result<Outcome, CoreError> {
        request.validate()?;

        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let guard = self.register(PendingRequest {
            key,
            req_id,
            issued_at: Utc::now(),
            timeout,
        })?;
        let key = &guard.key;

        debug!(%key, req_id, "publishing request");
        self.outbound.push(Outbound::Request(RequestEnvelope {
            req_id,
            key: key.clone(),
            request,
            issued_at: Utc::now(),
        }));

        // The guard releases the key on every exit path, including drop.
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self
                .responses
                .pop_matching(|response| response.key == *key, remaining)
                .await
            {
                Ok(response) if response.req_id.is_some_and(|id| id != req_id) => {
                    debug!(%key, req_id, other = ?response.req_id, "dropping reply to another request");
                }
                Ok(response) => {
                    debug!(%key, req_id, result = %response.result, "response matched");
                    return Ok(Outcome::Response(response));
                }
                Err(TimedOut { .. }) => {
                    warn!(%key, req_id, ?timeout, "no response before timeout");
                    return Ok(Outcome::TimedOut(timeout));
                }
            }
        }
    }

    /// Snapshot of outstanding requests, oldest first.
    pub fn pending(&self) -> Vec<PendingRequest> {
        let mut pending: Vec<PendingRequest> =
            self.pending.iter().map(|r| r.value().clone()).collect();
        pending.sort_by_key(|p| p.req_id);
        pending
    }

    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    fn register(&self, pending: PendingRequest) -> Result<PendingGuard<'_>, CoreError> {
        match self.pending.entry(pending.key.clone()) {
            Entry::Occupied(entry) => Err(CoreError::DuplicateRequest {
                key: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(pending);
                Ok(PendingGuard {
                    pending: &self.pending,
                    key,
                })
            }
        }
    }
}

/// Releases a pending slot when dropped.
struct PendingGuard<'a> {
    pending: &'a DashMap<CorrelationKey, PendingRequest>,
    key: CorrelationKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.key);
    }
}
