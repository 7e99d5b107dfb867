// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory rendezvous between proxy workers and operators
//!
//! A proxy worker submits a flow snapshot and waits; an operator lists
//! pending flows and posts a decision; the worker claims the decision
//! exactly once. Flows live only in memory and die with the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;

use super::flow::{Decision, Flow};
use crate::error::{Error, Result};

/// Per-flow lifecycle: pending (no decision), decided (decision recorded,
/// not yet delivered), then removed on claim or expiry.
struct PendingEntry {
    flow: Flow,
    decision: Option<Decision>,
    notify: Arc<Notify>,
}

/// Rendezvous store for pending flows and their decisions
#[derive(Default)]
pub struct InterceptBroker {
    pending: RwLock<HashMap<String, PendingEntry>>,
}

impl InterceptBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow as pending and return its wait handle.
    ///
    /// Idempotent on `flow_id`: re-submitting before a decision keeps the
    /// original snapshot and returns the existing handle.
    pub fn submit(&self, flow: Flow) -> Arc<Notify> {
        let mut pending = self.pending.write();
        match pending.entry(flow.flow_id.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.get().notify.clone(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let notify = Arc::new(Notify::new());
                entry.insert(PendingEntry {
                    flow,
                    decision: None,
                    notify: notify.clone(),
                });
                notify
            }
        }
    }

    /// All flows still awaiting a decision, newest first
    pub fn list_pending(&self) -> Vec<Flow> {
        let pending = self.pending.read();
        let mut flows: Vec<Flow> = pending
            .values()
            .filter(|entry| entry.decision.is_none())
            .map(|entry| entry.flow.clone())
            .collect();
        flows.sort_by(|a, b| b.created.total_cmp(&a.created));
        flows
    }

    /// Record a decision on a pending flow and wake its submitter.
    ///
    /// Fails with [`Error::UnknownFlow`] when the id is not pending (never
    /// submitted, already decided, claimed or expired).
    pub fn decide(&self, flow_id: &str, decision: Decision) -> Result<()> {
        let mut pending = self.pending.write();
        let entry = pending
            .get_mut(flow_id)
            .filter(|entry| entry.decision.is_none())
            .ok_or_else(|| Error::UnknownFlow(flow_id.to_string()))?;
        entry.decision = Some(decision);
        entry.notify.notify_one();
        Ok(())
    }

    /// Take the decision for a flow, removing the flow atomically.
    ///
    /// Exactly-once delivery: the first claim after a decision returns it,
    /// every later claim for the same id returns `None`.
    pub fn claim(&self, flow_id: &str) -> Option<Decision> {
        let mut pending = self.pending.write();
        if pending.get(flow_id)?.decision.is_some() {
            return pending.remove(flow_id).and_then(|entry| entry.decision);
        }
        None
    }

    /// Wait for a decision with a hard deadline.
    ///
    /// Returns the claimed decision, or `forward` when the deadline elapses
    /// (fail-open); a timed-out flow is expired and disappears from the
    /// pending list.
    pub async fn wait_decision(&self, flow_id: &str, deadline: Duration) -> Decision {
        let notify = match self.wait_handle(flow_id) {
            Some(notify) => notify,
            None => return Decision::forward(),
        };

        let claimed = async {
            loop {
                if let Some(decision) = self.claim(flow_id) {
                    return decision;
                }
                notify.notified().await;
            }
        };

        match tokio::time::timeout(deadline, claimed).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::debug!(flow_id, "decision deadline elapsed, forwarding");
                self.expire(flow_id);
                Decision::forward()
            }
        }
    }

    /// Drop flows older than `max_age` that were never decided.
    ///
    /// Returns the number of flows removed. Bounds memory for flows whose
    /// submitter never comes back for them.
    pub fn purge(&self, max_age: Duration) -> usize {
        let cutoff = crate::callback::epoch_seconds() - max_age.as_secs_f64();
        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|_, entry| entry.decision.is_some() || entry.flow.created > cutoff);
        before - pending.len()
    }

    /// Number of tracked flows, decided or not
    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    /// Whether the broker tracks no flows
    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    /// Spawn the background reclamation task
    pub fn spawn_purge(
        self: &Arc<Self>,
        every: Duration,
        max_age: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let purged = broker.purge(max_age);
                if purged > 0 {
                    tracing::debug!(purged, "reclaimed undecided flows");
                }
            }
        })
    }

    fn wait_handle(&self, flow_id: &str) -> Option<Arc<Notify>> {
        self.pending
            .read()
            .get(flow_id)
            .map(|entry| entry.notify.clone())
    }

    fn expire(&self, flow_id: &str) {
        self.pending.write().remove(flow_id);
    }
}
