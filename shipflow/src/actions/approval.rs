//! The manual-approval action and its gate.

use super::{Action, ActionContext, ActionOutput};
use crate::config::ApprovalPolicy;
use crate::core::ActionKind;
use crate::errors::ApprovalError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The response an approver gives to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// The rollout may proceed.
    Approved,
    /// The rollout must not proceed.
    Rejected {
        /// Optional reason supplied by the approver.
        reason: Option<String>,
    },
}

#[derive(Debug)]
struct PendingApproval {
    action: String,
    message: String,
    requested_at: Instant,
    response_tx: Option<oneshot::Sender<ApprovalDecision>>,
}

/// Removes a request from the gate when the waiting future ends, whether it
/// resolved, timed out, or was dropped by a cancellation race.
struct RequestCleanup<'a> {
    gate: &'a ApprovalGate,
    request_id: Uuid,
}

impl Drop for RequestCleanup<'_> {
    fn drop(&mut self) {
        self.gate.requests.write().remove(&self.request_id);
    }
}

/// A summary of one pending approval request, for operator surfaces.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// The request id to pass to `approve`/`reject`.
    pub id: Uuid,
    /// The action waiting on this request.
    pub action: String,
    /// The message shown to the approver.
    pub message: String,
}

/// The suspension point between a pipeline and its human approvers.
///
/// An approval action parks on the gate with a oneshot channel; the waiting
/// side wakes only when an approver responds or the deadline passes, never
/// by polling.
#[derive(Default)]
pub struct ApprovalGate {
    requests: RwLock<HashMap<Uuid, PendingApproval>>,
}

impl ApprovalGate {
    /// Creates a new gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks until an approver responds or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns an error on rejection or when no response arrives in time.
    pub async fn wait(
        &self,
        action: &str,
        message: &str,
        timeout: std::time::Duration,
    ) -> Result<(), ApprovalError> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        {
            let request = PendingApproval {
                action: action.to_string(),
                message: message.to_string(),
                requested_at: Instant::now(),
                response_tx: Some(tx),
            };
            self.requests.write().insert(request_id, request);
        }
        // Dropped on every exit from this future, including when the caller's
        // select! abandons it mid-wait.
        let _cleanup = RequestCleanup {
            gate: self,
            request_id,
        };

        let result = tokio::time::timeout(timeout, rx).await;

        match result {
            Ok(Ok(ApprovalDecision::Approved)) => Ok(()),
            Ok(Ok(ApprovalDecision::Rejected { reason })) => {
                Err(ApprovalError::Rejected { reason })
            }
            // The gate side dropped the channel without answering.
            Ok(Err(_)) => Err(ApprovalError::rejected_with_reason(
                "approval request abandoned",
            )),
            Err(_) => Err(ApprovalError::timed_out(timeout)),
        }
    }

    /// Approves a pending request.
    ///
    /// Returns false if the request is unknown or already decided.
    pub fn approve(&self, request_id: Uuid) -> bool {
        self.respond(request_id, ApprovalDecision::Approved)
    }

    /// Rejects a pending request.
    pub fn reject(&self, request_id: Uuid, reason: Option<String>) -> bool {
        self.respond(request_id, ApprovalDecision::Rejected { reason })
    }

    fn respond(&self, request_id: Uuid, decision: ApprovalDecision) -> bool {
        if let Some(mut request) = self.requests.write().remove(&request_id) {
            if let Some(tx) = request.response_tx.take() {
                return tx.send(decision).is_ok();
            }
        }
        false
    }

    /// Lists pending requests, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingRequest> {
        let requests = self.requests.read();
        let mut pending: Vec<(&Uuid, &PendingApproval)> = requests.iter().collect();
        pending.sort_by_key(|(_, r)| r.requested_at);
        pending
            .into_iter()
            .map(|(id, r)| PendingRequest {
                id: *id,
                action: r.action.clone(),
                message: r.message.clone(),
            })
            .collect()
    }

    /// Returns the number of pending requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.requests.read().len()
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

/// Suspends the pipeline until an external approver responds.
///
/// Consumes and produces no artifacts. Rejection and unresponsiveness past
/// the deadline are both terminal failures for the enclosing stage.
#[derive(Debug)]
pub struct ApprovalAction {
    name: String,
    run_order: u32,
    policy: ApprovalPolicy,
    gate: Arc<ApprovalGate>,
}

impl ApprovalAction {
    /// Creates an approval action parked on the given gate.
    #[must_use]
    pub fn new(name: impl Into<String>, policy: ApprovalPolicy, gate: Arc<ApprovalGate>) -> Self {
        Self {
            name: name.into(),
            run_order: 1,
            policy,
            gate,
        }
    }

    /// Sets the run-order tie-break.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }
}

#[async_trait]
impl Action for ApprovalAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Approval
    }

    fn run_order(&self) -> u32 {
        self.run_order
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionOutput {
        ctx.events.try_emit(
            "approval.requested",
            Some(serde_json::json!({
                "action": self.name,
                "message": self.policy.message,
            })),
        );

        tokio::select! {
            () = ctx.cancel.cancelled() => {
                ActionOutput::cancelled(
                    ctx.cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
                )
            }
            result = self.gate.wait(&self.name, &self.policy.message, self.policy.timeout) => {
                match result {
                    Ok(()) => ActionOutput::succeeded(Vec::new()),
                    Err(err) => ActionOutput::failed(err),
                }
            }
        }
    }
}
