//! Long running operation handles
//!
//! Mutating ARM calls answer `201`/`202` and point at a status endpoint via
//! the `Azure-AsyncOperation` or `Location` header. An [`Operation`] keeps
//! that endpoint so the caller can decide whether to wait inline
//! ([`crate::AzureClientTrait::wait_for_completion`]) or to poll on a later
//! reconciliation.

use serde::Deserialize;

/// Where the status of an operation can be polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// `Azure-AsyncOperation` URL, answers with a status document
    AsyncOperation(String),
    /// `Location` URL, answers `202` until done
    Location(String),
}

/// Handle of an ARM operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    description: String,
    poll: Option<PollTarget>,
}

impl Operation {
    /// Operation that finished synchronously
    pub fn completed(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            poll: None,
        }
    }

    /// Operation still in progress, pollable at `target`
    pub fn pending(description: impl Into<String>, target: PollTarget) -> Self {
        Self {
            description: description.into(),
            poll: Some(target),
        }
    }

    /// Human readable description, e.g. "delete disk etcd2"
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Poll endpoint, `None` when already finished
    #[must_use]
    pub fn poll_target(&self) -> Option<&PollTarget> {
        self.poll.as_ref()
    }

    /// Whether the operation finished when it was issued
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.poll.is_none()
    }
}

/// Body returned by an `Azure-AsyncOperation` endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AsyncOperationStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Terminal and non terminal states of an async operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OperationState {
    InProgress,
    Succeeded,
    Failed(String),
}

impl AsyncOperationStatus {
    pub(crate) fn state(&self) -> OperationState {
        match self.status.as_str() {
            "Succeeded" => OperationState::Succeeded,
            "Failed" | "Canceled" => OperationState::Failed(
                self.error
                    .as_ref()
                    .map_or_else(|| self.status.clone(), ToString::to_string),
            ),
            _ => OperationState::InProgress,
        }
    }
}
