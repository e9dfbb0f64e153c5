//! Error taxonomy for reconciliation
//!
//! Remote facades report [`RemoteError`]s classified by [`RemoteErrorKind`].
//! Reconcilers wrap them, together with their own validation, consistency,
//! fan-out and convergence failures, into [`ReconcileError`]. Every
//! `ReconcileError` names the resource it concerns.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::resource::ResourceId;

/// Classification of a failure reported by a remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The addressed entity does not exist
    NotFound,
    /// The entity already exists or is in a conflicting state
    Conflict,
    /// Throttling, timeouts and other failures worth retrying later
    Transient,
    /// Anything else
    Fatal,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Conflict => "conflict",
            RemoteErrorKind::Transient => "transient",
            RemoteErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Failure reported by a remote API facade
#[derive(Debug, Clone, Error)]
#[error("{operation} ({kind}): {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// Remote operation name (e.g., "DeleteDBSecurityGroup")
    pub operation: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(
        kind: RemoteErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, operation, message)
    }

    pub fn conflict(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Conflict, operation, message)
    }

    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transient, operation, message)
    }

    pub fn fatal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Fatal, operation, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

/// Error produced by a reconciler operation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed desired state; raised before any mutating call
    #[error("[{id}] Validation failed: {message}")]
    Validation { id: ResourceId, message: String },

    /// The remote entity does not exist
    #[error("[{id}] {operation}: '{identity}' not found")]
    NotFound {
        id: ResourceId,
        operation: String,
        identity: String,
    },

    /// The remote side returned zero or several matches where exactly one was required
    #[error(
        "[{id}] {operation}: expected exactly one remote entry named '{identity}', found {matches}"
    )]
    Consistency {
        id: ResourceId,
        operation: String,
        identity: String,
        matches: usize,
    },

    /// One or more independent sub-operations of a fan-out failed
    #[error(
        "[{id}] {operation}: {} of {attempted} calls failed: {}",
        .errors.len(),
        join_errors(.errors)
    )]
    Aggregate {
        id: ResourceId,
        operation: String,
        attempted: usize,
        errors: Vec<ReconcileError>,
    },

    /// Convergence deadline exceeded; the remote entity is left as last observed
    #[error(
        "[{id}] Timed out after {elapsed:?} waiting for '{target}' (last status '{last_status}')"
    )]
    Timeout {
        id: ResourceId,
        target: String,
        last_status: String,
        elapsed: Duration,
    },

    /// Convergence wait aborted by the caller
    #[error("[{id}] Cancelled while waiting for '{target}'")]
    Cancelled { id: ResourceId, target: String },

    /// Remote transport or service failure, passed through
    #[error("[{id}] {source}")]
    Remote {
        id: ResourceId,
        #[source]
        source: RemoteError,
    },
}

fn join_errors(errors: &[ReconcileError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReconcileError {
    pub fn validation(id: &ResourceId, message: impl Into<String>) -> Self {
        Self::Validation {
            id: id.clone(),
            message: message.into(),
        }
    }

    pub fn remote(id: &ResourceId, source: RemoteError) -> Self {
        Self::Remote {
            id: id.clone(),
            source,
        }
    }

    pub fn consistency(
        id: &ResourceId,
        operation: impl Into<String>,
        identity: impl Into<String>,
        matches: usize,
    ) -> Self {
        Self::Consistency {
            id: id.clone(),
            operation: operation.into(),
            identity: identity.into(),
            matches,
        }
    }

    /// The resource this error concerns
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Self::Validation { id, .. }
            | Self::NotFound { id, .. }
            | Self::Consistency { id, .. }
            | Self::Aggregate { id, .. }
            | Self::Timeout { id, .. }
            | Self::Cancelled { id, .. }
            | Self::Remote { id, .. } => id,
        }
    }

    /// True for an explicit NotFound or a remote NotFound pass-through
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Remote { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Child errors of an aggregate; empty for every other variant
    pub fn failures(&self) -> &[ReconcileError] {
        match self {
            Self::Aggregate { errors, .. } => errors,
            _ => &[],
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ResourceId {
        ResourceId::new("db_security_group", "web")
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::not_found("DeleteDBSecurityGroup", "DBSecurityGroupNotFound");
        assert_eq!(
            err.to_string(),
            "DeleteDBSecurityGroup (not found): DBSecurityGroupNotFound"
        );
        assert!(err.is_not_found());
        assert!(!RemoteError::transient("x", "throttled").is_not_found());
    }

    #[test]
    fn test_aggregate_display_lists_every_failure() {
        let err = ReconcileError::Aggregate {
            id: id(),
            operation: "AuthorizeDBSecurityGroupIngress".to_string(),
            attempted: 3,
            errors: vec![
                ReconcileError::remote(&id(), RemoteError::fatal("Authorize", "bad cidr")),
                ReconcileError::remote(&id(), RemoteError::conflict("Authorize", "exists")),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("2 of 3 calls failed"));
        assert!(msg.contains("bad cidr"));
        assert!(msg.contains("exists"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_is_not_found() {
        let remote = ReconcileError::remote(&id(), RemoteError::not_found("Describe", "gone"));
        assert!(remote.is_not_found());

        let consistency = ReconcileError::consistency(&id(), "Describe", "web", 0);
        assert!(!consistency.is_not_found());
        assert_eq!(consistency.resource_id(), &id());
    }

    #[test]
    fn test_consistency_display() {
        let err = ReconcileError::consistency(&id(), "DescribeDBSecurityGroups", "web", 2);
        assert_eq!(
            err.to_string(),
            "[db_security_group.web] DescribeDBSecurityGroups: expected exactly one remote entry named 'web', found 2"
        );
    }
}
