//! Error taxonomy for the plan pipeline.
//!
//! Errors are classified by *kind*, which drives both retry policy in the
//! workflow engine and the error body the poll endpoint exposes. Stack
//! traces and upstream response bodies never cross the HTTP boundary.

use reqwest::StatusCode;

/// A classified pipeline error.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Malformed request, unknown spot id, fewer than one waypoint.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport-level failure reaching an upstream engine or store.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// An outbound call exceeded its stage budget.
    #[error("{service} timed out")]
    UpstreamTimeout { service: &'static str },

    /// Upstream answered, but not with the agreed shape.
    #[error("{service} protocol error: {message}")]
    UpstreamProtocol {
        service: &'static str,
        message: String,
    },

    /// Manifest or audio file write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A programming invariant was violated (e.g. an identity key that
    /// matches no request).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlanError {
    /// Stable kind string, used in job rows and poll error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::Validation(_) => "validation",
            PlanError::UpstreamUnavailable { .. } => "upstream_unavailable",
            PlanError::UpstreamTimeout { .. } => "upstream_timeout",
            PlanError::UpstreamProtocol { .. } => "upstream_protocol",
            PlanError::Storage(_) => "storage",
            PlanError::Internal(_) => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlanError::UpstreamUnavailable { .. }
                | PlanError::UpstreamTimeout { .. }
                | PlanError::UpstreamProtocol { .. }
                | PlanError::Storage(_)
        )
    }

    /// How many re-executions this kind of failure may consume. Storage
    /// failures retry once; upstream failures up to the stage budget.
    pub fn retry_budget(&self) -> i32 {
        match self {
            PlanError::Storage(_) => 1,
            PlanError::UpstreamUnavailable { .. }
            | PlanError::UpstreamTimeout { .. }
            | PlanError::UpstreamProtocol { .. } => 3,
            _ => 0,
        }
    }

    /// Classify a transport error from an engine client.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlanError::UpstreamTimeout { service }
        } else {
            PlanError::UpstreamUnavailable {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Classify a non-2xx status. 4xx means the engine logically rejected
    /// our payload — that is our bug, not a transient condition.
    pub fn from_status(service: &'static str, status: StatusCode) -> Self {
        if status.is_client_error() {
            PlanError::Internal(format!("{service} rejected request with {status}"))
        } else {
            PlanError::UpstreamUnavailable {
                service,
                message: format!("status {status}"),
            }
        }
    }

    /// Classify a spatial-store error.
    pub fn from_sqlx(service: &'static str, err: sqlx::Error) -> Self {
        PlanError::UpstreamUnavailable {
            service,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_terminal() {
        let e = PlanError::Validation("no waypoints".into());
        assert!(!e.is_retryable());
        assert_eq!(e.retry_budget(), 0);
        assert_eq!(e.kind(), "validation");
    }

    #[test]
    fn storage_retries_once() {
        let e = PlanError::Storage("fsync failed".into());
        assert!(e.is_retryable());
        assert_eq!(e.retry_budget(), 1);
    }

    #[test]
    fn upstream_kinds_are_retryable() {
        let e = PlanError::UpstreamTimeout { service: "routing" };
        assert!(e.is_retryable());
        assert_eq!(e.retry_budget(), 3);
        assert_eq!(e.kind(), "upstream_timeout");
    }

    #[test]
    fn client_error_status_maps_to_internal() {
        let e = PlanError::from_status("narration", StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.kind(), "internal");
        assert!(!e.is_retryable());

        let e = PlanError::from_status("narration", StatusCode::BAD_GATEWAY);
        assert_eq!(e.kind(), "upstream_unavailable");
        assert!(e.is_retryable());
    }
}
