//! Worker error taxonomy.
//!
//! Every error carries a stable wire code so NATS callers can branch on
//! failures without parsing messages.

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid billing cycle: {0}")]
    InvalidBillingCycle(String),

    #[error("incomplete distance data: {0}")]
    IncompleteDistanceData(String),

    #[error("upstream provider error: {0}")]
    UpstreamProvider(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn upstream(err: anyhow::Error) -> Self {
        ServiceError::UpstreamProvider(err)
    }

    /// Stable error code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidBillingCycle(_) => "INVALID_BILLING_CYCLE",
            ServiceError::IncompleteDistanceData(_) => "INCOMPLETE_DISTANCE_DATA",
            ServiceError::UpstreamProvider(_) => "UPSTREAM_PROVIDER_ERROR",
            ServiceError::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ServiceError::not_found("subscription x").code(), "NOT_FOUND");
        assert_eq!(
            ServiceError::InvalidBillingCycle("bad".into()).code(),
            "INVALID_BILLING_CYCLE"
        );
        assert_eq!(
            ServiceError::IncompleteDistanceData("cell".into()).code(),
            "INCOMPLETE_DISTANCE_DATA"
        );
        assert_eq!(
            ServiceError::upstream(anyhow::anyhow!("boom")).code(),
            "UPSTREAM_PROVIDER_ERROR"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("subscription 123");
        assert_eq!(err.to_string(), "subscription 123 not found");
    }
}
