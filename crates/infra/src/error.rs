//! Infrastructure error model.

use thiserror::Error;

use wms_core::DomainError;

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

/// Failure of an orchestrated operation.
///
/// Domain failures are deterministic and leave state unchanged. The other variants
/// come from the shared-state and publication plumbing around the domain.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A thread panicked while holding this lock.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    /// Publication failed after the state change was committed.
    #[error("event publication failed: {0}")]
    Publish(String),

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FulfillmentError {
    /// The domain error, if this failure came from a business rule.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            FulfillmentError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_message() {
        let err: FulfillmentError = DomainError::insufficient_stock("X", 5, 3).into();
        assert_eq!(
            err.to_string(),
            "insufficient stock for X: requested 5, available 3"
        );
        assert_eq!(
            err.as_domain(),
            Some(&DomainError::insufficient_stock("X", 5, 3))
        );
    }

    #[test]
    fn infra_errors_are_not_domain_errors() {
        let err = FulfillmentError::LockPoisoned("warehouse");
        assert_eq!(err.to_string(), "warehouse lock poisoned");
        assert!(err.as_domain().is_none());
    }
}
