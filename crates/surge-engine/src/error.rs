//! Error types for surge-engine operations.
//!
//! Business outcomes (sold out, already purchased, sale not active) are not
//! errors; they are [`crate::admission::PurchaseDecision`] variants. The
//! variants here represent infrastructure failures and administrative
//! mistakes that surface as the `ERROR` outcome or a 4xx at the API.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during admission and reconciliation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The coordinator was unreachable at a step that requires it.
    #[error("coordinator unavailable: {message}")]
    Coordinator {
        /// Description of the coordinator failure.
        message: String,
    },

    /// The order log was unreachable; retrying may succeed.
    #[error("order log unavailable: {message}")]
    Durable {
        /// Description of the order-log failure.
        message: String,
    },

    /// The order log failed permanently.
    #[error("order log failure: {message}")]
    DurableFatal {
        /// Description of the failure.
        message: String,
    },

    /// The referenced sale does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// Invalid input reached the engine.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// An invariant was violated; this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl From<surge_core::Error> for EngineError {
    fn from(value: surge_core::Error) -> Self {
        use surge_core::Error as Core;
        match value {
            Core::Coordinator { .. } => Self::Coordinator {
                message: value.to_string(),
            },
            Core::Durable { .. } => Self::Durable {
                message: value.to_string(),
            },
            Core::DurableFatal { message } => Self::DurableFatal { message },
            Core::SaleNotFound { sale_id } => Self::NotFound {
                message: format!("sale not found: {sale_id}"),
            },
            Core::InvalidId { message } | Core::Validation { message } => {
                Self::Validation { message }
            }
            // Duplicates are handled inline by the admission pipeline; one
            // escaping to this conversion is a bug in the caller.
            Core::DuplicateOrder { .. } => Self::Internal {
                message: value.to_string(),
            },
            Core::Internal { message } => Self::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::{SaleId, UserId};

    #[test]
    fn transient_core_errors_keep_their_kind() {
        let err = EngineError::from(surge_core::Error::coordinator("refused"));
        assert!(matches!(err, EngineError::Coordinator { .. }));

        let err = EngineError::from(surge_core::Error::durable("timeout"));
        assert!(matches!(err, EngineError::Durable { .. }));
    }

    #[test]
    fn missing_sale_maps_to_not_found() {
        let err = EngineError::from(surge_core::Error::SaleNotFound {
            sale_id: SaleId::new("gone").unwrap(),
        });
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn escaped_duplicate_is_internal() {
        let err = EngineError::from(surge_core::Error::DuplicateOrder {
            sale_id: SaleId::new("flash").unwrap(),
            user_id: UserId::new("u").unwrap(),
        });
        assert!(matches!(err, EngineError::Internal { .. }));
    }
}
