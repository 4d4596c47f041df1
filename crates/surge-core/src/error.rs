//! Error types and result aliases for Surge.
//!
//! This module defines the shared error types used across all Surge components.
//! Errors are structured for programmatic handling: callers dispatch on the
//! variant (transient vs. fatal, duplicate vs. missing) rather than on message
//! text.

use crate::id::{SaleId, UserId};

/// The result type used throughout Surge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Surge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// Invalid input was provided.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A coordinator operation failed with a transient connectivity error.
    #[error("coordinator error: {message}")]
    Coordinator {
        /// Description of the coordinator failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An order-log operation failed with a transient connectivity error.
    ///
    /// Retrying the operation may succeed. Durability of previously committed
    /// rows is unaffected.
    #[error("order log error: {message}")]
    Durable {
        /// Description of the order-log failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An order-log operation failed permanently (constraint violation other
    /// than duplication, schema mismatch, serialization failure).
    #[error("fatal order log error: {message}")]
    DurableFatal {
        /// Description of the failure.
        message: String,
    },

    /// An order already exists for this `(sale, user)` pair.
    ///
    /// This is the uniqueness constraint firing; callers on the admission path
    /// treat it as a normal outcome, not a failure.
    #[error("order already exists for user {user_id} in sale {sale_id}")]
    DuplicateOrder {
        /// Sale the duplicate was detected in.
        sale_id: SaleId,
        /// User that already holds an order.
        user_id: UserId,
    },

    /// The requested sale does not exist in the order log.
    #[error("sale not found: {sale_id}")]
    SaleNotFound {
        /// The identifier that was looked up.
        sale_id: SaleId,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a transient coordinator error with the given message.
    #[must_use]
    pub fn coordinator(message: impl Into<String>) -> Self {
        Self::Coordinator {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient coordinator error with a source cause.
    #[must_use]
    pub fn coordinator_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Coordinator {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a transient order-log error with the given message.
    #[must_use]
    pub fn durable(message: impl Into<String>) -> Self {
        Self::Durable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient order-log error with a source cause.
    #[must_use]
    pub fn durable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Durable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a fatal order-log error.
    #[must_use]
    pub fn durable_fatal(message: impl Into<String>) -> Self {
        Self::DurableFatal {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true when the error is a transient connectivity failure that a
    /// retry (or a reconciliation pass) can repair.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Coordinator { .. } | Self::Durable { .. })
    }
}
