//! # Error Types
//!
//! Domain error types for covers-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  covers-core errors (this file)                                        │
//! │  ├── CoreError        - Domain state errors raised by POS callbacks    │
//! │  └── ValidationError  - Write payload validation failures              │
//! │                                                                         │
//! │  covers-link errors (separate crate)                                   │
//! │  ├── ApiError         - Classified HTTP outcome                        │
//! │  └── LinkError        - Everything a public link operation returns     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LinkError::Domain → POS caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Domain state errors.
///
/// POS callback implementations return these; the reconciliation engine
/// turns them into compensating actions (rejecting an order or a payment)
/// instead of letting them escape from autonomous event handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The platform references an order the POS does not know.
    ///
    /// ## When This Occurs
    /// - A payment arrives for an order that was voided on the POS
    /// - The POS database was restored from an older backup
    ///
    /// ## Engine Reaction
    /// ```text
    /// Pending transaction arrives
    ///      │
    ///      ▼
    /// TransactionManager::ready_to_pay ──► Err(OrderNotOnPos)
    ///      │
    ///      ▼
    /// Engine rejects the payment on the platform (exactly once)
    /// ```
    #[error("Order does not exist on POS: {0}")]
    OrderNotOnPos(String),

    /// A POS manager was used before the vendor finished wiring it.
    #[error("{0} manager not initialized")]
    ManagerNotInitialized(String),

    /// The POS cannot resolve the consumer attached to an order.
    #[error("Consumer could not be resolved for checkin {0}")]
    ConsumerNotFound(String),

    /// A status change that the order state graph does not allow.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Generic refusal from the POS with a human readable reason.
    #[error("POS rejected the operation: {0}")]
    Rejected(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for payloads about to be written to the platform.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Collection holds too many entries.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
