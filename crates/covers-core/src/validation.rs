//! # Validation Module
//!
//! Checks run on payloads before they leave the POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: POS UI                                                       │
//! │  └── Whatever the vendor checks while staff edit an order              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: covers-link write path                                       │
//! │  └── THIS MODULE: shape checks before PUT / POST                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Platform                                                     │
//! │  ├── 400 for malformed payloads                                        │
//! │  └── 409 for stale version tokens                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catching a bad payload here saves a round trip and keeps a 400 from
//! being mistaken for a platform outage.
//!
//! ## Usage
//! ```rust
//! use covers_core::validation::validate_points_redeem;
//! use covers_core::PointsRedeem;
//!
//! let redeem = PointsRedeem { order_id: "o-1".into(), points: 50, reward_id: None };
//! assert!(validate_points_redeem(&redeem).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{Order, PointsRedeem, Transaction};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note accepted on a line item.
pub const MAX_NOTE_LENGTH: usize = 500;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates that an identifier is present and non-blank.
///
/// ## Example
/// ```rust
/// use covers_core::validation::validate_id;
///
/// assert!(validate_id("order_id", "o-1").is_ok());
/// assert!(validate_id("order_id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Order Validators
// =============================================================================

/// Validates a line item quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 1 || quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an order before it is written to the platform.
///
/// ## Rules
/// - At most [`MAX_ORDER_ITEMS`] line items
/// - Every quantity between 1 and [`MAX_ITEM_QUANTITY`]
/// - No negative unit prices, totals or surcount amounts
/// - Notes no longer than [`MAX_NOTE_LENGTH`]
/// - A POS-created order (no platform id) must carry its POS id
pub fn validate_order_for_write(order: &Order) -> ValidationResult<()> {
    if order.id.is_none() {
        match order.pos_id.as_deref() {
            Some(pos_id) => validate_id("pos_id", pos_id)?,
            None => {
                return Err(ValidationError::Required {
                    field: "pos_id".to_string(),
                })
            }
        }
    }

    if order.items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::TooMany {
            field: "items".to_string(),
            max: MAX_ORDER_ITEMS,
        });
    }

    for item in &order.items {
        validate_quantity(item.quantity)?;
        if item.unit_price.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_price".to_string(),
            });
        }
        if let Some(notes) = &item.notes {
            if notes.chars().count() > MAX_NOTE_LENGTH {
                return Err(ValidationError::TooLong {
                    field: "notes".to_string(),
                    max: MAX_NOTE_LENGTH,
                });
            }
        }
    }

    if order.surcounts.iter().any(|s| s.amount.is_negative()) {
        return Err(ValidationError::MustNotBeNegative {
            field: "surcounts".to_string(),
        });
    }

    if order.pay_total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "pay_total".to_string(),
        });
    }

    if order.not_paying_total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "not_paying_total".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Payment Validators
// =============================================================================

/// Validates a transaction before it is created or pushed as a payment request.
pub fn validate_transaction(transaction: &Transaction) -> ValidationResult<()> {
    validate_id("order_id", &transaction.order_id)?;

    if !transaction.amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a points redemption request.
pub fn validate_points_redeem(redeem: &PointsRedeem) -> ValidationResult<()> {
    validate_id("order_id", &redeem.order_id)?;

    if redeem.points <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "points".to_string(),
        });
    }

    if let Some(reward_id) = &redeem.reward_id {
        validate_id("reward_id", reward_id)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
