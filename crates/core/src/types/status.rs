//! Order and refund status state machines.
//!
//! The order transition table is the single source of truth for which
//! status changes are legal. Services reject anything the table does not
//! allow; nothing is silently ignored.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Transitions only move forward along the table encoded in
/// [`OrderStatus::can_transition_to`]; the one apparent exception is the
/// restore from `RefundRequested` back to the status the order held before
/// the refund was requested, which is driven by the stored status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    RefundRequested,
    Refunded,
}

impl OrderStatus {
    /// Whether the transition `self -> to` is present in the table.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::PendingPayment, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Confirmed)
                | (Self::Confirmed, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (
                    Self::Paid | Self::Confirmed | Self::Shipped | Self::Delivered,
                    Self::RefundRequested,
                )
                | (
                    Self::RefundRequested,
                    Self::Paid
                        | Self::Confirmed
                        | Self::Shipped
                        | Self::Delivered
                        | Self::Refunded,
                )
        )
    }

    /// Whether a refund request may be opened against an order in this status.
    #[must_use]
    pub const fn is_refund_eligible(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Confirmed | Self::Shipped | Self::Delivered
        )
    }

    /// Terminal statuses admit no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Confirmed => "CONFIRMED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::RefundRequested => "REFUND_REQUESTED",
            Self::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "refund_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Requested,
    Approved,
    Rejected,
    Completed,
}

impl RefundStatus {
    /// Rejected and completed requests are final audit records.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "REQUESTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 8] = [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::RefundRequested,
        OrderStatus::Refunded,
    ];

    #[test]
    fn test_forward_transitions_are_allowed() {
        let allowed = [
            (OrderStatus::PendingPayment, OrderStatus::Paid),
            (OrderStatus::PendingPayment, OrderStatus::Cancelled),
            (OrderStatus::Paid, OrderStatus::Confirmed),
            (OrderStatus::Confirmed, OrderStatus::Shipped),
            (OrderStatus::Shipped, OrderStatus::Delivered),
            (OrderStatus::Paid, OrderStatus::RefundRequested),
            (OrderStatus::Confirmed, OrderStatus::RefundRequested),
            (OrderStatus::Shipped, OrderStatus::RefundRequested),
            (OrderStatus::Delivered, OrderStatus::RefundRequested),
            (OrderStatus::RefundRequested, OrderStatus::Refunded),
            // restores after a rejected refund
            (OrderStatus::RefundRequested, OrderStatus::Paid),
            (OrderStatus::RefundRequested, OrderStatus::Delivered),
        ];
        for (from, to) in allowed {
            assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
        }
    }

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(terminal.is_terminal());
            for to in ALL {
                assert!(
                    !terminal.can_transition_to(to),
                    "{terminal} -> {to} must be illegal"
                );
            }
        }
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        let illegal = [
            (OrderStatus::Paid, OrderStatus::PendingPayment),
            (OrderStatus::Paid, OrderStatus::Shipped),
            (OrderStatus::Confirmed, OrderStatus::Delivered),
            (OrderStatus::Delivered, OrderStatus::Shipped),
            (OrderStatus::PendingPayment, OrderStatus::Confirmed),
            (OrderStatus::PendingPayment, OrderStatus::RefundRequested),
            (OrderStatus::Cancelled, OrderStatus::RefundRequested),
            (OrderStatus::Shipped, OrderStatus::Paid),
            (OrderStatus::RefundRequested, OrderStatus::Cancelled),
        ];
        for (from, to) in illegal {
            assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
        }
    }

    #[test]
    fn test_self_transitions_are_illegal() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_refund_eligibility() {
        assert!(OrderStatus::Paid.is_refund_eligible());
        assert!(OrderStatus::Confirmed.is_refund_eligible());
        assert!(OrderStatus::Shipped.is_refund_eligible());
        assert!(OrderStatus::Delivered.is_refund_eligible());
        assert!(!OrderStatus::PendingPayment.is_refund_eligible());
        assert!(!OrderStatus::Cancelled.is_refund_eligible());
        assert!(!OrderStatus::RefundRequested.is_refund_eligible());
        assert!(!OrderStatus::Refunded.is_refund_eligible());
    }

    #[test]
    fn test_refund_status_terminality() {
        assert!(!RefundStatus::Requested.is_terminal());
        assert!(!RefundStatus::Approved.is_terminal());
        assert!(RefundStatus::Rejected.is_terminal());
        assert!(RefundStatus::Completed.is_terminal());
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::RefundRequested).expect("serialize");
        assert_eq!(json, "\"REFUND_REQUESTED\"");
        let parsed: OrderStatus = serde_json::from_str("\"PENDING_PAYMENT\"").expect("parse");
        assert_eq!(parsed, OrderStatus::PendingPayment);
    }
}
