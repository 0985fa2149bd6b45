use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingPayment,
    PaymentSubmitted,
    PaymentVerified,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 7] = [
        TransactionStatus::PendingPayment,
        TransactionStatus::PaymentSubmitted,
        TransactionStatus::PaymentVerified,
        TransactionStatus::Shipped,
        TransactionStatus::Delivered,
        TransactionStatus::Completed,
        TransactionStatus::Cancelled,
    ];

    /// Statuses that hold a reservation on the product.
    pub const OPEN: [TransactionStatus; 4] = [
        TransactionStatus::PendingPayment,
        TransactionStatus::PaymentSubmitted,
        TransactionStatus::PaymentVerified,
        TransactionStatus::Shipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingPayment => "pending_payment",
            TransactionStatus::PaymentSubmitted => "payment_submitted",
            TransactionStatus::PaymentVerified => "payment_verified",
            TransactionStatus::Shipped => "shipped",
            TransactionStatus::Delivered => "delivered",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending_payment" => Some(TransactionStatus::PendingPayment),
            "payment_submitted" => Some(TransactionStatus::PaymentSubmitted),
            "payment_verified" => Some(TransactionStatus::PaymentVerified),
            "shipped" => Some(TransactionStatus::Shipped),
            "delivered" => Some(TransactionStatus::Delivered),
            "completed" => Some(TransactionStatus::Completed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn open_status_strings() -> Vec<String> {
        Self::OPEN.iter().map(|status| status.to_string()).collect()
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_round_trips_through_its_column_value() {
        for status in TransactionStatus::ALL {
            assert_eq!(TransactionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::from_str("refunded"), None);
    }

    #[test]
    fn delivered_is_neither_open_nor_terminal() {
        assert!(!TransactionStatus::Delivered.is_open());
        assert!(!TransactionStatus::Delivered.is_terminal());
        assert!(TransactionStatus::Shipped.is_open());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }
}
