use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    entities::{
        commission_records::InsertCommissionRecordEntity, transactions::TransactionEntity,
    },
    value_objects::{
        enums::{commission_statuses::CommissionStatus, transaction_statuses::TransactionStatus},
        transition_guard::{Requirement, TransitionAction, TransitionRejection},
    },
};

/// Statuses a transaction may be settled from.
pub const SETTLEABLE_STATUSES: [TransactionStatus; 3] = [
    TransactionStatus::PaymentVerified,
    TransactionStatus::Shipped,
    TransactionStatus::Delivered,
];

/// Everything the completion commit writes: the completed transaction and
/// its single commission record. The product flip is keyed by
/// `transaction.product_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub transaction: TransactionEntity,
    pub commission: InsertCommissionRecordEntity,
}

/// The one completion routine. Operator completion and buyer-confirmed
/// auto-completion both end here.
pub fn settle(
    current: &TransactionEntity,
    now: DateTime<Utc>,
) -> Result<Settlement, TransitionRejection> {
    let status = current.transaction_status();
    if !status.is_some_and(|status| SETTLEABLE_STATUSES.contains(&status)) {
        return Err(TransitionRejection::InvalidState {
            action: TransitionAction::Complete,
            status: current.status.clone(),
        });
    }
    if !Requirement::PaymentCollected.is_met(current) {
        return Err(TransitionRejection::PreconditionFailed {
            action: TransitionAction::Complete,
            requirement: Requirement::PaymentCollected,
        });
    }

    let mut completed = current.clone();
    completed.status = TransactionStatus::Completed.to_string();
    completed.completed_at = Some(now);
    completed.released_at = Some(now);
    completed.seller_paid = true;
    completed.seller_paid_at = Some(now);
    completed.seller_payout_amount_minor = Some(current.seller_earnings_minor);
    completed.seller_payout_reference = Some(payout_reference(current.id, now));
    completed.updated_at = now;

    let commission = InsertCommissionRecordEntity {
        transaction_id: current.id,
        seller_id: current.seller_id,
        product_id: current.product_id,
        amount_minor: current.commission_amount_minor,
        rate_bps: current.commission_rate_bps,
        status: CommissionStatus::Paid.to_string(),
        collected_at: current.payment_verified_at.unwrap_or(now),
        paid_at: now,
        created_at: now,
    };

    Ok(Settlement {
        transaction: completed,
        commission,
    })
}

/// `PO-<yyyymmddHHMMSS>-<transaction id>`; unique because the id is.
pub fn payout_reference(transaction_id: Uuid, settled_at: DateTime<Utc>) -> String {
    format!(
        "PO-{}-{}",
        settled_at.format("%Y%m%d%H%M%S"),
        transaction_id.simple().to_string().to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transactions::sample_transaction;
    use chrono::TimeZone;

    fn settled_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn settlement_pays_seller_and_books_commission() {
        let mut current = sample_transaction(TransactionStatus::Shipped);
        current.payment_collected_by_platform = true;

        let settlement = settle(&current, settled_at()).unwrap();
        let done = &settlement.transaction;

        assert_eq!(done.status, "completed");
        assert_eq!(done.completed_at, Some(settled_at()));
        assert_eq!(done.released_at, Some(settled_at()));
        assert!(done.seller_paid);
        assert_eq!(done.seller_payout_amount_minor, Some(98_000));
        assert!(done.amounts_balance());

        assert_eq!(settlement.commission.transaction_id, current.id);
        assert_eq!(settlement.commission.amount_minor, 2_000);
        assert_eq!(settlement.commission.rate_bps, 200);
        assert_eq!(settlement.commission.status, "paid");
    }

    #[test]
    fn settlement_requires_collected_payment() {
        let current = sample_transaction(TransactionStatus::PaymentVerified);

        let rejection = settle(&current, settled_at()).unwrap_err();

        assert_eq!(
            rejection,
            TransitionRejection::PreconditionFailed {
                action: TransitionAction::Complete,
                requirement: Requirement::PaymentCollected,
            }
        );
    }

    #[test]
    fn completed_and_cancelled_transactions_cannot_settle() {
        for status in [
            TransactionStatus::Completed,
            TransactionStatus::Cancelled,
            TransactionStatus::PendingPayment,
            TransactionStatus::PaymentSubmitted,
        ] {
            let mut current = sample_transaction(status);
            current.payment_collected_by_platform = true;
            assert!(matches!(
                settle(&current, settled_at()),
                Err(TransitionRejection::InvalidState { .. })
            ));
        }
    }

    #[test]
    fn payout_reference_embeds_time_and_id() {
        let id = Uuid::parse_str("6f1c2b1e-0000-4000-8000-00000000abcd").unwrap();
        assert_eq!(
            payout_reference(id, settled_at()),
            "PO-20250314092653-6F1C2B1E00004000800000000000ABCD"
        );
    }
}
