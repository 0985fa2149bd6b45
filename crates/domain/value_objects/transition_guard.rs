//! Declarative escrow state machine.
//!
//! Every lifecycle mutation goes through [`apply`], which consults
//! [`TRANSITION_TABLE`] for the (status, actor) pair and checks the rule's
//! required flags before touching the transaction. Nothing here reads or
//! writes storage.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    entities::transactions::TransactionEntity,
    value_objects::{
        enums::transaction_statuses::TransactionStatus,
        principal::{ActorRole, Principal},
        settlement::{Settlement, settle},
    },
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    SubmitPayment,
    VerifyPayment,
    CollectPayment,
    Ship,
    ConfirmDelivery,
    Complete,
    Cancel,
}

impl TransitionAction {
    pub const ALL: [TransitionAction; 7] = [
        TransitionAction::SubmitPayment,
        TransitionAction::VerifyPayment,
        TransitionAction::CollectPayment,
        TransitionAction::Ship,
        TransitionAction::ConfirmDelivery,
        TransitionAction::Complete,
        TransitionAction::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::SubmitPayment => "submit_payment",
            TransitionAction::VerifyPayment => "verify_payment",
            TransitionAction::CollectPayment => "collect_payment",
            TransitionAction::Ship => "ship",
            TransitionAction::ConfirmDelivery => "confirm_delivery",
            TransitionAction::Complete => "complete",
            TransitionAction::Cancel => "cancel",
        }
    }
}

impl Display for TransitionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags a rule needs on top of the source status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    PaymentCollected,
}

impl Requirement {
    pub fn is_met(&self, transaction: &TransactionEntity) -> bool {
        match self {
            Requirement::PaymentCollected => transaction.payment_collected_by_platform,
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Requirement::PaymentCollected => {
                "the platform has not collected the buyer's payment; verify the payment first"
            }
        }
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.remediation())
    }
}

#[derive(Debug)]
pub struct TransitionRule {
    pub action: TransitionAction,
    pub from: &'static [TransactionStatus],
    pub actors: &'static [ActorRole],
    pub to: TransactionStatus,
    pub requires: &'static [Requirement],
}

use ActorRole::{Buyer, Operator, Seller};
use TransactionStatus::{
    Cancelled, Completed, Delivered, PaymentSubmitted, PaymentVerified, PendingPayment, Shipped,
};

/// The complete edge set. An (action, status) pair missing from this table
/// is an invalid transition.
pub static TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule {
        action: TransitionAction::SubmitPayment,
        from: &[PendingPayment],
        actors: &[Buyer],
        to: PaymentSubmitted,
        requires: &[],
    },
    TransitionRule {
        action: TransitionAction::Cancel,
        from: &[PendingPayment, PaymentSubmitted],
        actors: &[Buyer, Seller],
        to: Cancelled,
        requires: &[],
    },
    TransitionRule {
        action: TransitionAction::VerifyPayment,
        from: &[PaymentSubmitted],
        actors: &[Operator],
        to: PaymentVerified,
        requires: &[],
    },
    // Re-verifying is accepted and leaves a collected transaction untouched.
    TransitionRule {
        action: TransitionAction::VerifyPayment,
        from: &[PaymentVerified],
        actors: &[Operator],
        to: PaymentVerified,
        requires: &[],
    },
    TransitionRule {
        action: TransitionAction::CollectPayment,
        from: &[PaymentVerified],
        actors: &[Operator],
        to: PaymentVerified,
        requires: &[],
    },
    TransitionRule {
        action: TransitionAction::Ship,
        from: &[PaymentVerified],
        actors: &[Seller],
        to: Shipped,
        requires: &[Requirement::PaymentCollected],
    },
    // Delivery settles immediately, see `apply`.
    TransitionRule {
        action: TransitionAction::ConfirmDelivery,
        from: &[Shipped],
        actors: &[Buyer],
        to: Delivered,
        requires: &[],
    },
    TransitionRule {
        action: TransitionAction::Complete,
        from: &[PaymentVerified, Shipped, Delivered],
        actors: &[Operator],
        to: Completed,
        requires: &[Requirement::PaymentCollected],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejection {
    #[error("{role} is not allowed to {action} this transaction")]
    Unauthorized {
        action: TransitionAction,
        role: ActorRole,
    },
    #[error("{action} is not available while the transaction is {status}")]
    InvalidState {
        action: TransitionAction,
        status: String,
    },
    #[error("cannot {action} yet: {requirement}")]
    PreconditionFailed {
        action: TransitionAction,
        requirement: Requirement,
    },
}

/// A requested move, with the evidence it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    SubmitPayment {
        proof_reference: String,
        platform_payment_reference: String,
    },
    VerifyPayment,
    CollectPayment,
    Ship {
        proof_reference: Option<String>,
    },
    ConfirmDelivery {
        proof_reference: Option<String>,
    },
    Complete,
    Cancel {
        reason: Option<String>,
    },
}

impl Transition {
    pub fn action(&self) -> TransitionAction {
        match self {
            Transition::SubmitPayment { .. } => TransitionAction::SubmitPayment,
            Transition::VerifyPayment => TransitionAction::VerifyPayment,
            Transition::CollectPayment => TransitionAction::CollectPayment,
            Transition::Ship { .. } => TransitionAction::Ship,
            Transition::ConfirmDelivery { .. } => TransitionAction::ConfirmDelivery,
            Transition::Complete => TransitionAction::Complete,
            Transition::Cancel { .. } => TransitionAction::Cancel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Idempotent replay; nothing to persist.
    Unchanged,
    Updated(TransactionEntity),
    /// Must be persisted as one commit together with the commission record
    /// and the product flip.
    Completed(Settlement),
}

/// Finds the rule that lets `principal` perform `action` right now.
pub fn authorize(
    current: &TransactionEntity,
    principal: &Principal,
    action: TransitionAction,
) -> Result<&'static TransitionRule, TransitionRejection> {
    let unauthorized = || TransitionRejection::Unauthorized {
        action,
        role: principal.role(),
    };
    let invalid_state = || TransitionRejection::InvalidState {
        action,
        status: current.status.clone(),
    };

    // Outsiders learn nothing about the transaction's state.
    if !principal.acts_for(current) {
        return Err(unauthorized());
    }

    let status = current.transaction_status().ok_or_else(invalid_state)?;
    let rule = TRANSITION_TABLE
        .iter()
        .find(|rule| rule.action == action && rule.from.contains(&status))
        .ok_or_else(invalid_state)?;

    if !rule.actors.contains(&principal.role()) {
        return Err(unauthorized());
    }

    if let Some(requirement) = rule.requires.iter().find(|req| !req.is_met(current)) {
        return Err(TransitionRejection::PreconditionFailed {
            action,
            requirement: *requirement,
        });
    }

    Ok(rule)
}

/// Applies `transition` to a copy of `current`.
pub fn apply(
    current: &TransactionEntity,
    principal: &Principal,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionRejection> {
    let rule = authorize(current, principal, transition.action())?;
    let mut next = current.clone();

    match transition {
        Transition::SubmitPayment {
            proof_reference,
            platform_payment_reference,
        } => {
            next.payment_proof_reference = Some(proof_reference);
            next.platform_payment_reference = Some(platform_payment_reference);
            next.payment_submitted_at.get_or_insert(now);
        }
        Transition::VerifyPayment | Transition::CollectPayment => {
            if is_settled_replay(current, rule) {
                return Ok(TransitionOutcome::Unchanged);
            }
            next.payment_collected_by_platform = true;
            if next.payment_verified_at.is_none() {
                next.payment_verified_at = Some(now);
                next.payment_verified_by = Some(principal.user_id());
            }
        }
        Transition::Ship { proof_reference } => {
            if proof_reference.is_some() {
                next.shipping_proof_reference = proof_reference;
            }
            next.shipped_at.get_or_insert(now);
        }
        Transition::ConfirmDelivery { proof_reference } => {
            if proof_reference.is_some() {
                next.delivery_proof_reference = proof_reference;
            }
            next.delivered_at.get_or_insert(now);
            next.status = rule.to.to_string();
            next.updated_at = now;
            return settle(&next, now).map(TransitionOutcome::Completed);
        }
        Transition::Complete => {
            return settle(current, now).map(TransitionOutcome::Completed);
        }
        Transition::Cancel { reason } => {
            next.cancellation_reason = reason;
            next.cancelled_at.get_or_insert(now);
            next.cancelled_by.get_or_insert(principal.user_id());
        }
    }

    next.status = rule.to.to_string();
    next.updated_at = now;
    Ok(TransitionOutcome::Updated(next))
}

/// Actions `principal` could take on `current` right now, excluding
/// idempotent replays.
pub fn available_actions(
    current: &TransactionEntity,
    principal: &Principal,
) -> Vec<TransitionAction> {
    TransitionAction::ALL
        .into_iter()
        .filter(|action| {
            authorize(current, principal, *action)
                .is_ok_and(|rule| !is_settled_replay(current, rule))
        })
        .collect()
}

fn is_settled_replay(current: &TransactionEntity, rule: &TransitionRule) -> bool {
    current.transaction_status() == Some(rule.to) && current.payment_collected_by_platform
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transactions::sample_transaction;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 2, 8, 30, 0).unwrap()
    }

    /// A transaction in `status` with the flags a real one would carry there.
    fn transaction_in(status: TransactionStatus) -> TransactionEntity {
        let mut transaction = sample_transaction(status);
        if matches!(status, PaymentVerified | Shipped | Delivered | Completed) {
            transaction.payment_collected_by_platform = true;
            transaction.payment_verified_at = Some(now());
        }
        transaction
    }

    fn principals_for(transaction: &TransactionEntity) -> [Principal; 3] {
        [
            Principal::Buyer(transaction.buyer_id),
            Principal::Seller(transaction.seller_id),
            Principal::Operator(uuid::Uuid::new_v4()),
        ]
    }

    fn request_for(action: TransitionAction) -> Transition {
        match action {
            TransitionAction::SubmitPayment => Transition::SubmitPayment {
                proof_reference: "proofs/payment.jpg".to_string(),
                platform_payment_reference: "TRX-1".to_string(),
            },
            TransitionAction::VerifyPayment => Transition::VerifyPayment,
            TransitionAction::CollectPayment => Transition::CollectPayment,
            TransitionAction::Ship => Transition::Ship {
                proof_reference: None,
            },
            TransitionAction::ConfirmDelivery => Transition::ConfirmDelivery {
                proof_reference: None,
            },
            TransitionAction::Complete => Transition::Complete,
            TransitionAction::Cancel => Transition::Cancel { reason: None },
        }
    }

    fn resulting_status(
        current: &TransactionEntity,
        outcome: &TransitionOutcome,
    ) -> TransactionStatus {
        let status = match outcome {
            TransitionOutcome::Unchanged => &current.status,
            TransitionOutcome::Updated(next) => &next.status,
            TransitionOutcome::Completed(settlement) => &settlement.transaction.status,
        };
        TransactionStatus::from_str(status).unwrap()
    }

    #[test]
    fn guard_accepts_exactly_the_documented_edges() {
        let expected: BTreeSet<(&str, &str, &str)> = [
            ("pending_payment", "buyer", "payment_submitted"),
            ("pending_payment", "buyer", "cancelled"),
            ("pending_payment", "seller", "cancelled"),
            ("payment_submitted", "buyer", "cancelled"),
            ("payment_submitted", "seller", "cancelled"),
            ("payment_submitted", "operator", "payment_verified"),
            ("payment_verified", "operator", "payment_verified"),
            ("payment_verified", "seller", "shipped"),
            ("payment_verified", "operator", "completed"),
            ("shipped", "buyer", "completed"),
            ("shipped", "operator", "completed"),
            ("delivered", "operator", "completed"),
        ]
        .into_iter()
        .collect();

        let mut accepted = BTreeSet::new();
        for status in TransactionStatus::ALL {
            let current = transaction_in(status);
            for principal in principals_for(&current) {
                for action in TransitionAction::ALL {
                    if let Ok(outcome) = apply(&current, &principal, request_for(action), now()) {
                        let to = resulting_status(&current, &outcome);
                        accepted.insert((status.as_str(), principal.role().as_str(), to.as_str()));
                    }
                }
            }
        }

        assert_eq!(accepted, expected);
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for status in [Completed, Cancelled] {
            let current = transaction_in(status);
            for principal in principals_for(&current) {
                assert!(available_actions(&current, &principal).is_empty());
                for action in TransitionAction::ALL {
                    assert!(matches!(
                        apply(&current, &principal, request_for(action), now()),
                        Err(TransitionRejection::InvalidState { .. })
                    ));
                }
            }
        }
    }

    #[test]
    fn collected_flag_never_resets() {
        for status in TransactionStatus::ALL {
            let current = transaction_in(status);
            for principal in principals_for(&current) {
                for action in TransitionAction::ALL {
                    let Ok(outcome) = apply(&current, &principal, request_for(action), now())
                    else {
                        continue;
                    };
                    let collected = match &outcome {
                        TransitionOutcome::Unchanged => current.payment_collected_by_platform,
                        TransitionOutcome::Updated(next) => next.payment_collected_by_platform,
                        TransitionOutcome::Completed(settlement) => {
                            settlement.transaction.payment_collected_by_platform
                        }
                    };
                    assert!(collected || !current.payment_collected_by_platform);
                }
            }
        }
    }

    #[test]
    fn cancel_after_shipping_is_invalid_state() {
        let current = transaction_in(Shipped);
        let rejection = apply(
            &current,
            &Principal::Buyer(current.buyer_id),
            Transition::Cancel { reason: None },
            now(),
        )
        .unwrap_err();

        assert_eq!(
            rejection,
            TransitionRejection::InvalidState {
                action: TransitionAction::Cancel,
                status: "shipped".to_string(),
            }
        );
    }

    #[test]
    fn complete_without_collected_payment_fails_precondition() {
        let current = sample_transaction(PaymentVerified);

        let rejection = apply(
            &current,
            &Principal::Operator(uuid::Uuid::new_v4()),
            Transition::Complete,
            now(),
        )
        .unwrap_err();

        assert_eq!(
            rejection,
            TransitionRejection::PreconditionFailed {
                action: TransitionAction::Complete,
                requirement: Requirement::PaymentCollected,
            }
        );
    }

    #[test]
    fn ship_without_collected_payment_fails_precondition() {
        let current = sample_transaction(PaymentVerified);

        let rejection = apply(
            &current,
            &Principal::Seller(current.seller_id),
            Transition::Ship {
                proof_reference: None,
            },
            now(),
        )
        .unwrap_err();

        assert!(matches!(
            rejection,
            TransitionRejection::PreconditionFailed { .. }
        ));
    }

    #[test]
    fn stranger_claiming_buyer_role_is_unauthorized() {
        let current = transaction_in(PendingPayment);

        let rejection = apply(
            &current,
            &Principal::Buyer(uuid::Uuid::new_v4()),
            request_for(TransitionAction::SubmitPayment),
            now(),
        )
        .unwrap_err();

        assert_eq!(
            rejection,
            TransitionRejection::Unauthorized {
                action: TransitionAction::SubmitPayment,
                role: ActorRole::Buyer,
            }
        );
    }

    #[test]
    fn stranger_is_unauthorized_whatever_the_status() {
        for status in TransactionStatus::ALL {
            let current = transaction_in(status);

            let rejection = apply(
                &current,
                &Principal::Buyer(uuid::Uuid::new_v4()),
                request_for(TransitionAction::SubmitPayment),
                now(),
            )
            .unwrap_err();

            assert!(matches!(rejection, TransitionRejection::Unauthorized { .. }));
            assert!(!rejection.to_string().contains(status.as_str()));
        }
    }

    #[test]
    fn operator_cannot_cancel() {
        let current = transaction_in(PaymentSubmitted);

        let rejection = apply(
            &current,
            &Principal::Operator(uuid::Uuid::new_v4()),
            Transition::Cancel { reason: None },
            now(),
        )
        .unwrap_err();

        assert!(matches!(rejection, TransitionRejection::Unauthorized { .. }));
    }

    #[test]
    fn verify_sets_collected_and_records_operator() {
        let current = transaction_in(PaymentSubmitted);
        let operator_id = uuid::Uuid::new_v4();

        let outcome = apply(
            &current,
            &Principal::Operator(operator_id),
            Transition::VerifyPayment,
            now(),
        )
        .unwrap();

        let TransitionOutcome::Updated(next) = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert_eq!(next.status, "payment_verified");
        assert!(next.payment_collected_by_platform);
        assert_eq!(next.payment_verified_by, Some(operator_id));
        assert_eq!(next.payment_verified_at, Some(now()));
    }

    #[test]
    fn verifying_twice_is_a_no_op() {
        let current = transaction_in(PaymentVerified);

        let outcome = apply(
            &current,
            &Principal::Operator(uuid::Uuid::new_v4()),
            Transition::VerifyPayment,
            now(),
        )
        .unwrap();

        assert_eq!(outcome, TransitionOutcome::Unchanged);
    }

    #[test]
    fn collect_sets_flag_when_verified_without_collection() {
        let current = sample_transaction(PaymentVerified);

        let outcome = apply(
            &current,
            &Principal::Operator(uuid::Uuid::new_v4()),
            Transition::CollectPayment,
            now(),
        )
        .unwrap();

        let TransitionOutcome::Updated(next) = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert!(next.payment_collected_by_platform);
        assert_eq!(next.status, "payment_verified");
    }

    #[test]
    fn confirming_delivery_settles_in_the_same_step() {
        let current = transaction_in(Shipped);

        let outcome = apply(
            &current,
            &Principal::Buyer(current.buyer_id),
            Transition::ConfirmDelivery {
                proof_reference: Some("delivery/1.jpg".to_string()),
            },
            now(),
        )
        .unwrap();

        let TransitionOutcome::Completed(settlement) = outcome else {
            panic!("expected a settlement, got {outcome:?}");
        };
        let done = settlement.transaction;
        assert_eq!(done.status, "completed");
        assert_eq!(done.delivered_at, Some(now()));
        assert_eq!(done.completed_at, Some(now()));
        assert_eq!(done.delivery_proof_reference.as_deref(), Some("delivery/1.jpg"));
        assert_eq!(settlement.commission.amount_minor, 2_000);
    }

    #[test]
    fn submit_payment_records_evidence() {
        let current = transaction_in(PendingPayment);

        let outcome = apply(
            &current,
            &Principal::Buyer(current.buyer_id),
            request_for(TransitionAction::SubmitPayment),
            now(),
        )
        .unwrap();

        let TransitionOutcome::Updated(next) = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert_eq!(next.status, "payment_submitted");
        assert_eq!(next.payment_proof_reference.as_deref(), Some("proofs/payment.jpg"));
        assert_eq!(next.platform_payment_reference.as_deref(), Some("TRX-1"));
        assert_eq!(next.payment_submitted_at, Some(now()));
        assert!(!next.payment_collected_by_platform);
    }

    #[test]
    fn cancel_records_actor_and_reason() {
        let current = transaction_in(PaymentSubmitted);

        let outcome = apply(
            &current,
            &Principal::Seller(current.seller_id),
            Transition::Cancel {
                reason: Some("item damaged".to_string()),
            },
            now(),
        )
        .unwrap();

        let TransitionOutcome::Updated(next) = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert_eq!(next.status, "cancelled");
        assert_eq!(next.cancelled_by, Some(current.seller_id));
        assert_eq!(next.cancellation_reason.as_deref(), Some("item damaged"));
    }

    #[test]
    fn available_actions_follow_the_viewer() {
        let current = transaction_in(PaymentVerified);

        assert_eq!(
            available_actions(&current, &Principal::Seller(current.seller_id)),
            vec![TransitionAction::Ship]
        );
        assert_eq!(
            available_actions(&current, &Principal::Operator(uuid::Uuid::new_v4())),
            vec![TransitionAction::Complete]
        );
        assert!(available_actions(&current, &Principal::Buyer(current.buyer_id)).is_empty());
    }

    #[test]
    fn every_rule_keeps_amounts_balanced() {
        for status in TransactionStatus::ALL {
            let current = transaction_in(status);
            for principal in principals_for(&current) {
                for action in TransitionAction::ALL {
                    match apply(&current, &principal, request_for(action), now()) {
                        Ok(TransitionOutcome::Updated(next)) => assert!(next.amounts_balance()),
                        Ok(TransitionOutcome::Completed(settlement)) => {
                            assert!(settlement.transaction.amounts_balance())
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
