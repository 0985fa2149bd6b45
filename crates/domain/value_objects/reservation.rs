use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::{
        products::ProductEntity,
        transactions::{InsertTransactionEntity, TransactionEntity},
    },
    value_objects::{
        enums::{
            payment_methods::PaymentMethod, product_statuses::ProductStatus,
            transaction_statuses::TransactionStatus,
        },
        money::{CommissionRate, split_sale_price},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationRequest {
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub payment_method: PaymentMethod,
    pub commission_rate: CommissionRate,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReservationRejection {
    #[error("buyers cannot purchase their own listing")]
    AlreadyOwned,
    #[error("product is not available for purchase")]
    ProductUnavailable,
    #[error("you already have an open transaction for this product")]
    DuplicatePending,
    #[error("product is reserved by another buyer")]
    ReservedByAnotherBuyer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    Reserved(TransactionEntity),
    Rejected(ReservationRejection),
}

/// Decides whether `buyer_id` may open a transaction on `product`. A
/// missing product is `ProductUnavailable` and is the caller's check.
///
/// `open_transactions` must be every open transaction on the product, read
/// while the product row is locked.
pub fn check_reservation(
    product: &ProductEntity,
    buyer_id: Uuid,
    open_transactions: &[TransactionEntity],
) -> Result<(), ReservationRejection> {
    if product.seller_id == buyer_id {
        return Err(ReservationRejection::AlreadyOwned);
    }
    if product.product_status() != Some(ProductStatus::Active) {
        return Err(ReservationRejection::ProductUnavailable);
    }

    let holders: Vec<&TransactionEntity> = open_transactions
        .iter()
        .filter(|transaction| {
            transaction
                .transaction_status()
                .is_some_and(|status| status.is_open())
        })
        .collect();

    if holders.iter().any(|transaction| transaction.buyer_id == buyer_id) {
        return Err(ReservationRejection::DuplicatePending);
    }
    if !holders.is_empty() {
        return Err(ReservationRejection::ReservedByAnotherBuyer);
    }

    Ok(())
}

/// Freezes price and commission for a new `pending_payment` transaction.
pub fn draft_transaction(
    product: &ProductEntity,
    request: &ReservationRequest,
) -> Result<InsertTransactionEntity> {
    let split = split_sale_price(product.price_minor, request.commission_rate)?;

    Ok(InsertTransactionEntity {
        product_id: product.id,
        buyer_id: request.buyer_id,
        seller_id: product.seller_id,
        sale_price_minor: split.sale_price_minor,
        commission_rate_bps: request.commission_rate.bps(),
        commission_amount_minor: split.commission_minor,
        seller_earnings_minor: split.seller_earnings_minor,
        status: TransactionStatus::PendingPayment.to_string(),
        payment_method: request.payment_method.to_string(),
        payment_collected_by_platform: false,
        seller_paid: false,
        created_at: request.requested_at,
        updated_at: request.requested_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transactions::sample_transaction;
    use chrono::TimeZone;

    fn product(status: ProductStatus) -> ProductEntity {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        ProductEntity {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: "Film camera".to_string(),
            price_minor: 100_000,
            status: status.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn open_by(buyer_id: Uuid, status: TransactionStatus) -> TransactionEntity {
        let mut transaction = sample_transaction(status);
        transaction.buyer_id = buyer_id;
        transaction
    }

    #[test]
    fn active_product_without_holders_can_be_reserved() {
        let product = product(ProductStatus::Active);
        assert_eq!(check_reservation(&product, Uuid::new_v4(), &[]), Ok(()));
    }

    #[test]
    fn sold_or_inactive_products_are_unavailable() {
        let buyer_id = Uuid::new_v4();
        for status in [ProductStatus::Sold, ProductStatus::Inactive] {
            assert_eq!(
                check_reservation(&product(status), buyer_id, &[]),
                Err(ReservationRejection::ProductUnavailable)
            );
        }
    }

    #[test]
    fn owner_cannot_buy_own_listing() {
        let product = product(ProductStatus::Active);
        assert_eq!(
            check_reservation(&product, product.seller_id, &[]),
            Err(ReservationRejection::AlreadyOwned)
        );
    }

    #[test]
    fn same_buyer_with_open_transaction_is_duplicate() {
        let product = product(ProductStatus::Active);
        let buyer_id = Uuid::new_v4();
        let open = [open_by(buyer_id, TransactionStatus::PaymentSubmitted)];

        assert_eq!(
            check_reservation(&product, buyer_id, &open),
            Err(ReservationRejection::DuplicatePending)
        );
    }

    #[test]
    fn another_buyers_open_transaction_holds_the_product() {
        let product = product(ProductStatus::Active);
        let open = [open_by(Uuid::new_v4(), TransactionStatus::PendingPayment)];

        assert_eq!(
            check_reservation(&product, Uuid::new_v4(), &open),
            Err(ReservationRejection::ReservedByAnotherBuyer)
        );
    }

    #[test]
    fn cancelled_transactions_release_the_product() {
        let product = product(ProductStatus::Active);
        let buyer_id = Uuid::new_v4();
        let closed = [
            open_by(buyer_id, TransactionStatus::Cancelled),
            open_by(Uuid::new_v4(), TransactionStatus::Cancelled),
        ];

        assert_eq!(check_reservation(&product, buyer_id, &closed), Ok(()));
    }

    #[test]
    fn draft_freezes_price_and_commission() {
        let product = product(ProductStatus::Active);
        let requested_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let request = ReservationRequest {
            product_id: product.id,
            buyer_id: Uuid::new_v4(),
            payment_method: PaymentMethod::EWallet,
            commission_rate: CommissionRate::default(),
            requested_at,
        };

        let draft = draft_transaction(&product, &request).unwrap();

        assert_eq!(draft.seller_id, product.seller_id);
        assert_eq!(draft.sale_price_minor, 100_000);
        assert_eq!(draft.commission_rate_bps, 200);
        assert_eq!(draft.commission_amount_minor, 2_000);
        assert_eq!(draft.seller_earnings_minor, 98_000);
        assert_eq!(draft.status, "pending_payment");
        assert_eq!(draft.payment_method, "e_wallet");
        assert!(!draft.payment_collected_by_platform);
        assert_eq!(draft.created_at, requested_at);
    }
}
