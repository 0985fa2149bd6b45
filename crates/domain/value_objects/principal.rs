use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::transactions::TransactionEntity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Buyer,
    Seller,
    Operator,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Seller => "seller",
            ActorRole::Operator => "operator",
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user acting on a transaction, tagged with the capacity they act in.
///
/// `Operator` must only be built after the user directory confirmed the role;
/// buyer and seller identities are checked against the transaction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Buyer(Uuid),
    Seller(Uuid),
    Operator(Uuid),
}

impl Principal {
    pub fn role(&self) -> ActorRole {
        match self {
            Principal::Buyer(_) => ActorRole::Buyer,
            Principal::Seller(_) => ActorRole::Seller,
            Principal::Operator(_) => ActorRole::Operator,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Principal::Buyer(id) | Principal::Seller(id) | Principal::Operator(id) => *id,
        }
    }

    /// The buyer or seller capacity `user_id` holds on `transaction`, if any.
    pub fn party_of(transaction: &TransactionEntity, user_id: Uuid) -> Option<Principal> {
        if transaction.buyer_id == user_id {
            Some(Principal::Buyer(user_id))
        } else if transaction.seller_id == user_id {
            Some(Principal::Seller(user_id))
        } else {
            None
        }
    }

    pub fn acts_for(&self, transaction: &TransactionEntity) -> bool {
        match self {
            Principal::Buyer(id) => *id == transaction.buyer_id,
            Principal::Seller(id) => *id == transaction.seller_id,
            Principal::Operator(_) => true,
        }
    }
}
