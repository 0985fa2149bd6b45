pub mod escrow;
pub mod transaction_queries;
