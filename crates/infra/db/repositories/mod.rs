pub mod transaction_view;
pub mod transactions;
pub mod users;
