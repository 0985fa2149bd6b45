pub mod app_users;
pub mod commission_records;
pub mod products;
pub mod transactions;
