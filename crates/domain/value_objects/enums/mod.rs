pub mod commission_statuses;
pub mod payment_methods;
pub mod product_statuses;
pub mod sort_order;
pub mod transaction_statuses;
pub mod user_roles;
