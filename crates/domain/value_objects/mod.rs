pub mod clock;
pub mod enums;
pub mod evidence;
pub mod money;
pub mod principal;
pub mod reservation;
pub mod settlement;
pub mod transactions;
pub mod transition_guard;
