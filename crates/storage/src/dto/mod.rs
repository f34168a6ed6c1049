pub mod discount;
pub mod registration;
