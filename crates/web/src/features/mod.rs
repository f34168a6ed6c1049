pub mod discounts;
pub mod health;
pub mod registrations;
