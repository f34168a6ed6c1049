mod age_group;
mod discount_code;
mod job;
mod registration;
mod team;

pub use age_group::AgeGroup;
pub use discount_code::{DiscountCode, DiscountKind};
pub use job::{JobConfiguration, RegistrationMode};
pub use registration::Registration;
pub use team::Team;
