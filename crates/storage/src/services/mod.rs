use rust_decimal::Decimal;

pub mod discount;
pub mod fee_application;
pub mod fee_calculator;
pub mod fee_resolution;
pub mod field_mapper;
pub mod form_validation;
pub mod insurance;
pub mod reconciliation;
pub mod registration_matcher;
pub mod team_capacity;

pub use discount::DiscountService;
pub use fee_application::FeeApplicationGuard;
pub use fee_calculator::{FeeCalculator, FeeTotals};
pub use fee_resolution::{FeeResolutionCascade, NoCentralLookup, PerRegistrantFee, TeamFeeLookup};
pub use field_mapper::{DynamicFieldMapper, FieldMetadata, FieldMetadataSet};
pub use form_validation::{FormValidator, MetadataFormValidator, PlayerFormValues};
pub use insurance::{InsuranceOfferService, NoInsuranceOffers};
pub use reconciliation::ReconciliationOrchestrator;

/// Engine settings shared by every fee computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationSettings {
    /// Card processing surcharge, as a percentage of the base fee
    pub cc_percent: Decimal,
    /// Whether a validator failure lets the submission save anyway
    pub validation_fail_open: bool,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            cc_percent: Decimal::new(35, 1),
            validation_fail_open: true,
        }
    }
}
