use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request payload for redeeming a discount code against a family's registrations
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ApplyDiscountRequest {
    pub family_user_id: Uuid,

    #[validate(length(min = 1, max = 50, message = "Code must be between 1 and 50 characters"))]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiscountAdjustment {
    pub registration_id: Uuid,
    pub player_user_id: Uuid,
    pub fee_discount: Decimal,
    pub fee_processing: Decimal,
    pub fee_total: Decimal,
    pub owed_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedRegistration {
    pub registration_id: Uuid,
    pub player_user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplyDiscountResponse {
    pub code: String,
    pub applied: Vec<DiscountAdjustment>,
    pub skipped: Vec<SkippedRegistration>,
}
