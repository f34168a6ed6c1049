use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Team {
    pub team_id: Uuid,
    pub job_id: Uuid,
    pub age_group_id: Option<Uuid>,
    pub name: String,
    pub fee_base: Option<Decimal>,
    pub per_registrant_fee: Option<Decimal>,
    /// Roster limit; 0 means unlimited
    pub max_count: i32,
    pub active: bool,
}
