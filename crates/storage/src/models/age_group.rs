use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fee and eligibility tier shared by the teams of a league.
///
/// Its fees are only consulted when the team itself has no positive fee.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AgeGroup {
    pub age_group_id: Uuid,
    pub league_id: Option<Uuid>,
    pub name: String,
    pub team_fee: Option<Decimal>,
    pub roster_fee: Option<Decimal>,
}
