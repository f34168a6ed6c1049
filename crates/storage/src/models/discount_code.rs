use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DiscountCode {
    pub code_id: Uuid,
    pub job_id: Uuid,
    pub code_name: String,
    pub is_percent: bool,
    pub amount: Decimal,
    pub code_start_date: Option<NaiveDateTime>,
    pub code_end_date: Option<NaiveDateTime>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    Fixed(Decimal),
    Percent(Decimal),
}

impl DiscountCode {
    pub fn kind(&self) -> DiscountKind {
        if self.is_percent {
            DiscountKind::Percent(self.amount)
        } else {
            DiscountKind::Fixed(self.amount)
        }
    }

    /// Active and inside its (optionally open-ended) validity window
    pub fn is_redeemable_at(&self, now: NaiveDateTime) -> bool {
        self.active
            && self.code_start_date.is_none_or(|start| start <= now)
            && self.code_end_date.is_none_or(|end| now <= end)
    }
}
