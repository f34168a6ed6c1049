use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::services::fee_resolution::{PerRegistrantFee, TeamFeeLookup};

/// Reads the current per-registrant listing for a team
#[derive(Clone)]
pub struct PgTeamFeeLookup {
    pool: PgPool,
}

impl PgTeamFeeLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TeamFeeLookup for PgTeamFeeLookup {
    async fn resolve_per_registrant(&self, team_id: Uuid) -> Result<Option<PerRegistrantFee>> {
        let row = sqlx::query_as::<_, (Decimal, String)>(
            r#"
            SELECT fee, source
            FROM team_registrant_fees
            WHERE team_id = $1
              AND effective_from <= $2
              AND (effective_until IS NULL OR effective_until > $2)
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(Utc::now().naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(fee, source)| PerRegistrantFee { fee, source }))
    }
}
