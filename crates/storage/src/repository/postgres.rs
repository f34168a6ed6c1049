use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RegistrationStore, UnitOfWork};
use crate::error::{Result, StorageError};
use crate::models::{AgeGroup, DiscountCode, JobConfiguration, Registration, Team};

const REGISTRATION_COLUMNS: &str = r#"
    registration_id, job_id, family_user_id, player_user_id, assigned_team_id, active,
    created_at, modified, modified_by,
    fee_base, fee_processing, fee_discount, fee_donation, fee_late_fee,
    fee_total, paid_total, owed_total,
    position, jersey_size, shorts_size, uniform_number, grad_year, school_name,
    school_grade, height_inches, club_name, medical_notes, special_requests, waiver_accepted,
    version
"#;

const TEAM_COLUMNS: &str =
    "team_id, job_id, age_group_id, name, fee_base, per_registrant_fee, max_count, active";

/// Registration store backed by PostgreSQL transactions
#[derive(Clone)]
pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    /// Create a new PgRegistrationStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RegistrationStore for PgRegistrationStore {
    /// Open a transaction-backed unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl UnitOfWork for PgUnitOfWork {
    /// Get a job's configuration by ID
    async fn job_configuration(&mut self, job_id: Uuid) -> Result<JobConfiguration> {
        let job = sqlx::query_as::<_, JobConfiguration>(
            r#"
            SELECT job_id, name, registration_mode_token, json_options, player_profile_metadata_json
            FROM jobs
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(job)
    }

    /// List all teams of a job
    async fn teams_for_job(&mut self, job_id: Uuid) -> Result<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE job_id = $1 ORDER BY name"
        ))
        .bind(job_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(teams)
    }

    /// Find team by ID
    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE team_id = $1"
        ))
        .bind(team_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(team)
    }

    /// Find age group by ID
    async fn find_age_group(&mut self, age_group_id: Uuid) -> Result<Option<AgeGroup>> {
        let age_group = sqlx::query_as::<_, AgeGroup>(
            r#"
            SELECT age_group_id, league_id, name, team_fee, roster_fee
            FROM league_age_groups
            WHERE age_group_id = $1
            "#,
        )
        .bind(age_group_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(age_group)
    }

    /// Count active registrations per team
    async fn roster_counts(&mut self, job_id: Uuid) -> Result<HashMap<Uuid, i64>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT assigned_team_id, COUNT(*)
            FROM registrations
            WHERE job_id = $1 AND active AND assigned_team_id IS NOT NULL
            GROUP BY assigned_team_id
            "#,
        )
        .bind(job_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// List every registration the given players hold in a job, newest first
    async fn registrations_for_players(
        &mut self,
        job_id: Uuid,
        player_ids: &[Uuid],
    ) -> Result<Vec<Registration>> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registrations
            WHERE job_id = $1 AND player_user_id = ANY($2)
            ORDER BY modified DESC
            "#
        ))
        .bind(job_id)
        .bind(player_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(registrations)
    }

    /// List all registrations a family holds in a job
    async fn registrations_for_family(
        &mut self,
        job_id: Uuid,
        family_user_id: Uuid,
    ) -> Result<Vec<Registration>> {
        let registrations = sqlx::query_as::<_, Registration>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM registrations
            WHERE job_id = $1 AND family_user_id = $2
            ORDER BY modified DESC
            "#
        ))
        .bind(job_id)
        .bind(family_user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(registrations)
    }

    /// Find a discount code by name, ignoring case
    async fn find_discount_code(&mut self, job_id: Uuid, code: &str) -> Result<Option<DiscountCode>> {
        let discount = sqlx::query_as::<_, DiscountCode>(
            r#"
            SELECT code_id, job_id, code_name, is_percent, amount,
                   code_start_date, code_end_date, active
            FROM discount_codes
            WHERE job_id = $1 AND lower(code_name) = lower($2)
            "#,
        )
        .bind(job_id)
        .bind(code.trim())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(discount)
    }

    /// Create a new registration
    async fn insert_registration(&mut self, r: &Registration) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO registrations ({REGISTRATION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)
            "#
        ))
        .bind(r.registration_id)
        .bind(r.job_id)
        .bind(r.family_user_id)
        .bind(r.player_user_id)
        .bind(r.assigned_team_id)
        .bind(r.active)
        .bind(r.created_at)
        .bind(r.modified)
        .bind(&r.modified_by)
        .bind(r.fee_base)
        .bind(r.fee_processing)
        .bind(r.fee_discount)
        .bind(r.fee_donation)
        .bind(r.fee_late_fee)
        .bind(r.fee_total)
        .bind(r.paid_total)
        .bind(r.owed_total)
        .bind(&r.position)
        .bind(&r.jersey_size)
        .bind(&r.shorts_size)
        .bind(&r.uniform_number)
        .bind(r.grad_year)
        .bind(&r.school_name)
        .bind(&r.school_grade)
        .bind(r.height_inches)
        .bind(&r.club_name)
        .bind(&r.medical_notes)
        .bind(&r.special_requests)
        .bind(r.waiver_accepted)
        .bind(r.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            let error = StorageError::from(e);
            if error.is_unique_violation() {
                StorageError::ConstraintViolation(format!(
                    "Registration {} already exists",
                    r.registration_id
                ))
            } else {
                error
            }
        })?;

        Ok(())
    }

    /// Update a registration, failing on a stale version
    async fn update_registration(&mut self, r: &Registration) -> Result<i32> {
        let version = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE registrations
            SET assigned_team_id = $3,
                active = $4,
                modified = $5,
                modified_by = $6,
                fee_base = $7,
                fee_processing = $8,
                fee_discount = $9,
                fee_donation = $10,
                fee_late_fee = $11,
                fee_total = $12,
                owed_total = $13,
                position = $14,
                jersey_size = $15,
                shorts_size = $16,
                uniform_number = $17,
                grad_year = $18,
                school_name = $19,
                school_grade = $20,
                height_inches = $21,
                club_name = $22,
                medical_notes = $23,
                special_requests = $24,
                waiver_accepted = $25,
                version = version + 1
            WHERE registration_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(r.registration_id)
        .bind(r.version)
        .bind(r.assigned_team_id)
        .bind(r.active)
        .bind(r.modified)
        .bind(&r.modified_by)
        .bind(r.fee_base)
        .bind(r.fee_processing)
        .bind(r.fee_discount)
        .bind(r.fee_donation)
        .bind(r.fee_late_fee)
        .bind(r.fee_total)
        .bind(r.owed_total)
        .bind(&r.position)
        .bind(&r.jersey_size)
        .bind(&r.shorts_size)
        .bind(&r.uniform_number)
        .bind(r.grad_year)
        .bind(&r.school_name)
        .bind(&r.school_grade)
        .bind(r.height_inches)
        .bind(&r.club_name)
        .bind(&r.medical_notes)
        .bind(&r.special_requests)
        .bind(r.waiver_accepted)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StorageError::Conflict {
            registration_id: r.registration_id,
        })?;

        Ok(version)
    }

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Roll back the transaction
    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
