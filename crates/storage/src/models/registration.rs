use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One player's enrollment record for a job, carrying all of its financial state.
///
/// Money columns are non-negative and kept at two decimal places. The fee engine keeps
/// `fee_total` and `owed_total` derived from the other columns; once `paid_total` is positive
/// the base and processing fees are frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Registration {
    pub registration_id: Uuid,
    pub job_id: Uuid,
    pub family_user_id: Uuid,
    pub player_user_id: Uuid,
    pub assigned_team_id: Option<Uuid>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub modified: NaiveDateTime,
    pub modified_by: Option<String>,

    pub fee_base: Decimal,
    pub fee_processing: Decimal,
    pub fee_discount: Decimal,
    pub fee_donation: Decimal,
    pub fee_late_fee: Decimal,
    pub fee_total: Decimal,
    pub paid_total: Decimal,
    pub owed_total: Decimal,

    // Profile fields writable from job forms
    pub position: Option<String>,
    pub jersey_size: Option<String>,
    pub shorts_size: Option<String>,
    pub uniform_number: Option<String>,
    pub grad_year: Option<i32>,
    pub school_name: Option<String>,
    pub school_grade: Option<String>,
    pub height_inches: Option<i32>,
    pub club_name: Option<String>,
    pub medical_notes: Option<String>,
    pub special_requests: Option<String>,
    pub waiver_accepted: Option<bool>,

    /// Optimistic concurrency token, bumped on every update
    pub version: i32,
}

impl Registration {
    pub fn new(
        job_id: Uuid,
        family_user_id: Uuid,
        player_user_id: Uuid,
        assigned_team_id: Uuid,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            registration_id: Uuid::new_v4(),
            job_id,
            family_user_id,
            player_user_id,
            assigned_team_id: Some(assigned_team_id),
            active: true,
            created_at: now,
            modified: now,
            modified_by: None,
            fee_base: Decimal::ZERO,
            fee_processing: Decimal::ZERO,
            fee_discount: Decimal::ZERO,
            fee_donation: Decimal::ZERO,
            fee_late_fee: Decimal::ZERO,
            fee_total: Decimal::ZERO,
            paid_total: Decimal::ZERO,
            owed_total: Decimal::ZERO,
            position: None,
            jersey_size: None,
            shorts_size: None,
            uniform_number: None,
            grad_year: None,
            school_name: None,
            school_grade: None,
            height_inches: None,
            club_name: None,
            medical_notes: None,
            special_requests: None,
            waiver_accepted: None,
            version: 0,
        }
    }

    /// Starts an inactive, unpaid registration for the same player on another team, carrying
    /// over the player's profile but none of the money.
    pub fn fork(&self, team_id: Uuid, now: NaiveDateTime) -> Self {
        let mut forked = Self::new(
            self.job_id,
            self.family_user_id,
            self.player_user_id,
            team_id,
            now,
        );
        forked.active = false;
        forked.position = self.position.clone();
        forked.jersey_size = self.jersey_size.clone();
        forked.shorts_size = self.shorts_size.clone();
        forked.uniform_number = self.uniform_number.clone();
        forked.grad_year = self.grad_year;
        forked.school_name = self.school_name.clone();
        forked.school_grade = self.school_grade.clone();
        forked.height_inches = self.height_inches;
        forked.club_name = self.club_name.clone();
        forked.medical_notes = self.medical_notes.clone();
        forked.special_requests = self.special_requests.clone();
        forked.waiver_accepted = self.waiver_accepted;
        forked
    }

    /// Any recorded payment locks the fee columns.
    pub fn is_paid(&self) -> bool {
        self.paid_total > Decimal::ZERO
    }

    pub fn is_assigned_to(&self, team_id: Uuid) -> bool {
        self.assigned_team_id == Some(team_id)
    }

    pub fn touch(&mut self, now: NaiveDateTime, caller: &str) {
        self.modified = now;
        self.modified_by = Some(caller.to_string());
    }
}
