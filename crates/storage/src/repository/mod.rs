use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{AgeGroup, DiscountCode, JobConfiguration, Registration, Team};

pub mod memory;
pub mod postgres;
pub mod team_fee;

pub use memory::InMemoryRegistrationStore;
pub use postgres::{PgRegistrationStore, PgUnitOfWork};
pub use team_fee::PgTeamFeeLookup;

/// One open transaction against the registration tables.
///
/// `commit` and `rollback` consume the unit of work, so exactly one of them ends it. Dropping
/// it without either discards every pending write.
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    async fn job_configuration(&mut self, job_id: Uuid) -> Result<JobConfiguration>;

    async fn teams_for_job(&mut self, job_id: Uuid) -> Result<Vec<Team>>;

    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>>;

    async fn find_age_group(&mut self, age_group_id: Uuid) -> Result<Option<AgeGroup>>;

    /// Active registrations per assigned team
    async fn roster_counts(&mut self, job_id: Uuid) -> Result<HashMap<Uuid, i64>>;

    async fn registrations_for_players(
        &mut self,
        job_id: Uuid,
        player_ids: &[Uuid],
    ) -> Result<Vec<Registration>>;

    async fn registrations_for_family(
        &mut self,
        job_id: Uuid,
        family_user_id: Uuid,
    ) -> Result<Vec<Registration>>;

    async fn find_discount_code(&mut self, job_id: Uuid, code: &str) -> Result<Option<DiscountCode>>;

    async fn insert_registration(&mut self, registration: &Registration) -> Result<()>;

    /// Writes the row if its stored version still equals `registration.version`, returning
    /// the version it now has. A mismatch is `StorageError::Conflict`.
    async fn update_registration(&mut self, registration: &Registration) -> Result<i32>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}
