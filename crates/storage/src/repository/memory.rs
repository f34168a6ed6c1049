use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::{RegistrationStore, UnitOfWork};
use crate::error::{Result, StorageError};
use crate::models::{AgeGroup, DiscountCode, JobConfiguration, Registration, Team};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    jobs: HashMap<Uuid, JobConfiguration>,
    teams: HashMap<Uuid, Team>,
    age_groups: HashMap<Uuid, AgeGroup>,
    registrations: HashMap<Uuid, Registration>,
    discount_codes: Vec<DiscountCode>,
}

/// Registration store kept in process memory.
///
/// Each unit of work reads from its own snapshot and publishes its writes on commit, after
/// checking that no other commit changed the same rows in the meantime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistrationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, job: JobConfiguration) {
        self.state.lock().jobs.insert(job.job_id, job);
    }

    pub fn add_team(&self, team: Team) {
        self.state.lock().teams.insert(team.team_id, team);
    }

    pub fn add_age_group(&self, age_group: AgeGroup) {
        self.state
            .lock()
            .age_groups
            .insert(age_group.age_group_id, age_group);
    }

    pub fn add_discount_code(&self, code: DiscountCode) {
        self.state.lock().discount_codes.push(code);
    }

    pub fn add_registration(&self, registration: Registration) {
        self.state
            .lock()
            .registrations
            .insert(registration.registration_id, registration);
    }

    pub fn registration(&self, registration_id: Uuid) -> Option<Registration> {
        self.state.lock().registrations.get(&registration_id).cloned()
    }

    /// Committed registrations, oldest first
    pub fn registrations(&self) -> Vec<Registration> {
        let mut registrations: Vec<Registration> =
            self.state.lock().registrations.values().cloned().collect();
        registrations.sort_by_key(|r| r.created_at);
        registrations
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let snapshot = self.state.lock().clone();
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.state),
            snapshot,
            touched: HashMap::new(),
        }))
    }
}

struct MemoryUnitOfWork {
    shared: Arc<Mutex<MemoryState>>,
    snapshot: MemoryState,
    /// Version each written row had when first touched; `None` for inserts
    touched: HashMap<Uuid, Option<i32>>,
}

#[async_trait::async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn job_configuration(&mut self, job_id: Uuid) -> Result<JobConfiguration> {
        self.snapshot
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn teams_for_job(&mut self, job_id: Uuid) -> Result<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .snapshot
            .teams
            .values()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn find_team(&mut self, team_id: Uuid) -> Result<Option<Team>> {
        Ok(self.snapshot.teams.get(&team_id).cloned())
    }

    async fn find_age_group(&mut self, age_group_id: Uuid) -> Result<Option<AgeGroup>> {
        Ok(self.snapshot.age_groups.get(&age_group_id).cloned())
    }

    async fn roster_counts(&mut self, job_id: Uuid) -> Result<HashMap<Uuid, i64>> {
        let mut counts = HashMap::new();
        for registration in self.snapshot.registrations.values() {
            if registration.job_id != job_id || !registration.active {
                continue;
            }
            if let Some(team_id) = registration.assigned_team_id {
                *counts.entry(team_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn registrations_for_players(
        &mut self,
        job_id: Uuid,
        player_ids: &[Uuid],
    ) -> Result<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .snapshot
            .registrations
            .values()
            .filter(|r| r.job_id == job_id && player_ids.contains(&r.player_user_id))
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(registrations)
    }

    async fn registrations_for_family(
        &mut self,
        job_id: Uuid,
        family_user_id: Uuid,
    ) -> Result<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .snapshot
            .registrations
            .values()
            .filter(|r| r.job_id == job_id && r.family_user_id == family_user_id)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(registrations)
    }

    async fn find_discount_code(&mut self, job_id: Uuid, code: &str) -> Result<Option<DiscountCode>> {
        let code = code.trim();
        Ok(self
            .snapshot
            .discount_codes
            .iter()
            .find(|c| c.job_id == job_id && c.code_name.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<()> {
        if self
            .snapshot
            .registrations
            .contains_key(&registration.registration_id)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "Registration {} already exists",
                registration.registration_id
            )));
        }

        self.touched.insert(registration.registration_id, None);
        self.snapshot
            .registrations
            .insert(registration.registration_id, registration.clone());
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> Result<i32> {
        let id = registration.registration_id;
        let current = self
            .snapshot
            .registrations
            .get(&id)
            .ok_or(StorageError::NotFound)?;

        if current.version != registration.version {
            return Err(StorageError::Conflict { registration_id: id });
        }

        let mut updated = registration.clone();
        // payments are recorded elsewhere; updates never carry them
        updated.paid_total = current.paid_total;
        updated.version = current.version + 1;

        self.touched.entry(id).or_insert(Some(current.version));
        self.snapshot.registrations.insert(id, updated);
        Ok(registration.version + 1)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut shared = self.shared.lock();

        for (id, base_version) in &self.touched {
            let stored = shared.registrations.get(id);
            match (base_version, stored) {
                (None, Some(_)) => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "Registration {id} already exists"
                    )));
                }
                (Some(expected), Some(stored)) if stored.version != *expected => {
                    return Err(StorageError::Conflict { registration_id: *id });
                }
                (Some(_), None) => return Err(StorageError::NotFound),
                _ => {}
            }
        }

        for id in self.touched.keys() {
            if let Some(registration) = self.snapshot.registrations.get(id) {
                shared.registrations.insert(*id, registration.clone());
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registration() -> Registration {
        Registration::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now().naive_utc(),
        )
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = InMemoryRegistrationStore::new();
        let reg = registration();

        let mut uow = store.begin().await.unwrap();
        uow.insert_registration(&reg).await.unwrap();
        assert!(store.registration(reg.registration_id).is_none());

        uow.commit().await.unwrap();
        assert!(store.registration(reg.registration_id).is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryRegistrationStore::new();
        let reg = registration();

        let mut uow = store.begin().await.unwrap();
        uow.insert_registration(&reg).await.unwrap();
        uow.rollback().await.unwrap();

        assert!(store.registrations().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_update_conflicts() {
        let store = InMemoryRegistrationStore::new();
        let reg = registration();
        store.add_registration(reg.clone());

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let mut a = reg.clone();
        a.jersey_size = Some("M".to_string());
        assert_eq!(first.update_registration(&a).await.unwrap(), 1);

        let mut b = reg.clone();
        b.jersey_size = Some("L".to_string());
        second.update_registration(&b).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let stored = store.registration(reg.registration_id).unwrap();
        assert_eq!(stored.jersey_size.as_deref(), Some("M"));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_rejected_within_unit() {
        let store = InMemoryRegistrationStore::new();
        let reg = registration();
        store.add_registration(reg.clone());

        let mut uow = store.begin().await.unwrap();
        uow.update_registration(&reg).await.unwrap();
        let err = uow.update_registration(&reg).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }
}
