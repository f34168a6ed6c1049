use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Team;
use crate::repository::UnitOfWork;

/// A team's fee as published by the central per-registrant listing
#[derive(Debug, Clone, PartialEq)]
pub struct PerRegistrantFee {
    pub fee: Decimal,
    pub source: String,
}

/// Authoritative source of current per-registrant team fees
#[async_trait::async_trait]
pub trait TeamFeeLookup: Send + Sync {
    async fn resolve_per_registrant(&self, team_id: Uuid) -> Result<Option<PerRegistrantFee>>;
}

/// Lookup for deployments without a central listing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCentralLookup;

#[async_trait::async_trait]
impl TeamFeeLookup for NoCentralLookup {
    async fn resolve_per_registrant(&self, _team_id: Uuid) -> Result<Option<PerRegistrantFee>> {
        Ok(None)
    }
}

/// Where a resolved base fee came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    CentralListing,
    CachedTeam,
    Team,
    AgeGroup,
    /// League fees are not modeled; resolving here means the team is free
    League,
}

/// First strictly positive value, treating zero like an unset fee
pub fn first_positive<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    values
        .into_iter()
        .flatten()
        .find(|value| *value > Decimal::ZERO)
}

fn team_fee(team: &Team) -> Option<Decimal> {
    first_positive([team.fee_base, team.per_registrant_fee])
}

/// Resolves a team's base per-registrant fee by walking central listing → team → age group
/// → league, stopping at the first positive fee.
#[derive(Clone)]
pub struct FeeResolutionCascade {
    lookup: Arc<dyn TeamFeeLookup>,
}

impl FeeResolutionCascade {
    pub fn new(lookup: Arc<dyn TeamFeeLookup>) -> Self {
        Self { lookup }
    }

    pub async fn resolve_base_fee(
        &self,
        uow: &mut dyn UnitOfWork,
        team_id: Uuid,
        cached: Option<&Team>,
    ) -> Result<Decimal> {
        let (fee, _) = self.resolve_with_source(uow, team_id, cached).await?;
        Ok(fee)
    }

    pub async fn resolve_with_source(
        &self,
        uow: &mut dyn UnitOfWork,
        team_id: Uuid,
        cached: Option<&Team>,
    ) -> Result<(Decimal, FeeSource)> {
        if let Some(listing) = self.lookup.resolve_per_registrant(team_id).await?
            && listing.fee > Decimal::ZERO
        {
            debug!(%team_id, fee = %listing.fee, source = %listing.source, "Fee from central listing");
            return Ok((listing.fee, FeeSource::CentralListing));
        }

        if let Some(fee) = cached.and_then(team_fee) {
            debug!(%team_id, %fee, "Fee from cached team row");
            return Ok((fee, FeeSource::CachedTeam));
        }

        if let Some(team) = uow.find_team(team_id).await? {
            if let Some(fee) = team_fee(&team) {
                debug!(%team_id, %fee, "Fee from team row");
                return Ok((fee, FeeSource::Team));
            }

            if let Some(age_group_id) = team.age_group_id
                && let Some(age_group) = uow.find_age_group(age_group_id).await?
                && let Some(fee) = first_positive([age_group.team_fee, age_group.roster_fee])
            {
                debug!(%team_id, %age_group_id, %fee, "Fee from age group");
                return Ok((fee, FeeSource::AgeGroup));
            }
        }

        debug!(%team_id, "No fee configured below league level, team is free");
        Ok((Decimal::ZERO, FeeSource::League))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::AgeGroup;
    use crate::repository::{InMemoryRegistrationStore, RegistrationStore};

    /// Central listing backed by a fixed map
    #[derive(Default)]
    pub(crate) struct StaticLookup(pub HashMap<Uuid, Decimal>);

    #[async_trait::async_trait]
    impl TeamFeeLookup for StaticLookup {
        async fn resolve_per_registrant(&self, team_id: Uuid) -> Result<Option<PerRegistrantFee>> {
            Ok(self.0.get(&team_id).map(|fee| PerRegistrantFee {
                fee: *fee,
                source: "listing".to_string(),
            }))
        }
    }

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn team(fee_base: Option<&str>, per_registrant: Option<&str>, age_group: Option<Uuid>) -> Team {
        Team {
            team_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            age_group_id: age_group,
            name: "U12 Blue".to_string(),
            fee_base: fee_base.map(d),
            per_registrant_fee: per_registrant.map(d),
            max_count: 0,
            active: true,
        }
    }

    fn age_group(team_fee: Option<&str>, roster_fee: Option<&str>) -> AgeGroup {
        AgeGroup {
            age_group_id: Uuid::new_v4(),
            league_id: None,
            name: "U12".to_string(),
            team_fee: team_fee.map(d),
            roster_fee: roster_fee.map(d),
        }
    }

    #[test]
    fn test_first_positive_skips_zero() {
        assert_eq!(first_positive([Some(Decimal::ZERO), None, Some(d("5"))]), Some(d("5")));
        assert_eq!(first_positive([Some(Decimal::ZERO), None]), None);
    }

    #[tokio::test]
    async fn test_central_listing_wins() {
        let store = InMemoryRegistrationStore::new();
        let t = team(Some("100"), None, None);
        store.add_team(t.clone());

        let lookup = StaticLookup(HashMap::from([(t.team_id, d("125"))]));
        let cascade = FeeResolutionCascade::new(Arc::new(lookup));
        let mut uow = store.begin().await.unwrap();

        let (fee, source) = cascade
            .resolve_with_source(uow.as_mut(), t.team_id, Some(&t))
            .await
            .unwrap();
        assert_eq!(fee, d("125"));
        assert_eq!(source, FeeSource::CentralListing);
    }

    #[tokio::test]
    async fn test_zero_listing_falls_through_to_team() {
        let store = InMemoryRegistrationStore::new();
        let t = team(None, Some("80"), None);
        store.add_team(t.clone());

        let lookup = StaticLookup(HashMap::from([(t.team_id, Decimal::ZERO)]));
        let cascade = FeeResolutionCascade::new(Arc::new(lookup));
        let mut uow = store.begin().await.unwrap();

        let (fee, source) = cascade
            .resolve_with_source(uow.as_mut(), t.team_id, None)
            .await
            .unwrap();
        assert_eq!(fee, d("80"));
        assert_eq!(source, FeeSource::Team);
    }

    #[tokio::test]
    async fn test_age_group_fallback() {
        let store = InMemoryRegistrationStore::new();
        let group = age_group(Some("50"), Some("75"));
        let t = team(Some("0"), Some("0"), Some(group.age_group_id));
        store.add_age_group(group);
        store.add_team(t.clone());

        let cascade = FeeResolutionCascade::new(Arc::new(NoCentralLookup));
        let mut uow = store.begin().await.unwrap();

        let (fee, source) = cascade
            .resolve_with_source(uow.as_mut(), t.team_id, Some(&t))
            .await
            .unwrap();
        assert_eq!(fee, d("50"));
        assert_eq!(source, FeeSource::AgeGroup);
    }

    #[tokio::test]
    async fn test_roster_fee_when_team_fee_unset() {
        let store = InMemoryRegistrationStore::new();
        let group = age_group(None, Some("75"));
        let t = team(None, None, Some(group.age_group_id));
        store.add_age_group(group);
        store.add_team(t.clone());

        let cascade = FeeResolutionCascade::new(Arc::new(NoCentralLookup));
        let mut uow = store.begin().await.unwrap();

        let fee = cascade
            .resolve_base_fee(uow.as_mut(), t.team_id, None)
            .await
            .unwrap();
        assert_eq!(fee, d("75"));
    }

    #[tokio::test]
    async fn test_unpriced_team_is_free() {
        let store = InMemoryRegistrationStore::new();
        let t = team(None, None, None);
        store.add_team(t.clone());

        let cascade = FeeResolutionCascade::new(Arc::new(NoCentralLookup));
        let mut uow = store.begin().await.unwrap();

        let (fee, source) = cascade
            .resolve_with_source(uow.as_mut(), t.team_id, Some(&t))
            .await
            .unwrap();
        assert_eq!(fee, Decimal::ZERO);
        assert_eq!(source, FeeSource::League);
    }
}
