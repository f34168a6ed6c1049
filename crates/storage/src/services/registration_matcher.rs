use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::Registration;

/// The pre-existing registration a selection should act on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistrationMatch<'a> {
    /// Already registered for the selected team
    Exact(&'a Registration),
    /// Registered elsewhere in the job; selecting a new team means moving
    MostRecent(&'a Registration),
}

impl<'a> RegistrationMatch<'a> {
    pub fn registration(&self) -> &'a Registration {
        match self {
            Self::Exact(r) | Self::MostRecent(r) => r,
        }
    }
}

/// `existing` holds one player's registrations in the job.
pub fn find_match(existing: &[Registration], team_id: Uuid) -> Option<RegistrationMatch<'_>> {
    if let Some(exact) = existing.iter().find(|r| r.is_assigned_to(team_id)) {
        return Some(RegistrationMatch::Exact(exact));
    }

    existing
        .iter()
        .max_by_key(|r| r.modified)
        .map(RegistrationMatch::MostRecent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleTeamPlan {
    Create,
    UpdateInPlace(Uuid),
    /// Unpaid registration moves to the new team and is priced again
    Reassign(Uuid),
    /// Paid registration moves because the new team costs the same
    MovePaid(Uuid),
    /// Paid registration would change price; it stays on its current team
    Blocked(Uuid),
}

/// Decides what a player's only selection in the batch does. `target_fee` is the resolved
/// base fee of the selected team.
pub fn plan_single_team(
    existing: &[Registration],
    team_id: Uuid,
    target_fee: Decimal,
) -> SingleTeamPlan {
    match find_match(existing, team_id) {
        None => SingleTeamPlan::Create,
        Some(RegistrationMatch::Exact(r)) => SingleTeamPlan::UpdateInPlace(r.registration_id),
        Some(RegistrationMatch::MostRecent(r)) if !r.is_paid() => {
            SingleTeamPlan::Reassign(r.registration_id)
        }
        Some(RegistrationMatch::MostRecent(r)) if r.fee_base == target_fee => {
            SingleTeamPlan::MovePaid(r.registration_id)
        }
        Some(RegistrationMatch::MostRecent(r)) => SingleTeamPlan::Blocked(r.registration_id),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiTeamPlan {
    UpdateInPlace(Uuid),
    /// New inactive registration beside the paid one, which stays untouched
    Fork { source: Uuid },
    Reassign(Uuid),
    Create,
}

/// Decides what one team of a multi-team selection does. `reserved` holds registrations
/// that other teams in the same batch already act on; they are never reassigned.
pub fn plan_multi_team(
    existing: &[Registration],
    team_id: Uuid,
    reserved: &HashSet<Uuid>,
) -> MultiTeamPlan {
    if let Some(exact) = existing.iter().find(|r| r.is_assigned_to(team_id)) {
        return MultiTeamPlan::UpdateInPlace(exact.registration_id);
    }

    if let Some(paid) = existing
        .iter()
        .filter(|r| r.is_paid())
        .max_by_key(|r| r.modified)
    {
        return MultiTeamPlan::Fork {
            source: paid.registration_id,
        };
    }

    existing
        .iter()
        .filter(|r| !reserved.contains(&r.registration_id))
        .max_by_key(|r| r.modified)
        .map(|r| MultiTeamPlan::Reassign(r.registration_id))
        .unwrap_or(MultiTeamPlan::Create)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, Utc};

    use super::*;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn registration(team_id: Uuid, modified: NaiveDateTime, paid: &str) -> Registration {
        let mut r = Registration::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), team_id, modified);
        r.fee_base = d("200");
        r.paid_total = d(paid);
        r
    }

    #[test]
    fn test_exact_match_preferred_over_recent() {
        let now = Utc::now().naive_utc();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let existing = vec![
            registration(t1, now - Duration::days(3), "0"),
            registration(t2, now, "0"),
        ];

        let found = find_match(&existing, t1).unwrap();
        assert!(matches!(found, RegistrationMatch::Exact(_)));
        assert_eq!(found.registration().assigned_team_id, Some(t1));
    }

    #[test]
    fn test_most_recent_when_no_exact() {
        let now = Utc::now().naive_utc();
        let existing = vec![
            registration(Uuid::new_v4(), now - Duration::days(3), "0"),
            registration(Uuid::new_v4(), now, "0"),
        ];

        let found = find_match(&existing, Uuid::new_v4()).unwrap();
        assert!(matches!(found, RegistrationMatch::MostRecent(_)));
        assert_eq!(found.registration().registration_id, existing[1].registration_id);
        assert!(find_match(&[], Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_single_team_plans() {
        let now = Utc::now().naive_utc();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        assert_eq!(plan_single_team(&[], t1, d("200")), SingleTeamPlan::Create);

        let unpaid = vec![registration(t1, now, "0")];
        let id = unpaid[0].registration_id;
        assert_eq!(plan_single_team(&unpaid, t1, d("300")), SingleTeamPlan::UpdateInPlace(id));
        assert_eq!(plan_single_team(&unpaid, t2, d("300")), SingleTeamPlan::Reassign(id));

        let paid = vec![registration(t1, now, "207")];
        let id = paid[0].registration_id;
        assert_eq!(plan_single_team(&paid, t1, d("300")), SingleTeamPlan::UpdateInPlace(id));
        assert_eq!(plan_single_team(&paid, t2, d("200")), SingleTeamPlan::MovePaid(id));
        assert_eq!(plan_single_team(&paid, t2, d("300")), SingleTeamPlan::Blocked(id));
    }

    #[test]
    fn test_multi_team_plans() {
        let now = Utc::now().naive_utc();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let none = HashSet::new();

        assert_eq!(plan_multi_team(&[], t1, &none), MultiTeamPlan::Create);

        let paid = vec![registration(t1, now, "207")];
        assert_eq!(
            plan_multi_team(&paid, t2, &none),
            MultiTeamPlan::Fork { source: paid[0].registration_id }
        );
        assert_eq!(
            plan_multi_team(&paid, t1, &none),
            MultiTeamPlan::UpdateInPlace(paid[0].registration_id)
        );

        let unpaid = vec![registration(t1, now, "0")];
        let id = unpaid[0].registration_id;
        assert_eq!(plan_multi_team(&unpaid, t2, &none), MultiTeamPlan::Reassign(id));
        assert_eq!(
            plan_multi_team(&unpaid, t2, &HashSet::from([id])),
            MultiTeamPlan::Create
        );
    }
}
