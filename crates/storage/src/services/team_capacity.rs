use std::collections::HashMap;

use uuid::Uuid;

use crate::models::Team;

pub fn is_full(team: &Team, current_roster_count: i64) -> bool {
    team.max_count > 0 && current_roster_count >= i64::from(team.max_count)
}

/// Active roster counts taken once at the start of a batch and kept current as the batch
/// places players, so every decision in one transaction sees the same numbers.
#[derive(Debug, Clone, Default)]
pub struct RosterCounts {
    counts: HashMap<Uuid, i64>,
}

impl RosterCounts {
    pub fn new(counts: HashMap<Uuid, i64>) -> Self {
        Self { counts }
    }

    pub fn count(&self, team_id: Uuid) -> i64 {
        self.counts.get(&team_id).copied().unwrap_or(0)
    }

    pub fn is_full(&self, team: &Team) -> bool {
        is_full(team, self.count(team.team_id))
    }

    pub fn add(&mut self, team_id: Uuid) {
        *self.counts.entry(team_id).or_insert(0) += 1;
    }

    pub fn remove(&mut self, team_id: Uuid) {
        if let Some(count) = self.counts.get_mut(&team_id) {
            *count = (*count - 1).max(0);
        }
    }

    pub fn transfer(&mut self, from: Option<Uuid>, to: Uuid) {
        if from == Some(to) {
            return;
        }
        if let Some(from) = from {
            self.remove(from);
        }
        self.add(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(max_count: i32) -> Team {
        Team {
            team_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            age_group_id: None,
            name: "U14 Red".to_string(),
            fee_base: None,
            per_registrant_fee: None,
            max_count,
            active: true,
        }
    }

    #[test]
    fn test_unlimited_team_never_full() {
        assert!(!is_full(&team(0), 0));
        assert!(!is_full(&team(0), 10_000));
    }

    #[test]
    fn test_full_at_max_count() {
        let t = team(2);
        assert!(!is_full(&t, 1));
        assert!(is_full(&t, 2));
        assert!(is_full(&t, 3));
    }

    #[test]
    fn test_roster_counts_track_moves() {
        let a = team(1);
        let b = team(1);
        let mut counts = RosterCounts::new(HashMap::from([(a.team_id, 1)]));
        assert!(counts.is_full(&a));
        assert!(!counts.is_full(&b));

        counts.transfer(Some(a.team_id), b.team_id);
        assert!(!counts.is_full(&a));
        assert!(counts.is_full(&b));

        counts.transfer(Some(b.team_id), b.team_id);
        assert_eq!(counts.count(b.team_id), 1);
    }
}
