use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fee_application::FeeApplicationGuard;
use super::fee_calculator::FeeCalculator;
use super::fee_resolution::{FeeResolutionCascade, TeamFeeLookup};
use super::field_mapper::{DynamicFieldMapper, FieldMetadataSet};
use super::form_validation::{FormValidator, PlayerFormValues};
use super::insurance::InsuranceOfferService;
use super::registration_matcher::{MultiTeamPlan, SingleTeamPlan, plan_multi_team, plan_single_team};
use super::team_capacity::RosterCounts;
use super::RegistrationSettings;
use crate::dto::registration::{
    FieldValidationError, NextTab, ReconcileRequest, ReconcileResponse, TeamResult, TeamSelection,
};
use crate::error::{Result, StorageError};
use crate::models::{Registration, RegistrationMode, Team};
use crate::repository::{RegistrationStore, UnitOfWork};

const MSG_CREATED: &str = "Registration created";
const MSG_UPDATED: &str = "Registration updated";
const MSG_MOVED: &str = "Registration moved to new team";
const MSG_FORKED: &str = "Additional registration created";
const MSG_BLOCKED: &str = "Change blocked after payment";
const MSG_FULL: &str = "Team is full";
const MSG_UNKNOWN_TEAM: &str = "Team not found for this job";
const MSG_SINGLE_TEAM_ONLY: &str = "Only one team may be selected per player for this job";

/// Everything one reconciliation call knows, loaded once and kept current as the batch is
/// processed.
struct Batch<'a> {
    job_id: Uuid,
    family_user_id: Uuid,
    caller: &'a str,
    now: NaiveDateTime,
    teams: HashMap<Uuid, Team>,
    roster: RosterCounts,
    metadata: FieldMetadataSet,
    registrations: HashMap<Uuid, Vec<Registration>>,
    results: Vec<TeamResult>,
}

impl Batch<'_> {
    fn player_registrations(&self, player_id: Uuid) -> &[Registration] {
        self.registrations
            .get(&player_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn registration(&self, player_id: Uuid, registration_id: Uuid) -> Result<Registration> {
        self.player_registrations(player_id)
            .iter()
            .find(|r| r.registration_id == registration_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn store(&mut self, registration: Registration) {
        let list = self
            .registrations
            .entry(registration.player_user_id)
            .or_default();
        match list
            .iter_mut()
            .find(|r| r.registration_id == registration.registration_id)
        {
            Some(slot) => *slot = registration,
            None => list.push(registration),
        }
    }

    fn push_result(
        &mut self,
        selection: &TeamSelection,
        message: &str,
        is_full: bool,
        saved: Option<(Uuid, bool)>,
    ) {
        let team_name = self.teams.get(&selection.team_id).map(|t| t.name.clone());
        self.results.push(TeamResult {
            player_id: selection.player_id,
            team_id: selection.team_id,
            is_full,
            team_name,
            message: message.to_string(),
            registration_created: saved.is_some_and(|(_, created)| created),
            registration_id: saved.map(|(id, _)| id),
        });
    }
}

/// What happens to an existing registration's team assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Keep,
    Move { reprice: bool },
}

struct BatchOutcome {
    results: Vec<TeamResult>,
    validation_errors: Vec<FieldValidationError>,
}

/// Turns a family's team selections into registration writes inside one unit of work.
///
/// Every write of a call is committed together, or none is: a validation failure rolls the
/// whole batch back. Full teams only reject their own selection.
pub struct ReconciliationOrchestrator {
    store: Arc<dyn RegistrationStore>,
    fees: FeeApplicationGuard,
    validator: Arc<dyn FormValidator>,
    insurance: Arc<dyn InsuranceOfferService>,
    settings: RegistrationSettings,
}

impl ReconciliationOrchestrator {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        fee_lookup: Arc<dyn TeamFeeLookup>,
        validator: Arc<dyn FormValidator>,
        insurance: Arc<dyn InsuranceOfferService>,
        settings: RegistrationSettings,
    ) -> Self {
        let fees = FeeApplicationGuard::new(
            FeeCalculator::new(settings.cc_percent),
            FeeResolutionCascade::new(fee_lookup),
        );
        Self {
            store,
            fees,
            validator,
            insurance,
            settings,
        }
    }

    pub async fn reconcile(
        &self,
        job_id: Uuid,
        request: &ReconcileRequest,
        caller: &str,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResponse> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        info!(
            %job_id,
            family_user_id = %request.family_user_id,
            selections = request.selections.len(),
            "Reconciling team selections"
        );

        let mut uow = self.store.begin().await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            outcome = self.process_batch(uow.as_mut(), job_id, request, caller) => outcome,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    warn!(%job_id, error = %rollback_error, "Rollback after failed reconciliation failed");
                }
                return Err(e);
            }
        };

        let any_full = outcome.results.iter().any(|r| r.is_full);

        if !outcome.validation_errors.is_empty() {
            uow.rollback().await?;
            info!(
                %job_id,
                errors = outcome.validation_errors.len(),
                "Form validation failed, batch rolled back"
            );

            let insurance_offer = self.insurance_snapshot(job_id, request.family_user_id).await;
            return Ok(ReconcileResponse {
                results: outcome.results,
                next_tab: if any_full { NextTab::Team } else { NextTab::Forms },
                committed: false,
                validation_errors: outcome.validation_errors,
                insurance_offer,
            });
        }

        uow.commit().await?;
        info!(%job_id, results = outcome.results.len(), "Reconciliation committed");

        let insurance_offer = self.insurance_snapshot(job_id, request.family_user_id).await;
        Ok(ReconcileResponse {
            results: outcome.results,
            next_tab: if any_full { NextTab::Team } else { NextTab::Payment },
            committed: true,
            validation_errors: Vec::new(),
            insurance_offer,
        })
    }

    async fn insurance_snapshot(&self, job_id: Uuid, family_user_id: Uuid) -> Option<Value> {
        match self.insurance.build_offer(job_id, family_user_id).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(%job_id, %family_user_id, error = %e, "Insurance offer unavailable");
                None
            }
        }
    }

    async fn process_batch(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: Uuid,
        request: &ReconcileRequest,
        caller: &str,
    ) -> Result<BatchOutcome> {
        let job = uow.job_configuration(job_id).await?;
        let mode = job.registration_mode();

        let metadata = match job.player_profile_metadata_json.as_deref() {
            Some(json) => FieldMetadataSet::parse(json).unwrap_or_else(|e| {
                warn!(%job_id, error = %e, "Unreadable field metadata, form values ignored");
                FieldMetadataSet::default()
            }),
            None => FieldMetadataSet::default(),
        };

        let teams = uow
            .teams_for_job(job_id)
            .await?
            .into_iter()
            .map(|t| (t.team_id, t))
            .collect();
        let roster = RosterCounts::new(uow.roster_counts(job_id).await?);

        let grouped = group_by_player(&request.selections);
        let player_ids: Vec<Uuid> = grouped.iter().map(|(player_id, _)| *player_id).collect();

        let mut registrations: HashMap<Uuid, Vec<Registration>> = HashMap::new();
        for registration in uow.registrations_for_players(job_id, &player_ids).await? {
            registrations
                .entry(registration.player_user_id)
                .or_default()
                .push(registration);
        }

        let mut batch = Batch {
            job_id,
            family_user_id: request.family_user_id,
            caller,
            now: Utc::now().naive_utc(),
            teams,
            roster,
            metadata,
            registrations,
            results: Vec::with_capacity(request.selections.len()),
        };

        debug!(%job_id, mode = mode.as_str(), players = player_ids.len(), "Batch context loaded");

        for (player_id, selections) in &grouped {
            match (selections.as_slice(), mode) {
                ([selection], _) => self.reconcile_single(uow, &mut batch, selection).await?,
                (selections, RegistrationMode::SingleTeam) => {
                    debug!(%player_id, teams = selections.len(), "Multiple teams rejected");
                    for selection in selections {
                        batch.push_result(selection, MSG_SINGLE_TEAM_ONLY, false, None);
                    }
                }
                (selections, RegistrationMode::MultiTeam) => {
                    self.reconcile_multi(uow, &mut batch, selections).await?
                }
            }
        }

        let players = PlayerFormValues::from_selections(&request.selections);
        let validation_errors = match self
            .validator
            .validate_player_form_values(job.player_profile_metadata_json.as_deref(), &players)
        {
            Ok(errors) => errors,
            Err(e) if self.settings.validation_fail_open => {
                warn!(%job_id, error = %e, "Form validation failed to run, saving anyway");
                Vec::new()
            }
            Err(e) => return Err(StorageError::Validation(e)),
        };

        Ok(BatchOutcome {
            results: batch.results,
            validation_errors,
        })
    }

    /// Rejects the selection when its team is unknown or full. A player already on the team
    /// keeps their place even when it is full.
    fn admit(&self, batch: &mut Batch<'_>, selection: &TeamSelection) -> Option<Team> {
        let Some(team) = batch.teams.get(&selection.team_id).cloned() else {
            batch.push_result(selection, MSG_UNKNOWN_TEAM, false, None);
            return None;
        };

        let already_on_team = batch
            .player_registrations(selection.player_id)
            .iter()
            .any(|r| r.active && r.is_assigned_to(team.team_id));

        if !already_on_team && batch.roster.is_full(&team) {
            debug!(team_id = %team.team_id, player_id = %selection.player_id, "Team full");
            batch.push_result(selection, MSG_FULL, true, None);
            return None;
        }

        Some(team)
    }

    async fn reconcile_single(
        &self,
        uow: &mut dyn UnitOfWork,
        batch: &mut Batch<'_>,
        selection: &TeamSelection,
    ) -> Result<()> {
        let Some(team) = self.admit(batch, selection) else {
            return Ok(());
        };

        let target_fee = self
            .fees
            .cascade()
            .resolve_base_fee(uow, team.team_id, Some(&team))
            .await?;
        let plan = plan_single_team(
            batch.player_registrations(selection.player_id),
            team.team_id,
            target_fee,
        );
        debug!(player_id = %selection.player_id, team_id = %team.team_id, ?plan, "Single-team plan");

        match plan {
            SingleTeamPlan::Create => {
                let id = self
                    .create_registration(uow, batch, selection, &team, target_fee, None)
                    .await?;
                batch.push_result(selection, MSG_CREATED, false, Some((id, true)));
            }
            SingleTeamPlan::UpdateInPlace(id) => {
                self.update_registration(uow, batch, selection, id, &team, Assignment::Keep, target_fee)
                    .await?;
                batch.push_result(selection, MSG_UPDATED, false, Some((id, false)));
            }
            SingleTeamPlan::Reassign(id) => {
                let assignment = Assignment::Move { reprice: true };
                self.update_registration(uow, batch, selection, id, &team, assignment, target_fee)
                    .await?;
                batch.push_result(selection, MSG_MOVED, false, Some((id, false)));
            }
            SingleTeamPlan::MovePaid(id) => {
                let assignment = Assignment::Move { reprice: false };
                self.update_registration(uow, batch, selection, id, &team, assignment, target_fee)
                    .await?;
                batch.push_result(selection, MSG_MOVED, false, Some((id, false)));
            }
            SingleTeamPlan::Blocked(id) => {
                self.update_registration(uow, batch, selection, id, &team, Assignment::Keep, target_fee)
                    .await?;
                batch.push_result(selection, MSG_BLOCKED, false, Some((id, false)));
            }
        }

        Ok(())
    }

    async fn reconcile_multi(
        &self,
        uow: &mut dyn UnitOfWork,
        batch: &mut Batch<'_>,
        selections: &[TeamSelection],
    ) -> Result<()> {
        let selected: HashSet<Uuid> = selections.iter().map(|s| s.team_id).collect();
        let mut reserved: HashSet<Uuid> = selections
            .first()
            .map(|s| batch.player_registrations(s.player_id))
            .unwrap_or(&[])
            .iter()
            .filter(|r| r.assigned_team_id.is_some_and(|t| selected.contains(&t)))
            .map(|r| r.registration_id)
            .collect();

        for selection in selections {
            let Some(team) = self.admit(batch, selection) else {
                continue;
            };

            let target_fee = self
                .fees
                .cascade()
                .resolve_base_fee(uow, team.team_id, Some(&team))
                .await?;
            let plan = plan_multi_team(
                batch.player_registrations(selection.player_id),
                team.team_id,
                &reserved,
            );
            debug!(player_id = %selection.player_id, team_id = %team.team_id, ?plan, "Multi-team plan");

            let id = match plan {
                MultiTeamPlan::UpdateInPlace(id) => {
                    self.update_registration(uow, batch, selection, id, &team, Assignment::Keep, target_fee)
                        .await?;
                    batch.push_result(selection, MSG_UPDATED, false, Some((id, false)));
                    id
                }
                MultiTeamPlan::Fork { source } => {
                    let source = batch.registration(selection.player_id, source)?;
                    let id = self
                        .create_registration(uow, batch, selection, &team, target_fee, Some(&source))
                        .await?;
                    batch.push_result(selection, MSG_FORKED, false, Some((id, true)));
                    id
                }
                MultiTeamPlan::Reassign(id) => {
                    let assignment = Assignment::Move { reprice: true };
                    self.update_registration(uow, batch, selection, id, &team, assignment, target_fee)
                        .await?;
                    batch.push_result(selection, MSG_MOVED, false, Some((id, false)));
                    id
                }
                MultiTeamPlan::Create => {
                    let id = self
                        .create_registration(uow, batch, selection, &team, target_fee, None)
                        .await?;
                    batch.push_result(selection, MSG_CREATED, false, Some((id, true)));
                    id
                }
            };
            reserved.insert(id);
        }

        Ok(())
    }

    /// Inserts a new registration, or an inactive fork of `fork_source` when given.
    async fn create_registration(
        &self,
        uow: &mut dyn UnitOfWork,
        batch: &mut Batch<'_>,
        selection: &TeamSelection,
        team: &Team,
        base_fee: Decimal,
        fork_source: Option<&Registration>,
    ) -> Result<Uuid> {
        let mut registration = match fork_source {
            Some(source) => source.fork(team.team_id, batch.now),
            None => Registration::new(
                batch.job_id,
                batch.family_user_id,
                selection.player_id,
                team.team_id,
                batch.now,
            ),
        };

        DynamicFieldMapper::new(&batch.metadata).apply(&mut registration, &selection.form_values);
        self.fees
            .apply_initial_fees(uow, &mut registration, team.team_id, Some(base_fee), None, Some(team))
            .await?;
        registration.touch(batch.now, batch.caller);

        uow.insert_registration(&registration).await?;

        if registration.active {
            batch.roster.add(team.team_id);
        }
        let id = registration.registration_id;
        batch.store(registration);
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_registration(
        &self,
        uow: &mut dyn UnitOfWork,
        batch: &mut Batch<'_>,
        selection: &TeamSelection,
        registration_id: Uuid,
        team: &Team,
        assignment: Assignment,
        base_fee: Decimal,
    ) -> Result<()> {
        let mut registration = batch.registration(selection.player_id, registration_id)?;

        if let Assignment::Move { reprice } = assignment {
            if registration.active {
                batch
                    .roster
                    .transfer(registration.assigned_team_id, team.team_id);
            }
            registration.assigned_team_id = Some(team.team_id);
            if reprice {
                self.fees.reset_fees(&mut registration);
            }
        }

        DynamicFieldMapper::new(&batch.metadata).apply(&mut registration, &selection.form_values);

        // Blocked moves are re-priced against the team the registration actually stays on
        let fee_team_id = registration.assigned_team_id.unwrap_or(team.team_id);
        let hint = (fee_team_id == team.team_id).then_some(base_fee);
        self.fees
            .apply_initial_fees(
                uow,
                &mut registration,
                fee_team_id,
                hint,
                None,
                batch.teams.get(&fee_team_id),
            )
            .await?;
        registration.touch(batch.now, batch.caller);

        registration.version = uow.update_registration(&registration).await?;
        batch.store(registration);
        Ok(())
    }
}

/// Selections grouped per player in first-seen order. Repeated picks of the same team are
/// folded into one selection, later form values winning.
fn group_by_player(selections: &[TeamSelection]) -> Vec<(Uuid, Vec<TeamSelection>)> {
    let mut grouped: Vec<(Uuid, Vec<TeamSelection>)> = Vec::new();

    for selection in selections {
        let index = match grouped.iter().position(|(p, _)| *p == selection.player_id) {
            Some(index) => index,
            None => {
                grouped.push((selection.player_id, Vec::new()));
                grouped.len() - 1
            }
        };
        let player_selections = &mut grouped[index].1;

        match player_selections
            .iter_mut()
            .find(|s| s.team_id == selection.team_id)
        {
            Some(existing) => existing.form_values.extend(selection.form_values.clone()),
            None => player_selections.push(selection.clone()),
        }
    }

    grouped
}
