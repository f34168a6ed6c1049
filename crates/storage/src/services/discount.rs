use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::fee_application::FeeApplicationGuard;
use super::fee_calculator::{FeeCalculator, round_money};
use super::RegistrationSettings;
use crate::dto::discount::{ApplyDiscountResponse, DiscountAdjustment, SkippedRegistration};
use crate::error::{Result, StorageError};
use crate::models::{DiscountCode, DiscountKind, Registration};
use crate::repository::{RegistrationStore, UnitOfWork};

/// Redeems discount codes against every registration a family holds in a job.
pub struct DiscountService {
    store: Arc<dyn RegistrationStore>,
    fees: FeeApplicationGuard,
}

impl DiscountService {
    pub fn new(store: Arc<dyn RegistrationStore>, settings: RegistrationSettings) -> Self {
        Self {
            store,
            fees: FeeApplicationGuard::with_calculator(FeeCalculator::new(settings.cc_percent)),
        }
    }

    /// Applies `code` to the family's eligible registrations in one transaction. Rejected
    /// outright when the code is unusable or no registration could take it.
    pub async fn apply_code(
        &self,
        job_id: Uuid,
        family_user_id: Uuid,
        code: &str,
        caller: &str,
        now: NaiveDateTime,
    ) -> Result<ApplyDiscountResponse> {
        let mut uow = self.store.begin().await?;

        match self
            .apply_in(uow.as_mut(), job_id, family_user_id, code, caller, now)
            .await
        {
            Ok(response) => {
                uow.commit().await?;
                info!(
                    %job_id,
                    %family_user_id,
                    code = %response.code,
                    applied = response.applied.len(),
                    "Discount code redeemed"
                );
                Ok(response)
            }
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    warn!(%job_id, error = %rollback_error, "Rollback after rejected discount failed");
                }
                Err(e)
            }
        }
    }

    async fn apply_in(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: Uuid,
        family_user_id: Uuid,
        code: &str,
        caller: &str,
        now: NaiveDateTime,
    ) -> Result<ApplyDiscountResponse> {
        let discount = uow
            .find_discount_code(job_id, code)
            .await?
            .ok_or_else(|| StorageError::DiscountRejected(format!("Unknown code '{}'", code.trim())))?;

        if !discount.is_redeemable_at(now) {
            return Err(StorageError::DiscountRejected(format!(
                "Code '{}' is not currently valid",
                discount.code_name
            )));
        }

        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for mut registration in uow.registrations_for_family(job_id, family_user_id).await? {
            let amount = discount_amount(&discount, &registration);
            match self.fees.apply_discount(&mut registration, amount) {
                Ok(_) => {
                    registration.touch(now, caller);
                    uow.update_registration(&registration).await?;
                    applied.push(adjustment(&registration));
                }
                Err(refusal) => skipped.push(SkippedRegistration {
                    registration_id: registration.registration_id,
                    player_user_id: registration.player_user_id,
                    reason: refusal.to_string(),
                }),
            }
        }

        if applied.is_empty() {
            return Err(StorageError::DiscountRejected(format!(
                "No registration is eligible for code '{}'",
                discount.code_name
            )));
        }

        Ok(ApplyDiscountResponse {
            code: discount.code_name,
            applied,
            skipped,
        })
    }
}

/// The discount this code is worth on one registration, before capping at its base fee
fn discount_amount(code: &DiscountCode, registration: &Registration) -> Decimal {
    match code.kind() {
        DiscountKind::Fixed(amount) => amount,
        DiscountKind::Percent(percent) => {
            round_money(registration.fee_base * percent / Decimal::ONE_HUNDRED)
        }
    }
}

fn adjustment(registration: &Registration) -> DiscountAdjustment {
    DiscountAdjustment {
        registration_id: registration.registration_id,
        player_user_id: registration.player_user_id,
        fee_discount: registration.fee_discount,
        fee_processing: registration.fee_processing,
        fee_total: registration.fee_total,
        owed_total: registration.owed_total,
    }
}
