use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::fee_calculator::{FeeCalculator, non_negative, round_money};
use super::fee_resolution::{FeeResolutionCascade, NoCentralLookup, first_positive};
use crate::error::Result;
use crate::models::{Registration, Team};
use crate::repository::UnitOfWork;

/// Why a discount was not applied to a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiscountRefusal {
    #[error("registration is already paid")]
    AlreadyPaid,
    #[error("a discount is already applied")]
    AlreadyDiscounted,
    #[error("registration has no base fee")]
    NothingToDiscount,
}

/// Writes fees onto registrations without ever touching one that has been paid.
#[derive(Clone)]
pub struct FeeApplicationGuard {
    calculator: FeeCalculator,
    cascade: FeeResolutionCascade,
}

impl FeeApplicationGuard {
    pub fn new(calculator: FeeCalculator, cascade: FeeResolutionCascade) -> Self {
        Self {
            calculator,
            cascade,
        }
    }

    /// Guard for callers that only adjust fees already on a registration and never resolve a
    /// base fee. The cascade stops at the free league default.
    pub fn with_calculator(calculator: FeeCalculator) -> Self {
        Self::new(calculator, FeeResolutionCascade::new(Arc::new(NoCentralLookup)))
    }

    pub fn calculator(&self) -> &FeeCalculator {
        &self.calculator
    }

    pub fn cascade(&self) -> &FeeResolutionCascade {
        &self.cascade
    }

    /// Resolves the base fee (hints first, then the cascade) and applies it. Returns whether
    /// the registration was written to.
    pub async fn apply_initial_fees(
        &self,
        uow: &mut dyn UnitOfWork,
        registration: &mut Registration,
        team_id: Uuid,
        fee_base_hint: Option<Decimal>,
        per_registrant_hint: Option<Decimal>,
        cached_team: Option<&Team>,
    ) -> Result<bool> {
        if registration.is_paid() {
            debug!(registration_id = %registration.registration_id, "Payment recorded, fees locked");
            return Ok(false);
        }

        let base_fee = match first_positive([fee_base_hint, per_registrant_hint]) {
            Some(fee) => fee,
            None => {
                self.cascade
                    .resolve_base_fee(uow, team_id, cached_team)
                    .await?
            }
        };

        Ok(self.apply_base_fee(registration, base_fee))
    }

    /// Sets the base fee if none is set yet, fills in processing if unset, and re-derives the
    /// total and owed amounts. No-op once a payment is recorded.
    ///
    /// Processing is recomputed whenever it is zero; applying the same base fee again yields the
    /// same columns.
    pub fn apply_base_fee(&self, registration: &mut Registration, base_fee: Decimal) -> bool {
        if registration.is_paid() {
            return false;
        }

        if base_fee > Decimal::ZERO && registration.fee_base <= Decimal::ZERO {
            registration.fee_base = round_money(base_fee);
        }

        // Processing is charged on the discounted base
        let processing = if registration.fee_processing > Decimal::ZERO {
            registration.fee_processing
        } else {
            self.calculator
                .processing_fee(non_negative(registration.fee_base - registration.fee_discount))
        };
        let totals = self.calculator.compute_totals(
            registration.fee_base,
            Some(registration.fee_discount),
            Some(registration.fee_donation),
            Some(processing),
        );

        if registration.fee_processing <= Decimal::ZERO {
            registration.fee_processing = totals.processing;
        }
        registration.fee_total = totals.total;
        registration.owed_total = self
            .calculator
            .owed(registration.fee_total, registration.paid_total);

        true
    }

    /// Clears the fee columns so the next application prices the registration afresh.
    pub fn reset_fees(&self, registration: &mut Registration) -> bool {
        if registration.is_paid() {
            return false;
        }

        registration.fee_base = Decimal::ZERO;
        registration.fee_processing = Decimal::ZERO;
        registration.fee_total = non_negative(-registration.fee_discount - registration.fee_donation);
        registration.owed_total = registration.fee_total;
        true
    }

    /// Applies a fixed discount to the base fee and shrinks the processing fee in proportion,
    /// since processing is charged on the discounted base. Returns the discount actually
    /// applied, capped at the base fee.
    pub fn apply_discount(
        &self,
        registration: &mut Registration,
        amount: Decimal,
    ) -> std::result::Result<Decimal, DiscountRefusal> {
        if registration.is_paid() {
            return Err(DiscountRefusal::AlreadyPaid);
        }
        if registration.fee_discount > Decimal::ZERO {
            return Err(DiscountRefusal::AlreadyDiscounted);
        }
        if registration.fee_base <= Decimal::ZERO {
            return Err(DiscountRefusal::NothingToDiscount);
        }

        let amount = round_money(amount.min(registration.fee_base));
        let reduction = self.calculator.processing_fee(amount);

        registration.fee_processing = non_negative(registration.fee_processing - reduction);
        registration.fee_discount = amount;
        registration.fee_total = self.calculator.total(
            registration.fee_base,
            registration.fee_processing,
            amount,
            registration.fee_donation,
        );
        registration.owed_total = self
            .calculator
            .owed(registration.fee_total, registration.paid_total);

        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::repository::{InMemoryRegistrationStore, RegistrationStore};
    use crate::services::fee_resolution::tests::StaticLookup;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn guard_with(lookup: StaticLookup) -> FeeApplicationGuard {
        FeeApplicationGuard::new(
            FeeCalculator::new(d("3.5")),
            FeeResolutionCascade::new(Arc::new(lookup)),
        )
    }

    fn guard() -> FeeApplicationGuard {
        guard_with(StaticLookup::default())
    }

    fn registration() -> Registration {
        Registration::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now().naive_utc(),
        )
    }

    fn assert_invariants(r: &Registration) {
        let expected_total = (r.fee_base + r.fee_processing - r.fee_discount - r.fee_donation)
            .max(Decimal::ZERO);
        assert_eq!(r.fee_total, expected_total);
        assert_eq!(r.owed_total, (r.fee_total - r.paid_total).max(Decimal::ZERO));
    }

    #[test]
    fn test_initial_fee_sets_base_and_processing() {
        let mut r = registration();
        assert!(guard().apply_base_fee(&mut r, d("200")));

        assert_eq!(r.fee_base, d("200"));
        assert_eq!(r.fee_processing, d("7.00"));
        assert_eq!(r.fee_total, d("207.00"));
        assert_eq!(r.owed_total, d("207.00"));
        assert_invariants(&r);
    }

    #[test]
    fn test_existing_base_fee_is_kept() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("200"));
        guard().apply_base_fee(&mut r, d("300"));

        assert_eq!(r.fee_base, d("200"));
        assert_eq!(r.fee_processing, d("7.00"));
        assert_invariants(&r);
    }

    #[test]
    fn test_donation_and_discount_reduce_total() {
        let mut r = registration();
        r.fee_donation = d("10");
        r.fee_discount = d("20");
        guard().apply_base_fee(&mut r, d("100"));

        assert_eq!(r.fee_processing, d("2.80"));
        assert_eq!(r.fee_total, d("72.80"));
        assert_invariants(&r);
    }

    #[test]
    fn test_full_discount_survives_reapplying_base_fee() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("80"));
        guard().apply_discount(&mut r, d("100")).unwrap();
        let before = r.clone();

        assert!(guard().apply_base_fee(&mut r, d("80")));

        assert_eq!(r, before);
        assert_eq!(r.fee_processing, Decimal::ZERO);
        assert_eq!(r.fee_total, Decimal::ZERO);
        assert_eq!(r.owed_total, Decimal::ZERO);
    }

    #[test]
    fn test_discount_then_reset_reprices_discounted_base() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("500"));
        guard().apply_discount(&mut r, d("100")).unwrap();

        assert!(guard().reset_fees(&mut r));
        guard().apply_base_fee(&mut r, d("300"));

        assert_eq!(r.fee_base, d("300"));
        assert_eq!(r.fee_discount, d("100"));
        assert_eq!(r.fee_processing, d("7.00"));
        assert_eq!(r.fee_total, d("207.00"));
        assert_invariants(&r);
    }

    #[test]
    fn test_calculator_only_guard_applies_discount() {
        let guard = FeeApplicationGuard::with_calculator(FeeCalculator::new(d("3.5")));
        let mut r = registration();
        guard.apply_base_fee(&mut r, d("500"));

        assert_eq!(guard.apply_discount(&mut r, d("100")), Ok(d("100")));
        assert_eq!(r.fee_total, d("414.00"));
    }

    #[test]
    fn test_payment_lock_ignores_new_fees() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("200"));
        r.paid_total = d("50");
        r.owed_total = d("157");
        let before = r.clone();

        for hint in ["300", "10", "0", "200"] {
            assert!(!guard().apply_base_fee(&mut r, d(hint)));
        }
        assert_eq!(r, before);
    }

    #[tokio::test]
    async fn test_paid_registration_never_consults_cascade() {
        let store = InMemoryRegistrationStore::new();
        let mut uow = store.begin().await.unwrap();
        let mut r = registration();
        r.fee_base = d("200");
        r.fee_processing = d("7");
        r.paid_total = d("207");
        let team_id = r.assigned_team_id.unwrap();
        let before = r.clone();

        let guard = guard_with(StaticLookup(HashMap::from([(team_id, d("999"))])));
        for hint in [Some(d("300")), Some(d("1")), None] {
            let applied = guard
                .apply_initial_fees(uow.as_mut(), &mut r, team_id, hint, None, None)
                .await
                .unwrap();
            assert!(!applied);
        }
        assert_eq!(r, before);
    }

    #[tokio::test]
    async fn test_hint_precedes_cascade() {
        let store = InMemoryRegistrationStore::new();
        let mut uow = store.begin().await.unwrap();
        let mut r = registration();
        let team_id = r.assigned_team_id.unwrap();

        let guard = guard_with(StaticLookup(HashMap::from([(team_id, d("999"))])));
        guard
            .apply_initial_fees(uow.as_mut(), &mut r, team_id, Some(Decimal::ZERO), Some(d("40")), None)
            .await
            .unwrap();
        assert_eq!(r.fee_base, d("40"));

        let mut other = registration();
        guard
            .apply_initial_fees(uow.as_mut(), &mut other, team_id, None, None, None)
            .await
            .unwrap();
        assert_eq!(other.fee_base, d("999"));
        assert_invariants(&other);
    }

    #[test]
    fn test_reset_fees_then_reprice() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("200"));
        assert!(guard().reset_fees(&mut r));
        guard().apply_base_fee(&mut r, d("300"));

        assert_eq!(r.fee_base, d("300"));
        assert_eq!(r.fee_processing, d("10.50"));
        assert_invariants(&r);
    }

    #[test]
    fn test_discount_shrinks_processing_proportionally() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("500"));
        assert_eq!(r.fee_processing, d("17.50"));
        let total_before = r.fee_total;

        let applied = guard().apply_discount(&mut r, d("100")).unwrap();

        assert_eq!(applied, d("100"));
        assert_eq!(r.fee_processing, d("14.00"));
        assert_eq!(r.fee_total, d("414.00"));
        assert_eq!(total_before - r.fee_total, d("103.50"));
        assert_eq!(r.owed_total, d("414.00"));
        assert_invariants(&r);
    }

    #[test]
    fn test_discount_capped_at_base_fee() {
        let mut r = registration();
        guard().apply_base_fee(&mut r, d("80"));

        let applied = guard().apply_discount(&mut r, d("100")).unwrap();
        assert_eq!(applied, d("80"));
        assert_eq!(r.fee_processing, Decimal::ZERO);
        assert_eq!(r.fee_total, Decimal::ZERO);
        assert_invariants(&r);
    }

    #[test]
    fn test_discount_refusals() {
        let mut paid = registration();
        guard().apply_base_fee(&mut paid, d("100"));
        paid.paid_total = d("1");
        assert_eq!(
            guard().apply_discount(&mut paid, d("10")),
            Err(DiscountRefusal::AlreadyPaid)
        );

        let mut twice = registration();
        guard().apply_base_fee(&mut twice, d("100"));
        guard().apply_discount(&mut twice, d("10")).unwrap();
        assert_eq!(
            guard().apply_discount(&mut twice, d("10")),
            Err(DiscountRefusal::AlreadyDiscounted)
        );

        let mut free = registration();
        assert_eq!(
            guard().apply_discount(&mut free, d("10")),
            Err(DiscountRefusal::NothingToDiscount)
        );
    }
}
