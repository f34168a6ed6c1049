use rust_decimal::{Decimal, RoundingStrategy};

/// Processing fee and grand total derived from a base fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTotals {
    pub processing: Decimal,
    pub total: Decimal,
}

/// Pure fee arithmetic at a fixed card-processing rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeCalculator {
    cc_percent: Decimal,
}

impl FeeCalculator {
    pub fn new(cc_percent: Decimal) -> Self {
        Self { cc_percent }
    }

    pub fn cc_percent(&self) -> Decimal {
        self.cc_percent
    }

    /// Processing is `fee_base × cc_percent / 100` unless overridden; the total is never
    /// negative.
    pub fn compute_totals(
        &self,
        fee_base: Decimal,
        fee_discount: Option<Decimal>,
        fee_donation: Option<Decimal>,
        processing_override: Option<Decimal>,
    ) -> FeeTotals {
        let processing = round_money(
            processing_override.unwrap_or_else(|| self.processing_fee(fee_base)),
        );
        let total = self.total(
            fee_base,
            processing,
            fee_discount.unwrap_or(Decimal::ZERO),
            fee_donation.unwrap_or(Decimal::ZERO),
        );

        FeeTotals { processing, total }
    }

    pub fn processing_fee(&self, amount: Decimal) -> Decimal {
        round_money(amount * self.cc_percent / Decimal::ONE_HUNDRED)
    }

    pub fn total(
        &self,
        fee_base: Decimal,
        fee_processing: Decimal,
        fee_discount: Decimal,
        fee_donation: Decimal,
    ) -> Decimal {
        non_negative(round_money(
            fee_base + fee_processing - fee_discount - fee_donation,
        ))
    }

    pub fn owed(&self, fee_total: Decimal, paid_total: Decimal) -> Decimal {
        non_negative(round_money(fee_total - paid_total))
    }
}

/// Two decimal places, half away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}
