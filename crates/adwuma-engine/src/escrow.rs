//! Escrow ledger
//!
//! Owns per-task fund state. Funds are locked against a task at assignment,
//! then released to the tasker, refunded to the client, or frozen for
//! dispute review. Status transitions are monotonic:
//!
//! ```text
//! LOCKED -> RELEASED | DISPUTED | REFUNDED
//! DISPUTED -> RELEASED | REFUNDED
//! ```
//!
//! RELEASED and REFUNDED are terminal. `amount_gross` never changes after
//! lock, and on release `platform_fee + processing_fee + net == gross`
//! exactly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use adwuma_common::{EscrowError, FeeCalculator, PaymentProvider, PayoutError};

/// Escrow fund state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    Locked,
    Released,
    Disputed,
    Refunded,
}

impl EscrowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EscrowStatus::Locked => "LOCKED",
            EscrowStatus::Released => "RELEASED",
            EscrowStatus::Disputed => "DISPUTED",
            EscrowStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// A slice of a released escrow's net amount consumed by a payout request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutAllocation {
    pub task_id: Uuid,
    pub amount: Decimal,
}

/// Funds locked against a single task (1:1 with the task)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub task_id: Uuid,
    /// Gross amount locked; immutable after `lock`
    pub amount_gross: Decimal,
    /// Zero until released
    pub platform_fee: Decimal,
    /// Zero until released
    pub processing_fee: Decimal,
    /// Zero until released; payable to `tasker_id` once set
    pub net_amount: Decimal,
    pub status: EscrowStatus,
    /// Beneficiary, recorded at release
    pub tasker_id: Option<Uuid>,
    /// Portion of `net_amount` held by pending payout requests
    pub net_reserved: Decimal,
    /// Portion of `net_amount` already paid out
    pub net_paid: Decimal,
    pub locked_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscrowAccount {
    /// Net funds still available to the tasker for payout
    pub fn available_net(&self) -> Decimal {
        if self.status == EscrowStatus::Released {
            self.net_amount - self.net_reserved - self.net_paid
        } else {
            Decimal::ZERO
        }
    }

    /// Hold part of the released net for a payout request
    pub fn reserve(&mut self, amount: Decimal) -> Result<(), PayoutError> {
        if amount <= Decimal::ZERO {
            return Err(PayoutError::InvalidAmount);
        }
        if self.available_net() < amount {
            return Err(PayoutError::InsufficientBalance {
                requested: amount,
                available: self.available_net(),
            });
        }
        self.net_reserved += amount;
        Ok(())
    }

    /// Convert a reservation into a completed payout
    pub fn settle(&mut self, amount: Decimal) -> Result<(), PayoutError> {
        if amount <= Decimal::ZERO || self.net_reserved < amount {
            return Err(PayoutError::InvalidAmount);
        }
        self.net_reserved -= amount;
        self.net_paid += amount;
        Ok(())
    }

    /// Return a reservation to the available balance (failed payout)
    pub fn unreserve(&mut self, amount: Decimal) -> Result<(), PayoutError> {
        if amount <= Decimal::ZERO || self.net_reserved < amount {
            return Err(PayoutError::InvalidAmount);
        }
        self.net_reserved -= amount;
        Ok(())
    }
}

/// Validates and applies escrow state steps
///
/// The ledger is deliberately free of storage concerns: callers hand it the
/// current account (if any) and commit the returned next state atomically
/// with the task transition that triggered it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscrowLedger {
    fees: FeeCalculator,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self {
            fees: FeeCalculator::new(),
        }
    }

    /// Lock `amount` against `task_id`, creating the escrow account
    pub fn lock(
        &self,
        current: Option<&EscrowAccount>,
        task_id: Uuid,
        amount: Decimal,
    ) -> Result<EscrowAccount, EscrowError> {
        if current.is_some() {
            return Err(EscrowError::DuplicateEscrow(task_id));
        }

        let account = EscrowAccount {
            task_id,
            amount_gross: amount,
            platform_fee: Decimal::ZERO,
            processing_fee: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            status: EscrowStatus::Locked,
            tasker_id: None,
            net_reserved: Decimal::ZERO,
            net_paid: Decimal::ZERO,
            locked_at: Utc::now(),
            resolved_at: None,
        };

        info!(task_id = %task_id, amount = %amount, "Escrow locked");
        Ok(account)
    }

    /// Release the escrow to `tasker_id`, computing the fee split
    pub fn release(
        &self,
        current: Option<&EscrowAccount>,
        task_id: Uuid,
        tasker_id: Uuid,
        provider: PaymentProvider,
    ) -> Result<EscrowAccount, EscrowError> {
        let account = current.ok_or(EscrowError::NotFound(task_id))?;
        if !matches!(account.status, EscrowStatus::Locked | EscrowStatus::Disputed) {
            return Err(EscrowError::InvalidEscrowState {
                task_id,
                status: account.status.to_string(),
                operation: "release",
            });
        }

        let fees = self.fees.breakdown(account.amount_gross, provider);
        let parts = fees.platform_fee + fees.processing_fee + fees.net;
        if parts != account.amount_gross {
            return Err(EscrowError::ConservationViolated {
                task_id,
                gross: account.amount_gross,
                parts,
            });
        }

        let mut next = account.clone();
        next.platform_fee = fees.platform_fee;
        next.processing_fee = fees.processing_fee;
        next.net_amount = fees.net;
        next.status = EscrowStatus::Released;
        next.tasker_id = Some(tasker_id);
        next.resolved_at = Some(Utc::now());

        info!(
            task_id = %task_id,
            tasker_id = %tasker_id,
            gross = %next.amount_gross,
            platform_fee = %next.platform_fee,
            processing_fee = %next.processing_fee,
            net = %next.net_amount,
            "Escrow released"
        );
        Ok(next)
    }

    /// Refund the full gross to the client; no fees are taken
    pub fn refund(
        &self,
        current: Option<&EscrowAccount>,
        task_id: Uuid,
    ) -> Result<EscrowAccount, EscrowError> {
        let account = current.ok_or(EscrowError::NotFound(task_id))?;
        if !matches!(account.status, EscrowStatus::Locked | EscrowStatus::Disputed) {
            return Err(EscrowError::InvalidEscrowState {
                task_id,
                status: account.status.to_string(),
                operation: "refund",
            });
        }

        let mut next = account.clone();
        next.status = EscrowStatus::Refunded;
        next.resolved_at = Some(Utc::now());

        info!(task_id = %task_id, gross = %next.amount_gross, "Escrow refunded");
        Ok(next)
    }

    /// Freeze a locked escrow for dispute review; no funds move
    pub fn freeze(
        &self,
        current: Option<&EscrowAccount>,
        task_id: Uuid,
    ) -> Result<EscrowAccount, EscrowError> {
        let account = current.ok_or(EscrowError::NotFound(task_id))?;
        if account.status != EscrowStatus::Locked {
            return Err(EscrowError::InvalidEscrowState {
                task_id,
                status: account.status.to_string(),
                operation: "freeze",
            });
        }

        let mut next = account.clone();
        next.status = EscrowStatus::Disputed;

        info!(task_id = %task_id, "Escrow frozen for dispute");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn locked(amount: Decimal) -> EscrowAccount {
        EscrowLedger::new()
            .lock(None, Uuid::now_v7(), amount)
            .unwrap()
    }

    #[test]
    fn test_lock_rejects_duplicate() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(100));

        let result = ledger.lock(Some(&account), account.task_id, dec!(100));
        assert!(matches!(result, Err(EscrowError::DuplicateEscrow(_))));
    }

    #[test]
    fn test_release_computes_fee_split() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(150.00));
        let tasker = Uuid::now_v7();

        let released = ledger
            .release(Some(&account), account.task_id, tasker, PaymentProvider::MtnMomo)
            .unwrap();

        assert_eq!(released.status, EscrowStatus::Released);
        assert_eq!(released.platform_fee, dec!(15.00));
        assert_eq!(released.processing_fee, dec!(2.25));
        assert_eq!(released.net_amount, dec!(132.75));
        assert_eq!(released.tasker_id, Some(tasker));
        assert_eq!(released.amount_gross, account.amount_gross);
    }

    #[test]
    fn test_release_requires_locked_or_disputed() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(100));
        let released = ledger
            .release(Some(&account), account.task_id, Uuid::now_v7(), PaymentProvider::Paystack)
            .unwrap();

        // A second release must not move funds again
        let again = ledger.release(
            Some(&released),
            account.task_id,
            Uuid::now_v7(),
            PaymentProvider::Paystack,
        );
        assert!(matches!(again, Err(EscrowError::InvalidEscrowState { .. })));
    }

    #[test]
    fn test_refund_takes_no_fees() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(150.00));

        let refunded = ledger.refund(Some(&account), account.task_id).unwrap();

        assert_eq!(refunded.status, EscrowStatus::Refunded);
        assert_eq!(refunded.amount_gross, dec!(150.00));
        assert_eq!(refunded.platform_fee, Decimal::ZERO);
        assert_eq!(refunded.net_amount, Decimal::ZERO);
    }

    #[test]
    fn test_refund_after_refund_rejected() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(80));
        let refunded = ledger.refund(Some(&account), account.task_id).unwrap();

        let again = ledger.refund(Some(&refunded), account.task_id);
        assert!(matches!(again, Err(EscrowError::InvalidEscrowState { .. })));
    }

    #[test]
    fn test_freeze_then_release_or_refund() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(90));

        let frozen = ledger.freeze(Some(&account), account.task_id).unwrap();
        assert_eq!(frozen.status, EscrowStatus::Disputed);
        // No funds moved on freeze
        assert_eq!(frozen.net_amount, Decimal::ZERO);

        // Both admin resolutions remain open from DISPUTED
        assert!(ledger
            .release(Some(&frozen), account.task_id, Uuid::now_v7(), PaymentProvider::GhBank)
            .is_ok());
        assert!(ledger.refund(Some(&frozen), account.task_id).is_ok());
    }

    #[test]
    fn test_freeze_requires_locked() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(90));
        let frozen = ledger.freeze(Some(&account), account.task_id).unwrap();

        let again = ledger.freeze(Some(&frozen), account.task_id);
        assert!(matches!(again, Err(EscrowError::InvalidEscrowState { .. })));
    }

    #[test]
    fn test_reservation_accounting() {
        let ledger = EscrowLedger::new();
        let account = locked(dec!(150.00));
        let mut released = ledger
            .release(Some(&account), account.task_id, Uuid::now_v7(), PaymentProvider::MtnMomo)
            .unwrap();

        assert_eq!(released.available_net(), dec!(132.75));

        released.reserve(dec!(100)).unwrap();
        assert_eq!(released.available_net(), dec!(32.75));

        // Cannot reserve past the remaining net
        assert!(matches!(
            released.reserve(dec!(50)),
            Err(PayoutError::InsufficientBalance { .. })
        ));

        released.settle(dec!(100)).unwrap();
        assert_eq!(released.net_paid, dec!(100));
        assert_eq!(released.available_net(), dec!(32.75));

        released.reserve(dec!(32.75)).unwrap();
        released.unreserve(dec!(32.75)).unwrap();
        assert_eq!(released.available_net(), dec!(32.75));
    }

    #[test]
    fn test_locked_escrow_has_no_available_net() {
        let account = locked(dec!(100));
        assert_eq!(account.available_net(), Decimal::ZERO);
    }
}
