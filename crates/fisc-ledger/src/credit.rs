use crate::error::{LedgerError, Result};
use crate::metrics;
use crate::storage::LedgerStore;
use crate::types::{Donation, ExchangeRate, IntegrityReport, PowerChange, PowerSource};
use chrono::Utc;
use fisc_types::{Currency, Principal, TokenAmount, VotePower};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

fn storage_err(e: anyhow::Error) -> LedgerError {
    LedgerError::StorageError(e.to_string())
}

/// Donation credit ledger: turns verified external transfers into voting
/// power at the exchange rate in force when the donation is credited.
///
/// All mutations are serialized through an internal lock and applied inside a
/// storage transaction, so a donation either credits completely (record,
/// history entry, cached totals) or leaves no trace.
pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
    /// Cached sum of all account powers; rechecked by `verify_integrity`.
    total_power: RwLock<VotePower>,
    mutation: Mutex<()>,
}

impl CreditLedger {
    pub async fn new(store: Arc<dyn LedgerStore>) -> Result<Self> {
        let mut total = VotePower::ZERO;
        for account in store.accounts().await.map_err(storage_err)? {
            let power = store.get_power(&account).await.map_err(storage_err)?;
            total = total
                .checked_add(power)
                .ok_or_else(|| LedgerError::Overflow("total voting power".to_string()))?;
        }

        Ok(Self {
            store,
            total_power: RwLock::new(total),
            mutation: Mutex::new(()),
        })
    }

    /// Credits a donation and grants voting power at the current exchange
    /// rate. Submitting the same `(currency, tx_ref)` pair again returns the
    /// original credit unchanged, no matter how rates moved in between.
    pub async fn donate(
        &self,
        donor: Principal,
        currency: Currency,
        tx_ref: &str,
        amount: TokenAmount,
    ) -> Result<Donation> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount(
                "donation amount must be positive".to_string(),
            ));
        }
        if tx_ref.trim().is_empty() {
            return Err(LedgerError::EmptyTxRef);
        }

        let _guard = self.mutation.lock().await;

        if let Some(existing) = self
            .store
            .get_donation(currency, tx_ref)
            .await
            .map_err(storage_err)?
        {
            metrics::DUPLICATE_DONATION_REPLAYS.inc();
            debug!(
                donor = %donor,
                currency = %currency,
                tx_ref = %tx_ref,
                power = %existing.power,
                "♻️ Donation already credited, replaying original"
            );
            return Ok(existing);
        }

        let rate = self
            .store
            .get_rate(currency)
            .await
            .map_err(storage_err)?
            .ok_or(LedgerError::RateUnavailable(currency))?;

        // Conversion truncates; remainders below the rate are not carried.
        let power_raw = amount
            .to_raw()
            .checked_div(rate.rate)
            .ok_or(LedgerError::RateUnavailable(currency))?;
        let power = VotePower::from_raw(power_raw);

        let current = self.store.get_power(&donor).await.map_err(storage_err)?;
        let updated = current
            .checked_add(power)
            .ok_or_else(|| LedgerError::Overflow("account voting power".to_string()))?;

        let total = *self.total_power.read().await;
        let updated_total = total
            .checked_add(power)
            .ok_or_else(|| LedgerError::Overflow("total voting power".to_string()))?;

        let donation = Donation {
            donor,
            currency,
            tx_ref: tx_ref.to_string(),
            amount,
            rate: rate.rate,
            power,
            credited_at: Utc::now().timestamp(),
        };

        self.store.begin_transaction().await.map_err(storage_err)?;

        match self.apply_donation(&donation, updated).await {
            Ok(()) => {
                self.store.commit_transaction().await.map_err(storage_err)?;
            }
            Err(e) => {
                let _ = self.store.rollback_transaction().await;
                return Err(e);
            }
        }

        *self.total_power.write().await = updated_total;

        metrics::DONATIONS_CREDITED
            .with_label_values(&[currency.code()])
            .inc();
        info!(
            donor = %donor,
            currency = %currency,
            tx_ref = %tx_ref,
            amount = %amount,
            rate = rate.rate,
            power = %power,
            power_after = %updated,
            "💰 Donation credited"
        );

        Ok(donation)
    }

    async fn apply_donation(&self, donation: &Donation, updated: VotePower) -> Result<()> {
        self.store
            .put_donation(donation.clone())
            .await
            .map_err(storage_err)?;
        self.store
            .append_power_change(
                &donation.donor,
                PowerChange {
                    source: PowerSource::Donation {
                        currency: donation.currency,
                        tx_ref: donation.tx_ref.clone(),
                    },
                    delta: donation.power.to_raw() as i128,
                    power_after: updated,
                    timestamp: donation.credited_at,
                },
            )
            .await
            .map_err(storage_err)?;
        self.store
            .set_power(&donation.donor, updated)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Sets the conversion rate for future donations in `currency`. Already
    /// credited donations keep the power they were granted.
    pub async fn update_exchange_rate(&self, currency: Currency, rate: u128) -> Result<ExchangeRate> {
        if rate == 0 {
            return Err(LedgerError::InvalidAmount(
                "exchange rate must be positive".to_string(),
            ));
        }

        let _guard = self.mutation.lock().await;

        let record = ExchangeRate {
            currency,
            rate,
            updated_at: Utc::now().timestamp(),
        };
        self.store.set_rate(record).await.map_err(storage_err)?;

        metrics::RATE_UPDATES
            .with_label_values(&[currency.code()])
            .inc();
        info!(
            currency = %currency,
            rate = rate,
            "📈 Exchange rate updated"
        );

        Ok(record)
    }

    pub async fn exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        self.store.all_rates().await.map_err(storage_err)
    }

    /// Looks up a credited donation by transaction reference alone, scanning
    /// currencies in declaration order and returning the first match.
    pub async fn donor_credit(&self, tx_ref: &str) -> Result<Option<Donation>> {
        for currency in Currency::ALL {
            if let Some(donation) = self
                .store
                .get_donation(currency, tx_ref)
                .await
                .map_err(storage_err)?
            {
                return Ok(Some(donation));
            }
        }
        Ok(None)
    }

    /// Exact lookup by the full donation key.
    pub async fn donation(&self, currency: Currency, tx_ref: &str) -> Result<Option<Donation>> {
        self.store
            .get_donation(currency, tx_ref)
            .await
            .map_err(storage_err)
    }

    pub async fn donations_for(&self, donor: &Principal) -> Result<Vec<Donation>> {
        self.store.donations_for(donor).await.map_err(storage_err)
    }

    pub async fn power_of(&self, account: &Principal) -> Result<VotePower> {
        self.store.get_power(account).await.map_err(storage_err)
    }

    pub async fn power_history(&self, account: &Principal) -> Result<Vec<PowerChange>> {
        self.store.power_history(account).await.map_err(storage_err)
    }

    /// Sum of all account powers (cached).
    pub async fn total_power(&self) -> VotePower {
        *self.total_power.read().await
    }

    pub async fn donation_count(&self) -> Result<usize> {
        self.store.donation_count().await.map_err(storage_err)
    }

    /// Applies a signed administrative correction to an account's voting
    /// power. The correction lands in the same append-only history as
    /// donation credits; it can never push an account below zero.
    pub async fn adjust_power(
        &self,
        account: Principal,
        delta: i128,
        memo: &str,
    ) -> Result<VotePower> {
        if delta == 0 {
            return Err(LedgerError::InvalidAmount(
                "adjustment delta must be non-zero".to_string(),
            ));
        }
        if memo.trim().is_empty() {
            return Err(LedgerError::InvalidAmount(
                "adjustment memo must not be empty".to_string(),
            ));
        }

        let _guard = self.mutation.lock().await;

        let current = self.store.get_power(&account).await.map_err(storage_err)?;
        let updated = current.checked_add_signed(delta).ok_or_else(|| {
            if delta < 0 {
                LedgerError::InsufficientPower {
                    account,
                    have: current,
                    need: VotePower::from_raw(delta.unsigned_abs()),
                }
            } else {
                LedgerError::Overflow("account voting power".to_string())
            }
        })?;

        let total = *self.total_power.read().await;
        let updated_total = total
            .checked_add_signed(delta)
            .ok_or_else(|| LedgerError::Overflow("total voting power".to_string()))?;

        let change = PowerChange {
            source: PowerSource::Adjustment {
                memo: memo.to_string(),
            },
            delta,
            power_after: updated,
            timestamp: Utc::now().timestamp(),
        };

        self.store.begin_transaction().await.map_err(storage_err)?;

        let applied = async {
            self.store
                .append_power_change(&account, change)
                .await
                .map_err(storage_err)?;
            self.store
                .set_power(&account, updated)
                .await
                .map_err(storage_err)
        }
        .await;

        match applied {
            Ok(()) => {
                self.store.commit_transaction().await.map_err(storage_err)?;
            }
            Err(e) => {
                let _ = self.store.rollback_transaction().await;
                return Err(e);
            }
        }

        *self.total_power.write().await = updated_total;

        metrics::POWER_ADJUSTMENTS.inc();
        info!(
            account = %account,
            delta = delta,
            power_after = %updated,
            memo = %memo,
            "⚖️ Voting power adjusted"
        );

        Ok(updated)
    }

    /// Recomputes every account's power from its append-only history and the
    /// global total from the per-account projections. Any drift is a
    /// consistency fault: the ledger refuses further reasoning about power
    /// until the fault is resolved.
    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        let _guard = self.mutation.lock().await;

        let accounts = self.store.accounts().await.map_err(storage_err)?;
        let mut sum = VotePower::ZERO;

        for account in &accounts {
            let cached = self.store.get_power(account).await.map_err(storage_err)?;
            let history = self
                .store
                .power_history(account)
                .await
                .map_err(storage_err)?;

            let recomputed: i128 = history.iter().map(|c| c.delta).sum();

            if recomputed != cached.to_raw() as i128 {
                metrics::INTEGRITY_CHECKS.with_label_values(&["fault"]).inc();
                error!(
                    account = %account,
                    cached = %cached,
                    recomputed = recomputed,
                    "🚨 Ledger integrity fault: cached power diverges from history"
                );
                return Err(LedgerError::ConsistencyFault {
                    account: *account,
                    cached,
                    recomputed,
                });
            }

            sum = sum
                .checked_add(cached)
                .ok_or_else(|| LedgerError::Overflow("total voting power".to_string()))?;
        }

        let cached_total = *self.total_power.read().await;
        if sum != cached_total {
            metrics::INTEGRITY_CHECKS.with_label_values(&["fault"]).inc();
            error!(
                cached = %cached_total,
                recomputed = %sum,
                "🚨 Ledger integrity fault: cached total diverges from accounts"
            );
            return Err(LedgerError::TotalDrift {
                cached: cached_total,
                recomputed: sum,
            });
        }

        let donations_checked = self.store.donation_count().await.map_err(storage_err)?;

        metrics::INTEGRITY_CHECKS.with_label_values(&["ok"]).inc();
        info!(
            accounts = accounts.len(),
            donations = donations_checked,
            total_power = %cached_total,
            "🔍 Ledger integrity verified"
        );

        Ok(IntegrityReport {
            accounts_checked: accounts.len(),
            donations_checked,
            total_power: cached_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    async fn test_ledger() -> CreditLedger {
        let store = Arc::new(MemoryStore::new());
        let ledger = CreditLedger::new(store).await.unwrap();
        ledger
            .update_exchange_rate(Currency::Icp, 1)
            .await
            .unwrap();
        ledger
    }

    fn donor(tag: u8) -> Principal {
        Principal::from_bytes([tag; 32])
    }

    #[tokio::test]
    async fn test_donation_grants_power_at_current_rate() {
        let ledger = test_ledger().await;
        let alice = donor(1);

        let credit = ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(100_000_000))
            .await
            .unwrap();

        assert_eq!(credit.power, VotePower::from_raw(100_000_000));
        assert_eq!(ledger.power_of(&alice).await.unwrap(), VotePower::from_raw(100_000_000));
        assert_eq!(ledger.total_power().await, VotePower::from_raw(100_000_000));
    }

    #[tokio::test]
    async fn test_duplicate_tx_ref_replays_original_credit() {
        let ledger = test_ledger().await;
        let alice = donor(1);

        let first = ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(500))
            .await
            .unwrap();

        // Rate moves between the two submissions.
        ledger
            .update_exchange_rate(Currency::Icp, 10)
            .await
            .unwrap();

        let replay = ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(500))
            .await
            .unwrap();

        assert_eq!(replay, first);
        assert_eq!(ledger.power_of(&alice).await.unwrap(), VotePower::from_raw(500));
    }

    #[tokio::test]
    async fn test_same_tx_ref_different_currency_is_distinct() {
        let ledger = test_ledger().await;
        ledger
            .update_exchange_rate(Currency::CkBtc, 2)
            .await
            .unwrap();
        let alice = donor(1);

        ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();
        ledger
            .donate(alice, Currency::CkBtc, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();

        // 100/1 + 100/2
        assert_eq!(ledger.power_of(&alice).await.unwrap(), VotePower::from_raw(150));

        // Reference-only lookup scans currencies in declaration order.
        let credit = ledger.donor_credit("tx-1").await.unwrap().unwrap();
        assert_eq!(credit.currency, Currency::Icp);
    }

    #[tokio::test]
    async fn test_rate_change_is_not_retroactive() {
        let ledger = test_ledger().await;
        let alice = donor(1);

        ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();
        ledger
            .update_exchange_rate(Currency::Icp, 50)
            .await
            .unwrap();
        ledger
            .donate(alice, Currency::Icp, "tx-2", TokenAmount::from_raw(100))
            .await
            .unwrap();

        // 100/1 + 100/50
        assert_eq!(ledger.power_of(&alice).await.unwrap(), VotePower::from_raw(102));
    }

    #[tokio::test]
    async fn test_credit_divides_amount_by_rate() {
        let ledger = test_ledger().await;
        ledger
            .update_exchange_rate(Currency::CkUsdc, 50)
            .await
            .unwrap();
        let alice = donor(1);

        let credit = ledger
            .donate(alice, Currency::CkUsdc, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();
        assert_eq!(credit.power, VotePower::from_raw(2));

        // Truncation: an amount below the rate is recorded but earns no power.
        let dust = ledger
            .donate(alice, Currency::CkUsdc, "tx-2", TokenAmount::from_raw(49))
            .await
            .unwrap();
        assert_eq!(dust.power, VotePower::ZERO);
        assert_eq!(ledger.power_of(&alice).await.unwrap(), VotePower::from_raw(2));
        assert_eq!(ledger.donation_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_donation_without_rate_is_rejected() {
        let ledger = test_ledger().await;
        let result = ledger
            .donate(donor(1), Currency::CkEth, "tx-1", TokenAmount::from_raw(100))
            .await;
        assert!(matches!(result, Err(LedgerError::RateUnavailable(Currency::CkEth))));
    }

    #[tokio::test]
    async fn test_zero_amount_and_empty_ref_rejected() {
        let ledger = test_ledger().await;

        let zero = ledger
            .donate(donor(1), Currency::Icp, "tx-1", TokenAmount::ZERO)
            .await;
        assert!(matches!(zero, Err(LedgerError::InvalidAmount(_))));

        let blank = ledger
            .donate(donor(1), Currency::Icp, "   ", TokenAmount::from_raw(10))
            .await;
        assert!(matches!(blank, Err(LedgerError::EmptyTxRef)));
    }

    #[tokio::test]
    async fn test_adjust_power_up_and_down() {
        let ledger = test_ledger().await;
        let alice = donor(1);

        ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();

        let up = ledger.adjust_power(alice, 50, "migration correction").await.unwrap();
        assert_eq!(up, VotePower::from_raw(150));

        let down = ledger.adjust_power(alice, -150, "clawback").await.unwrap();
        assert_eq!(down, VotePower::ZERO);
        assert_eq!(ledger.total_power().await, VotePower::ZERO);

        let too_far = ledger.adjust_power(alice, -1, "below zero").await;
        assert!(matches!(too_far, Err(LedgerError::InsufficientPower { .. })));
    }

    #[tokio::test]
    async fn test_integrity_sweep_passes_after_mixed_activity() {
        let ledger = test_ledger().await;

        ledger
            .donate(donor(1), Currency::Icp, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();
        ledger
            .donate(donor(2), Currency::Icp, "tx-2", TokenAmount::from_raw(200))
            .await
            .unwrap();
        ledger.adjust_power(donor(1), -30, "correction").await.unwrap();

        let report = ledger.verify_integrity().await.unwrap();
        assert_eq!(report.accounts_checked, 2);
        assert_eq!(report.donations_checked, 2);
        assert_eq!(report.total_power, VotePower::from_raw(270));
    }

    #[tokio::test]
    async fn test_integrity_sweep_detects_drift() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CreditLedger::new(store.clone()).await.unwrap();
        ledger
            .update_exchange_rate(Currency::Icp, 1)
            .await
            .unwrap();
        let alice = donor(1);

        ledger
            .donate(alice, Currency::Icp, "tx-1", TokenAmount::from_raw(100))
            .await
            .unwrap();

        // Corrupt the cached projection behind the ledger's back.
        store.set_power(&alice, VotePower::from_raw(999)).await.unwrap();

        let result = ledger.verify_integrity().await;
        assert!(matches!(result, Err(LedgerError::ConsistencyFault { .. })));
    }
}
