use crate::types::{Donation, ExchangeRate, PowerChange};
use anyhow::Result;
use async_trait::async_trait;
use fisc_types::{Currency, Principal, VotePower};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

// Type aliases for complex types
type DonationMap = HashMap<(Currency, String), Donation>;
type PowerMap = HashMap<Principal, VotePower>;
type HistoryMap = HashMap<Principal, Vec<PowerChange>>;
type TransactionBackup = Option<(DonationMap, PowerMap, HistoryMap)>;

/// Persistence surface for the credit ledger. Donation records and power
/// histories are append-only; `set_power` only ever writes the cached
/// projection derived from them.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_donation(&self, currency: Currency, tx_ref: &str) -> Result<Option<Donation>>;
    async fn put_donation(&self, donation: Donation) -> Result<()>;
    async fn donations_for(&self, donor: &Principal) -> Result<Vec<Donation>>;
    async fn donation_count(&self) -> Result<usize>;

    async fn get_power(&self, account: &Principal) -> Result<VotePower>;
    async fn set_power(&self, account: &Principal, power: VotePower) -> Result<()>;
    async fn append_power_change(&self, account: &Principal, change: PowerChange) -> Result<()>;
    async fn power_history(&self, account: &Principal) -> Result<Vec<PowerChange>>;
    async fn accounts(&self) -> Result<Vec<Principal>>;

    async fn get_rate(&self, currency: Currency) -> Result<Option<ExchangeRate>>;
    async fn set_rate(&self, rate: ExchangeRate) -> Result<()>;
    async fn all_rates(&self) -> Result<Vec<ExchangeRate>>;

    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;
}

pub struct MemoryStore {
    donations: Arc<RwLock<DonationMap>>,
    powers: Arc<RwLock<PowerMap>>,
    histories: Arc<RwLock<HistoryMap>>,
    rates: Arc<RwLock<HashMap<Currency, ExchangeRate>>>,
    transaction_backup: Arc<RwLock<TransactionBackup>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            donations: Arc::new(RwLock::new(HashMap::new())),
            powers: Arc::new(RwLock::new(HashMap::new())),
            histories: Arc::new(RwLock::new(HashMap::new())),
            rates: Arc::new(RwLock::new(HashMap::new())),
            transaction_backup: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_donation(&self, currency: Currency, tx_ref: &str) -> Result<Option<Donation>> {
        let donations = self.donations.read().await;
        Ok(donations.get(&(currency, tx_ref.to_string())).cloned())
    }

    async fn put_donation(&self, donation: Donation) -> Result<()> {
        let mut donations = self.donations.write().await;
        let count_before = donations.len();

        info!(
            donor = %donation.donor,
            currency = %donation.currency,
            tx_ref = %donation.tx_ref,
            amount = %donation.amount,
            power = %donation.power,
            count_before = count_before,
            count_after = count_before + 1,
            storage_type = "memory",
            "📦 Donation recorded"
        );

        donations.insert(
            (donation.currency, donation.tx_ref.clone()),
            donation,
        );
        Ok(())
    }

    async fn donations_for(&self, donor: &Principal) -> Result<Vec<Donation>> {
        let donations = self.donations.read().await;
        let mut found: Vec<Donation> = donations
            .values()
            .filter(|d| d.donor == *donor)
            .cloned()
            .collect();
        found.sort_by_key(|d| d.credited_at);
        Ok(found)
    }

    async fn donation_count(&self) -> Result<usize> {
        let donations = self.donations.read().await;
        Ok(donations.len())
    }

    async fn get_power(&self, account: &Principal) -> Result<VotePower> {
        let powers = self.powers.read().await;
        Ok(powers.get(account).copied().unwrap_or(VotePower::ZERO))
    }

    async fn set_power(&self, account: &Principal, power: VotePower) -> Result<()> {
        let mut powers = self.powers.write().await;
        let old_power = powers.get(account).copied().unwrap_or(VotePower::ZERO);

        powers.insert(*account, power);

        if old_power != power {
            info!(
                account = %account,
                power_before = %old_power,
                power_after = %power,
                storage_type = "memory",
                "💾 Voting power stored"
            );
        }
        Ok(())
    }

    async fn append_power_change(&self, account: &Principal, change: PowerChange) -> Result<()> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(*account).or_default();

        debug!(
            account = %account,
            delta = change.delta,
            entries_before = history.len(),
            storage_type = "memory",
            "📜 Power change appended"
        );

        history.push(change);
        Ok(())
    }

    async fn power_history(&self, account: &Principal) -> Result<Vec<PowerChange>> {
        let histories = self.histories.read().await;
        Ok(histories.get(account).cloned().unwrap_or_default())
    }

    async fn accounts(&self) -> Result<Vec<Principal>> {
        let powers = self.powers.read().await;
        let histories = self.histories.read().await;

        let mut accounts: Vec<Principal> = powers.keys().copied().collect();
        for account in histories.keys() {
            if !powers.contains_key(account) {
                accounts.push(*account);
            }
        }

        Ok(accounts)
    }

    async fn get_rate(&self, currency: Currency) -> Result<Option<ExchangeRate>> {
        let rates = self.rates.read().await;
        Ok(rates.get(&currency).copied())
    }

    async fn set_rate(&self, rate: ExchangeRate) -> Result<()> {
        let mut rates = self.rates.write().await;
        let old_rate = rates.insert(rate.currency, rate);

        info!(
            currency = %rate.currency,
            rate_before = old_rate.map(|r| r.rate),
            rate_after = rate.rate,
            storage_type = "memory",
            "💱 Exchange rate stored"
        );
        Ok(())
    }

    async fn all_rates(&self) -> Result<Vec<ExchangeRate>> {
        let rates = self.rates.read().await;
        let mut all: Vec<ExchangeRate> = rates.values().copied().collect();
        all.sort_by_key(|r| r.currency.code());
        Ok(all)
    }

    async fn begin_transaction(&self) -> Result<()> {
        let donations = self.donations.read().await;
        let powers = self.powers.read().await;
        let histories = self.histories.read().await;

        let mut backup = self.transaction_backup.write().await;
        *backup = Some((donations.clone(), powers.clone(), histories.clone()));

        info!(
            donations_count = donations.len(),
            accounts_count = powers.len(),
            storage_type = "memory",
            "📝 Transaction began (snapshot created)"
        );
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        let had_backup = backup.is_some();
        *backup = None;

        if had_backup {
            info!(
                storage_type = "memory",
                "✅ Transaction committed (snapshot discarded)"
            );
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;

        if let Some((donation_backup, power_backup, history_backup)) = backup.take() {
            let mut donations = self.donations.write().await;
            let mut powers = self.powers.write().await;
            let mut histories = self.histories.write().await;

            let donations_before = donations.len();

            *donations = donation_backup;
            *powers = power_backup;
            *histories = history_backup;

            info!(
                donations_before = donations_before,
                donations_after = donations.len(),
                storage_type = "memory",
                "❌ Transaction rolled back (snapshot restored)"
            );
        }

        Ok(())
    }
}
