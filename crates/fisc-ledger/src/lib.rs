/*!
# Fisc Ledger

Donation credit ledger for the fisc treasury engine.

Verified external transfers are credited exactly once per
`(currency, tx_ref)` pair and converted into voting power at the exchange
rate in force at credit time. Power balances are append-only histories with
cached projections; an integrity sweep can recompute everything from the
histories and must always agree with the caches.

## Features

- **Idempotent crediting**: replaying a donation returns the original credit
- **Non-retroactive rates**: rate changes only affect future donations
- **Power corrections**: signed administrative adjustments, floored at zero
- **Transactional storage**: a donation either lands fully or not at all
*/

pub mod credit;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod types;

pub use credit::CreditLedger;
pub use error::{LedgerError, Result};
pub use storage::{LedgerStore, MemoryStore};
pub use types::{Donation, ExchangeRate, IntegrityReport, PowerChange, PowerSource};
