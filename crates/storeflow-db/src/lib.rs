//! SQLite persistence for Storeflow.
//!
//! Everything stateful lives here: the connection pool ([`pool`]), embedded
//! schema migrations ([`migrations`]), and one repository per aggregate
//! ([`repository`]). Repositories own the transaction boundaries; a document
//! operation (receive a purchase, complete a sale, close a session) is one
//! SQLite transaction that either fully applies or leaves no trace.
//!
//! ```rust,ignore
//! use storeflow_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./storeflow.db")).await?;
//! let on_hand = db.ledger().quantity(&product_id, &warehouse_id).await?;
//! ```
//!
//! The business math itself lives in `storeflow-core`; this crate only
//! loads state, calls into it, and persists the result.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cash_register::CashRegisterRepository;
pub use repository::discount::DiscountRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
pub use repository::settings::SettingsRepository;
