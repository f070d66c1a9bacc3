//! Pure business logic for Storeflow: stock ledger math, cash session
//! reconciliation, and discount resolution.
//!
//! Nothing in this crate performs I/O. Every function is deterministic over
//! its arguments (clock readings are passed in as `as_of`), which is what
//! lets the same math run identically in unit tests and behind the database
//! layer:
//!
//! ```text
//!          document services (storeflow-db repositories)
//!                             │
//!        ┌──────────┬─────────┴──────────┬───────────┐
//!        ▼          ▼                    ▼           ▼
//!     ledger     session             discount    validation
//!   delta math  cash totals       best-of picker  input checks
//!        └──────────┴───── types / money ┴───────────┘
//! ```
//!
//! Monetary values are integer cents ([`Money`]); quantities are whole-unit
//! `i64`. Errors are typed enums, never strings or panics.

pub mod discount;
pub mod error;
pub mod ledger;
pub mod money;
pub mod session;
pub mod types;
pub mod validation;

pub use discount::ResolvedDiscount;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use session::SessionSummary;
pub use types::*;

/// Well-known tenant id for single-tenant deployments. The schema is
/// multi-tenant throughout; installations serving one organization use this
/// id instead of provisioning tenants.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Upper bound on line items per purchase or sale document.
pub const MAX_DOCUMENT_ITEMS: usize = 500;
