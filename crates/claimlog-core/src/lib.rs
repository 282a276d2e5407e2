//! claimlog-core library.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module boundaries, each mapped to
//!   an [`error::ErrorCode`]; `anyhow::Result` only where a caller just needs
//!   context (config loading).
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod lock;
pub mod projection;
pub mod reconcile;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock, Timestamp};
pub use event::{ClaimEvent, ClaimStatus, NewClaimEvent};
pub use fetch::{FetchError, RemoteFetcher, Snapshot, UpdateFeed};
pub use projection::{ProjectedState, project};
pub use reconcile::{
    FullReason, PlanInput, ReconcileError, Reconciler, RunPlan, RunReport, SyncPath, plan_run,
};
pub use store::{ClaimLedger, SqliteLedger, StoreError};
