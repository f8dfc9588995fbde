//! Local/remote reconciliation engine.
//!
//! # Responsibility
//! - Converge the on-device objective and task stores with the remote store
//!   after the user authenticates.
//! - Resolve identity between locally minted ids and canonical remote ids.
//!
//! # Invariants
//! - The objective phase completes before the task phase starts.
//! - Network calls are issued one at a time, in list order.
//! - Entities are never deleted by reconciliation.

pub mod error;
pub mod identity;
pub mod objective_reconciler;
pub mod orchestrator;
pub mod remote;
pub mod report;
pub mod status;
pub mod task_reconciler;
pub mod wire;
