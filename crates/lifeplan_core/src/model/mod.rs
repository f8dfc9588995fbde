//! Domain model for objectives and scheduled tasks.
//!
//! # Responsibility
//! - Define the objective aggregate and the flat task record.
//! - Keep local identifiers decoupled from canonical (remote) identifiers.
//!
//! # Invariants
//! - Local ids are stable for the lifetime of the entity.
//! - Canonical ids are UUID-shaped strings minted or accepted by sync.

pub mod objective;
pub mod task;
