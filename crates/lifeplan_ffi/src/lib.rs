//! Flutter-facing bindings for the LifePlan core.

pub mod api;
