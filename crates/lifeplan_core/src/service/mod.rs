//! Core use-case services.
//!
//! # Responsibility
//! - Validate user and planner input before it reaches the local store.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod plan_service;
pub mod task_service;
