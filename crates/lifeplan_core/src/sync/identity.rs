//! Session-scoped identity mapping.
//!
//! # Responsibility
//! - Map local identifiers to canonical identifiers for one reconciliation
//!   pass.
//! - Decide when a local identifier can double as a canonical one.
//!
//! # Invariants
//! - The mapping is a function: one local id resolves to at most one
//!   canonical id, while several local ids may share a canonical id.
//! - `register` performs no validation and overwrites unconditionally.
//! - A context lives for exactly one pass and is never persisted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use uuid::Uuid;

static CANONICAL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid canonical id regex")
});

/// Returns whether `value` already has the canonical (UUID) shape.
pub fn is_canonical_shape(value: &str) -> bool {
    CANONICAL_ID_RE.is_match(value)
}

/// Reuses `local_id` verbatim when UUID-shaped, otherwise mints a v4 UUID.
pub fn mint_canonical_id(local_id: &str) -> String {
    if is_canonical_shape(local_id) {
        local_id.to_string()
    } else {
        Uuid::new_v4().to_string()
    }
}

/// Case-folded key used for name matching. Exact equality only.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Local id -> canonical id lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityResolver {
    entries: BTreeMap<String, String>,
    /// Canonical id -> number of local ids resolving to it.
    targets: BTreeMap<String, usize>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one mapping, overwriting any previous target. Idempotent.
    pub fn register(&mut self, local_id: impl Into<String>, canonical_id: impl Into<String>) {
        let canonical_id = canonical_id.into();
        *self.targets.entry(canonical_id.clone()).or_insert(0) += 1;
        if let Some(previous) = self.entries.insert(local_id.into(), canonical_id) {
            self.release_target(&previous);
        }
    }

    pub fn resolve(&self, local_id: &str) -> Option<&str> {
        self.entries.get(local_id).map(String::as_str)
    }

    /// Whether any local id resolves to `canonical_id`.
    pub fn is_mapped_target(&self, canonical_id: &str) -> bool {
        self.targets.contains_key(canonical_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(local, canonical)| (local.as_str(), canonical.as_str()))
    }

    fn release_target(&mut self, canonical_id: &str) {
        if let Some(count) = self.targets.get_mut(canonical_id) {
            *count -= 1;
            if *count == 0 {
                self.targets.remove(canonical_id);
            }
        }
    }
}

/// State shared by the reconcilers during one pass.
#[derive(Debug, Default)]
pub struct ReconciliationContext {
    pub identities: IdentityResolver,
}

impl ReconciliationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an optional reference (pillar, ritual): mapped id first, then
    /// pass-through if already canonical, else dropped.
    pub fn resolve_reference(&self, local_id: Option<&str>) -> Option<String> {
        let local_id = local_id?;
        match self.identities.resolve(local_id) {
            Some(canonical) => Some(canonical.to_string()),
            None if is_canonical_shape(local_id) => Some(local_id.to_string()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_canonical_shape, mint_canonical_id, name_key, IdentityResolver, ReconciliationContext,
    };

    const CANONICAL: &str = "9c5b94b1-35ad-49bb-b118-8e8fc24abf80";

    #[test]
    fn canonical_shape_accepts_any_case_and_rejects_tokens() {
        assert!(is_canonical_shape(CANONICAL));
        assert!(is_canonical_shape(&CANONICAL.to_uppercase()));
        assert!(!is_canonical_shape("1712345678901"));
        assert!(!is_canonical_shape("local-9c5b94b1"));
        assert!(!is_canonical_shape(&format!(" {CANONICAL}")));
    }

    #[test]
    fn mint_reuses_canonical_ids_and_generates_otherwise() {
        assert_eq!(mint_canonical_id(CANONICAL), CANONICAL);

        let minted = mint_canonical_id("1712345678901");
        assert!(is_canonical_shape(&minted));
        assert_ne!(minted, mint_canonical_id("1712345678901"));
    }

    #[test]
    fn register_overwrites_and_is_idempotent() {
        let mut resolver = IdentityResolver::new();
        resolver.register("a", "x");
        resolver.register("a", "x");
        assert_eq!(resolver.len(), 1);

        resolver.register("a", "y");
        resolver.register("b", "y");
        assert_eq!(resolver.resolve("a"), Some("y"));
        assert_eq!(resolver.resolve("c"), None);
        assert!(resolver.is_mapped_target("y"));
        assert!(!resolver.is_mapped_target("x"));
        assert_eq!(
            resolver.iter().collect::<Vec<_>>(),
            vec![("a", "y"), ("b", "y")]
        );
    }

    #[test]
    fn targets_follow_overwrites() {
        let mut resolver = IdentityResolver::new();
        resolver.register("a", "x");
        resolver.register("b", "x");
        resolver.register("a", "y");
        assert!(resolver.is_mapped_target("x"));

        resolver.register("b", "z");
        assert!(!resolver.is_mapped_target("x"));
        assert!(resolver.is_mapped_target("y"));
        assert!(resolver.is_mapped_target("z"));

        resolver.register("z", "z");
        resolver.register("z", "z");
        resolver.register("b", "y");
        assert!(resolver.is_mapped_target("z"));
        resolver.register("z", "y");
        assert!(!resolver.is_mapped_target("z"));
    }

    #[test]
    fn name_key_folds_case_only() {
        assert_eq!(name_key("Fitness"), name_key("fITNESS"));
        assert_ne!(name_key("Fitness "), name_key("Fitness"));
    }

    #[test]
    fn reference_resolution_prefers_mapping_then_shape() {
        let mut context = ReconciliationContext::new();
        context.identities.register("p-local", CANONICAL);

        assert_eq!(
            context.resolve_reference(Some("p-local")).as_deref(),
            Some(CANONICAL)
        );
        let other = "0d7c8f3e-1111-4a2b-8c3d-4e5f60718293";
        assert_eq!(context.resolve_reference(Some(other)).as_deref(), Some(other));
        assert_eq!(context.resolve_reference(Some("unmapped")), None);
        assert_eq!(context.resolve_reference(None), None);
    }
}
