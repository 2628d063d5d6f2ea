//! Idempotency key helpers
//!
//! Idempotency keys are opaque strings, globally unique, either supplied by
//! the caller or generated here as prefixed UUIDs (`uuid::Uuid::new_v4()`)
//! with a human-readable prefix so keys are greppable in logs.

use uuid::Uuid;

/// Generate an idempotency key such as `reserve_1a2b3c4d`.
pub fn generate(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Derive a deterministic, distinct key for one of several related effects
/// sharing a single caller-supplied base key (e.g. settlement's four
/// transactions: settlement, commission, refund, release all derive from
/// one base key so a retried `settle_shift` call is replay-safe end to end).
pub fn derive(base_key: &str, suffix: &str) -> String {
    format!("{base_key}:{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_keys_are_distinct_and_deterministic() {
        let a = derive("base123", "commission");
        let b = derive("base123", "settlement");
        assert_ne!(a, b);
        assert_eq!(a, derive("base123", "commission"));
    }
}
