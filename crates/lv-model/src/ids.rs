use uuid::Uuid;

use crate::enums::ProviderName;

// Fixed namespace for deterministic provider-derived placeholder IDs.
const PROVIDER_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f2c_1df0_9a4e_4b7a_8c53_d1e8_02b9_44aa);

/// Deterministic placeholder UUID for a provider-owned identifier.
///
/// The same `(provider, entity_type, provider_id)` always hashes to the same
/// UUID, so a connector can emit stable ids before the normalizer resolves
/// the real canonical id through `provider_mappings`.
pub fn placeholder_id(provider: ProviderName, entity_type: &str, provider_id: &str) -> Uuid {
    let name = format!("{}:{}:{}", provider.as_str(), entity_type, provider_id);
    Uuid::new_v5(&PROVIDER_ID_NAMESPACE, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_ids_are_deterministic_and_namespaced() {
        let a = placeholder_id(ProviderName::Espn, "team", "359");
        let b = placeholder_id(ProviderName::Espn, "team", "359");
        assert_eq!(a, b);

        // Different provider, entity type, or id must not collide.
        assert_ne!(a, placeholder_id(ProviderName::Thesportsdb, "team", "359"));
        assert_ne!(a, placeholder_id(ProviderName::Espn, "league", "359"));
        assert_ne!(a, placeholder_id(ProviderName::Espn, "team", "360"));
    }
}
