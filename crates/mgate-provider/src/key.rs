use mgate_common::SecretValue;

pub type KeyId = u32;

/// A provider credential plus its static policy (§3 Key). Health fields
/// (`last_failure`, `consecutive_failures`) are NOT stored here — they're
/// mutated only by the [`crate::selector::KeySelector`], per the spec's
/// "the selector is the sole writer of health fields".
#[derive(Clone)]
pub struct Key {
    pub id: KeyId,
    pub value: SecretValue,
    pub weight: f64,
    /// Empty means all models allowed.
    pub models_allowlist: Vec<String>,
}

impl Key {
    pub fn allows_model(&self, model: &str) -> bool {
        self.models_allowlist.is_empty()
            || self.models_allowlist.iter().any(|m| m == model)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("value", &self.value)
            .field("weight", &self.weight)
            .field("models_allowlist", &self.models_allowlist)
            .finish()
    }
}
