use serde::{Deserialize, Serialize};

/// Store-level configuration.
///
/// Controls generated document ids and how strictly test fixtures are
/// checked. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Identifier reported in logs; has no effect on storage.
    pub project_id: String,
    /// Length of ids generated by `CollectionReference::add`.
    pub auto_id_length: usize,
    /// Whether `DocumentStore::seed` rejects malformed document paths.
    /// When disabled, any path is stored as given.
    pub validate_seed_paths: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_id: "fauxstore".to_string(),
            auto_id_length: 20,
            validate_seed_paths: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"autoIdLength": 8}"#).unwrap();
        assert_eq!(config.auto_id_length, 8);
        assert_eq!(config.project_id, "fauxstore");
        assert!(config.validate_seed_paths);
    }
}
