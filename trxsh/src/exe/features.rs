//! Host feature checks for `requires` lists

use trx_config::FeatureConfig;

/// Whether the host provides a named feature. Unknown names are unavailable.
pub fn is_feature_available(name: &str, features: &FeatureConfig) -> bool {
    match name {
        "network" => features.network,
        "clipboard" => features.clipboard,
        "storage" => features.storage,
        _ => false,
    }
}

/// Requirements the host cannot satisfy, in declaration order.
pub fn missing_features<'a>(requires: &'a [String], features: &FeatureConfig) -> Vec<&'a str> {
    requires
        .iter()
        .map(String::as_str)
        .filter(|name| !is_feature_available(name, features))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_checks() {
        let features = FeatureConfig {
            network: true,
            clipboard: false,
            storage: true,
        };
        assert!(is_feature_available("network", &features));
        assert!(!is_feature_available("clipboard", &features));
        assert!(!is_feature_available("gpu", &features));
    }

    #[test]
    fn test_missing_keeps_order() {
        let features = FeatureConfig::default();
        let requires = vec!["gpu".to_string(), "network".to_string(), "clipboard".to_string()];
        assert_eq!(missing_features(&requires, &features), vec!["gpu", "clipboard"]);
    }
}
