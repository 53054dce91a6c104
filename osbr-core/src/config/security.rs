//! Callback authentication configuration.

/// Shared-secret check applied to inbound sidecar callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    /// When `false` the secret is not checked at all.
    pub hardened: bool,
    pub callback_secret: Option<String>,
}

impl SecurityConfig {
    pub fn new(hardened: bool, callback_secret: Option<String>) -> Self {
        Self {
            hardened,
            callback_secret,
        }
    }

    /// Returns `true` if a caller presenting `supplied` may proceed.
    pub fn authorize(&self, supplied: Option<&str>) -> bool {
        if !self.hardened {
            return true;
        }
        match (self.callback_secret.as_deref(), supplied) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxed_mode_skips_check() {
        let config = SecurityConfig::new(false, Some("s3cret".into()));
        assert!(config.authorize(None));
        assert!(config.authorize(Some("wrong")));
    }

    #[test]
    fn test_hardened_mode_requires_match() {
        let config = SecurityConfig::new(true, Some("s3cret".into()));
        assert!(config.authorize(Some("s3cret")));
        assert!(!config.authorize(Some("wrong")));
        assert!(!config.authorize(None));
    }

    #[test]
    fn test_hardened_without_secret_rejects_everything() {
        let config = SecurityConfig::new(true, None);
        assert!(!config.authorize(Some("")));
        assert!(!config.authorize(None));
    }
}
