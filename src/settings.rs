use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthsyncSettings {
    pub intents: IntentSettings,
    pub stabilization: StabilizationSettings,
    pub provider: ProviderSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    /// Prefix for the durable intent keys (`<prefix>.popup_pending`, ...)
    pub key_prefix: String,
    /// Age after which a redirect intent is abandoned
    pub redirect_max_age_ms: u64,
    /// Age after which a popup intent is abandoned
    pub popup_max_age_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationSettings {
    /// Interval between identity checks while waiting for session restoration
    pub poll_interval_ms: u64,
    /// Wait budget when a redirect was known to be pending
    pub pending_redirect_wait_ms: u64,
    /// Wait budget on a cold start with no expected flow
    pub cold_start_wait_ms: u64,
    /// Budget for the reconciler's last-moment re-check
    pub recheck_wait_ms: u64,
    /// Budget for the startup sequence's definitive "is anyone signed in" check
    pub startup_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider the sign-in flows target
    pub provider_id: String,
    /// Treat any non-anonymous identity as signed in, whatever provider it carries
    pub accept_any_linked_identity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON document used by the file-backed intent store
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            key_prefix: "authsync".to_string(),
            redirect_max_age_ms: 5 * 60 * 1000,
            popup_max_age_ms: 30 * 1000,
        }
    }
}

impl Default for StabilizationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            pending_redirect_wait_ms: 3000,
            cold_start_wait_ms: 1000,
            recheck_wait_ms: 500,
            startup_wait_ms: 1000,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_id: "google.com".to_string(),
            accept_any_linked_identity: true,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "authsync-intents.json".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StabilizationSettings {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the polling loop
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Reconciliation wait budget, longer when a redirect is known pending
    #[must_use]
    pub fn reconcile_wait(&self, redirect_pending: bool) -> Duration {
        if redirect_pending {
            Duration::from_millis(self.pending_redirect_wait_ms)
        } else {
            Duration::from_millis(self.cold_start_wait_ms)
        }
    }

    #[must_use]
    pub fn recheck_wait(&self) -> Duration {
        Duration::from_millis(self.recheck_wait_ms)
    }

    #[must_use]
    pub fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.startup_wait_ms)
    }
}

impl AuthsyncSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::initialize_environment()?;

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Load the `.env` file and initialize the logger
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `AUTHSYNC_CONFIG_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            log::info!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(config_dir) = std::env::var("AUTHSYNC_CONFIG_DIR") {
            let config_path = std::path::Path::new(&config_dir).join("Settings.toml");
            if config_path.exists() {
                settings = Self::from_toml_file(&config_path)?;
                log::info!("✓ Overriding settings from {}", config_path.display());
            } else {
                log::info!(
                    "ℹ AUTHSYNC_CONFIG_DIR set but no Settings.toml found at: {}",
                    config_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a settings file; missing sections and fields fall back to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_intent_env_overrides(&mut settings.intents);
        Self::apply_stabilization_env_overrides(&mut settings.stabilization);
        Self::apply_provider_env_overrides(&mut settings.provider);
        Self::apply_storage_env_overrides(&mut settings.storage);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_intent_env_overrides(intent_settings: &mut IntentSettings) {
        if let Ok(prefix) = std::env::var("AUTHSYNC_KEY_PREFIX") {
            if !prefix.is_empty() {
                intent_settings.key_prefix = prefix;
            }
        }
        Self::apply_numeric_env_override(
            "AUTHSYNC_REDIRECT_MAX_AGE_MS",
            &mut intent_settings.redirect_max_age_ms,
        );
        Self::apply_numeric_env_override(
            "AUTHSYNC_POPUP_MAX_AGE_MS",
            &mut intent_settings.popup_max_age_ms,
        );
    }

    fn apply_stabilization_env_overrides(stabilization: &mut StabilizationSettings) {
        Self::apply_numeric_env_override(
            "AUTHSYNC_POLL_INTERVAL_MS",
            &mut stabilization.poll_interval_ms,
        );
    }

    fn apply_provider_env_overrides(provider_settings: &mut ProviderSettings) {
        if let Ok(provider_id) = std::env::var("AUTHSYNC_PROVIDER_ID") {
            if !provider_id.is_empty() {
                provider_settings.provider_id = provider_id;
            }
        }
        if let Ok(accept_any) = std::env::var("AUTHSYNC_ACCEPT_ANY_LINKED") {
            if let Ok(accept_any) = accept_any.parse::<bool>() {
                provider_settings.accept_any_linked_identity = accept_any;
            }
        }
    }

    fn apply_storage_env_overrides(storage_settings: &mut StorageSettings) {
        if let Ok(path) = std::env::var("AUTHSYNC_STORAGE_PATH") {
            storage_settings.path = path;
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env_vars() {
        for var in [
            "AUTHSYNC_KEY_PREFIX",
            "AUTHSYNC_REDIRECT_MAX_AGE_MS",
            "AUTHSYNC_POPUP_MAX_AGE_MS",
            "AUTHSYNC_POLL_INTERVAL_MS",
            "AUTHSYNC_PROVIDER_ID",
            "AUTHSYNC_ACCEPT_ANY_LINKED",
            "AUTHSYNC_STORAGE_PATH",
            "AUTHSYNC_CONFIG_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_budgets() {
        let settings = AuthsyncSettings::default();
        assert_eq!(settings.intents.redirect_max_age_ms, 300_000);
        assert_eq!(settings.intents.popup_max_age_ms, 30_000);
        assert_eq!(settings.stabilization.poll_interval(), Duration::from_millis(100));
        assert_eq!(
            settings.stabilization.reconcile_wait(true),
            Duration::from_millis(3000)
        );
        assert_eq!(
            settings.stabilization.reconcile_wait(false),
            Duration::from_millis(1000)
        );
        assert_eq!(settings.provider.provider_id, "google.com");
        assert!(settings.provider.accept_any_linked_identity);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let stabilization = StabilizationSettings {
            poll_interval_ms: 0,
            ..StabilizationSettings::default()
        };
        assert_eq!(stabilization.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();

        std::env::set_var("AUTHSYNC_PROVIDER_ID", "github.com");
        std::env::set_var("AUTHSYNC_ACCEPT_ANY_LINKED", "false");
        std::env::set_var("AUTHSYNC_REDIRECT_MAX_AGE_MS", "60000");
        std::env::set_var("AUTHSYNC_STORAGE_PATH", "/tmp/intents.json");

        let mut settings = AuthsyncSettings::default();
        AuthsyncSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.provider.provider_id, "github.com");
        assert!(!settings.provider.accept_any_linked_identity);
        assert_eq!(settings.intents.redirect_max_age_ms, 60_000);
        assert_eq!(settings.intents.popup_max_age_ms, 30_000); // Should remain unchanged
        assert_eq!(settings.storage.path, "/tmp/intents.json");

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_unparseable_env_values_are_ignored() {
        clean_env_vars();

        std::env::set_var("AUTHSYNC_POPUP_MAX_AGE_MS", "thirty seconds");
        std::env::set_var("AUTHSYNC_ACCEPT_ANY_LINKED", "maybe");
        std::env::set_var("AUTHSYNC_PROVIDER_ID", "");

        let mut settings = AuthsyncSettings::default();
        AuthsyncSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.intents.popup_max_age_ms, 30_000);
        assert!(settings.provider.accept_any_linked_identity);
        assert_eq!(settings.provider.provider_id, "google.com");

        clean_env_vars();
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Settings.toml");
        std::fs::write(
            &path,
            "[intents]\nkey_prefix = \"game\"\n\n[stabilization]\npending_redirect_wait_ms = 5000\n",
        )
        .unwrap();

        let settings = AuthsyncSettings::from_toml_file(&path).unwrap();
        assert_eq!(settings.intents.key_prefix, "game");
        assert_eq!(settings.intents.redirect_max_age_ms, 300_000);
        assert_eq!(settings.stabilization.pending_redirect_wait_ms, 5000);
        assert_eq!(settings.stabilization.poll_interval_ms, 100);
        assert_eq!(settings.provider.provider_id, "google.com");
    }
}
