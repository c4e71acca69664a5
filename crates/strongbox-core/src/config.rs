//! Bootstrap configuration for Strongbox.
//!
//! Everything here is read once, at process startup, before the metadata
//! store exists. Settings that can change at runtime without a restart
//! (region, CORS origin, size limits, presign scheme, admin credentials)
//! live in the metadata store's `settings` table instead — see
//! `strongbox_metadata::settings`.

/// Bootstrap configuration for the Strongbox server process.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrongboxConfig {
    /// Bind address for the HTTP listener.
    pub listen: String,
    /// Directory under which bucket data and the metadata database live.
    pub data_dir: String,
    /// Log level passed to `tracing_subscriber::EnvFilter` when `RUST_LOG`
    /// is unset.
    pub log_level: String,
    /// Path to the SQLite metadata database file, relative to `data_dir`
    /// unless absolute.
    pub database_path: String,
}

impl Default for StrongboxConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9000".to_owned(),
            data_dir: "/var/lib/strongbox".to_owned(),
            log_level: "info".to_owned(),
            database_path: "metadata.db".to_owned(),
        }
    }
}

impl StrongboxConfig {
    /// Load configuration from environment variables, falling back to
    /// [`StrongboxConfig::default`] for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("STRONGBOX_LISTEN") {
            config.listen = v;
        }
        if let Ok(v) = std::env::var("STRONGBOX_DATA_DIR") {
            config.data_dir = v;
        }
        if let Ok(v) = std::env::var("STRONGBOX_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("STRONGBOX_DATABASE_PATH") {
            config.database_path = v;
        }

        config
    }

    /// Resolve [`StrongboxConfig::database_path`] against
    /// [`StrongboxConfig::data_dir`] when it is not already absolute.
    #[must_use]
    pub fn resolved_database_path(&self) -> std::path::PathBuf {
        let path = std::path::Path::new(&self.database_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::Path::new(&self.data_dir).join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = StrongboxConfig::default();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.database_path, "metadata.db");
    }

    #[test]
    fn test_should_resolve_relative_database_path() {
        let mut config = StrongboxConfig::default();
        config.data_dir = "/data".to_owned();
        config.database_path = "meta.db".to_owned();
        assert_eq!(
            config.resolved_database_path(),
            std::path::PathBuf::from("/data/meta.db")
        );
    }

    #[test]
    fn test_should_keep_absolute_database_path() {
        let mut config = StrongboxConfig::default();
        config.database_path = "/abs/meta.db".to_owned();
        assert_eq!(
            config.resolved_database_path(),
            std::path::PathBuf::from("/abs/meta.db")
        );
    }
}
