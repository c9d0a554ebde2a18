//! Application configuration loaded from environment variables.

use std::sync::Arc;

use domain::ProcessCatalog;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `CATALOG_PATH` — JSON process catalog file (default: built-in catalog)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub catalog_path: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            catalog_path: std::env::var("CATALOG_PATH").ok(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the process catalog from `CATALOG_PATH`, or the built-in
    /// standard catalog when unset.
    pub fn load_catalog(&self) -> Result<Arc<ProcessCatalog>, String> {
        match &self.catalog_path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read catalog file {path}: {e}"))?;
                let catalog = ProcessCatalog::from_json(&json)
                    .map_err(|e| format!("invalid catalog file {path}: {e}"))?;
                Ok(Arc::new(catalog))
            }
            None => Ok(Arc::new(ProcessCatalog::standard())),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            catalog_path: None,
        }
    }
}
