//! Tunnel configuration
//!
//! Loaded once at startup from a JSON document:
//!
//! ```json
//! {
//!   "sentinels_addresses_list": ["127.0.0.1:26379", "127.0.0.1:26380"],
//!   "databases": [{ "name": "cache", "local_port": 7000 }]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use sentinel_relay::DatabaseConfig;

/// Validated tunnel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConfig {
    /// Sentinel addresses in failover order; reconnects always retry from
    /// the first entry.
    pub sentinels_addresses_list: Vec<String>,
    /// Databases to tunnel, one relay listener each.
    pub databases: Vec<DatabaseConfig>,
}

impl TunnelConfig {
    /// Load and validate the configuration. Any failure here is fatal at
    /// startup.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        let config: TunnelConfig = serde_json::from_str(&json)
            .context(format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sentinels_addresses_list.is_empty() {
            bail!("config lists no sentinel addresses");
        }
        if self.databases.is_empty() {
            bail!("config lists no databases to tunnel");
        }
        for database in &self.databases {
            if database.name.is_empty() {
                bail!("config lists a database with an empty name");
            }
        }
        Ok(())
    }
}
