//! Listener supervision

use sentinel_resolver::Resolver;
use tokio::task::JoinSet;
use tracing::info;

use crate::listener::RelayListener;
use crate::{DatabaseConfig, RelayError};

/// Owns one [`RelayListener`] per configured database.
///
/// All ports are bound up front so a bad configuration fails before any
/// traffic is accepted. The first listener error aborts the remaining
/// listeners and propagates; there is no per-listener restart.
pub struct TunnelRunner {
    databases: Vec<DatabaseConfig>,
    resolver: Resolver,
}

impl TunnelRunner {
    pub fn new(databases: Vec<DatabaseConfig>, resolver: Resolver) -> Self {
        Self {
            databases,
            resolver,
        }
    }

    pub async fn run(self) -> Result<(), RelayError> {
        let mut listeners = Vec::with_capacity(self.databases.len());
        for database in self.databases {
            listeners.push(RelayListener::bind(database, self.resolver.clone()).await?);
        }

        info!(count = listeners.len(), "all relay listeners bound");

        let mut tasks = JoinSet::new();
        for listener in listeners {
            tasks.spawn(listener.run());
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tasks.abort_all();
                    return Err(RelayError::Task(e));
                }
            }
        }

        Ok(())
    }
}
