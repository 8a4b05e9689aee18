//! Per-database relay listener

use std::net::SocketAddr;

use sentinel_resolver::Resolver;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::{DatabaseConfig, RelayError};

/// Accepts client connections on a local port and relays each one to the
/// current master of its logical database.
pub struct RelayListener {
    database: DatabaseConfig,
    resolver: Resolver,
    listener: TcpListener,
}

impl RelayListener {
    /// Bind `0.0.0.0:<local_port>`. Bind failure is fatal and propagates to
    /// the runner.
    pub async fn bind(database: DatabaseConfig, resolver: Resolver) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(("0.0.0.0", database.local_port))
            .await
            .map_err(|e| RelayError::Bind {
                name: database.name.clone(),
                port: database.local_port,
                source: e,
            })?;

        info!(
            port = database.local_port,
            db = %database.name,
            "listening for connections"
        );

        Ok(Self {
            database,
            resolver,
            listener,
        })
    }

    /// Port actually bound. Useful when configured with port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until an accept error occurs. Each accepted
    /// connection is handled on its own task; its failures never reach the
    /// accept loop.
    pub async fn run(self) -> Result<(), RelayError> {
        loop {
            let (client, peer_addr) = self.listener.accept().await.map_err(|e| {
                error!(port = self.database.local_port, error = %e, "accept failed");
                RelayError::Accept {
                    port: self.database.local_port,
                    source: e,
                }
            })?;

            debug!(peer = %peer_addr, db = %self.database.name, "accepted connection");

            let name = self.database.name.clone();
            let resolver = self.resolver.clone();
            tokio::spawn(async move {
                handle_connection(client, peer_addr, name, resolver).await;
            });
        }
    }
}

/// Resolve the master address, dial it, and relay. On any failure the client
/// connection is dropped and that is the end of it; the listener keeps
/// accepting.
async fn handle_connection(
    client: TcpStream,
    peer_addr: SocketAddr,
    name: String,
    resolver: Resolver,
) {
    let db_address = match resolver.resolve(&name).await {
        Ok(address) => address,
        Err(e) => {
            error!(db = %name, peer = %peer_addr, error = %e, "cannot get db address");
            return;
        }
    };

    let db_conn = match TcpStream::connect(db_address.as_str()).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(db = %name, address = %db_address, error = %e, "cannot connect to db");
            return;
        }
    };

    debug!(db = %name, peer = %peer_addr, address = %db_address, "tunnel established");
    relay(client, db_conn).await;
    debug!(db = %name, peer = %peer_addr, "tunnel closed");
}

/// Copy bytes in both directions until either side finishes.
///
/// Either direction reaching EOF or failing tears down the whole tunnel:
/// the finished direction wins the select, the other task is aborted, and
/// dropping the split halves closes both sockets. Deliberately not a
/// half-close.
pub async fn relay(client: TcpStream, backend: TcpStream) {
    let (mut client_read, mut client_write) = client.into_split();
    let (mut backend_read, mut backend_write) = backend.into_split();

    let mut client_to_backend = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut client_read, &mut backend_write).await;
    });
    let mut backend_to_client = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut backend_read, &mut client_write).await;
    });

    tokio::select! {
        _ = &mut client_to_backend => backend_to_client.abort(),
        _ = &mut backend_to_client => client_to_backend.abort(),
    }
}
