//! Serialized resolve dispatch
//!
//! Many tunnel connections resolve concurrently, but the sentinel session
//! cannot be shared. A single worker task owns the session and services a
//! request queue strictly in submission order; each caller waits on its own
//! reply channel. No locks around the socket, and no way for two requests
//! to interleave on the wire.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::session::SentinelSession;

/// Resolve errors surfaced to callers
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to connect to any of the sentinel services")]
    NoSentinelReachable,

    #[error("failed to retrieve db address from the sentinel, db_name: {name}")]
    QueryFailed { name: String },

    #[error("resolver worker is no longer running")]
    WorkerGone,
}

struct ResolveRequest {
    name: String,
    reply: oneshot::Sender<Result<String, ResolveError>>,
}

/// Concurrency-safe handle to the discovery worker.
///
/// Cheap to clone; all clones feed the same queue. A failed request is never
/// retried automatically: the caller receives the failure and decides
/// whether to resolve again.
#[derive(Clone)]
pub struct Resolver {
    tx: mpsc::Sender<ResolveRequest>,
}

impl Resolver {
    /// Connect to the first reachable sentinel in `addresses` and spawn the
    /// discovery worker. Fails with [`ResolveError::NoSentinelReachable`] if
    /// every address is down, which is fatal at startup.
    pub async fn new(addresses: Vec<String>) -> Result<Self, ResolveError> {
        let mut session = SentinelSession::new(addresses);
        if !session.connect().await {
            return Err(ResolveError::NoSentinelReachable);
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_worker(session, rx));
        info!("sentinel discovery worker started");

        Ok(Self { tx })
    }

    /// Resolve `logical_name` to the current master `host:port`.
    pub async fn resolve(&self, logical_name: &str) -> Result<String, ResolveError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ResolveRequest {
            name: logical_name.to_string(),
            reply: reply_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| ResolveError::WorkerGone)?;
        reply_rx.await.map_err(|_| ResolveError::WorkerGone)?
    }
}

/// Worker loop. Exclusive owner of the session; exits when every `Resolver`
/// handle is dropped.
async fn run_worker(mut session: SentinelSession, mut rx: mpsc::Receiver<ResolveRequest>) {
    while let Some(request) = rx.recv().await {
        // A previous reconnect failed: fail fast until a sentinel is back.
        if !session.is_connected() && !session.connect().await {
            let _ = request.reply.send(Err(ResolveError::NoSentinelReachable));
            continue;
        }

        match session.query(&request.name).await {
            Ok(address) => {
                let _ = request.reply.send(Ok(address));
            }
            Err(e) => {
                error!(db = %request.name, error = %e, "sentinel query failed");
                let closed = e.is_connection_closed();

                // Any query failure costs the session its connection: even a
                // protocol-level anomaly on a live connection forces a fresh
                // one before the next request is served.
                if !closed {
                    let _ = request.reply.send(Err(ResolveError::QueryFailed {
                        name: request.name.clone(),
                    }));
                    let _ = session.connect().await;
                } else {
                    let reconnected = session.connect().await;
                    let outcome = if reconnected {
                        Err(ResolveError::QueryFailed {
                            name: request.name.clone(),
                        })
                    } else {
                        Err(ResolveError::NoSentinelReachable)
                    };
                    let _ = request.reply.send(outcome);
                }
            }
        }
    }
}
