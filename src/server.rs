//! TCP front end: accepts clients and runs one session task per connection.
//!
//! ```text
//! +-------------+
//! | RelayServer |  <- accept loop, shutdown fan-out
//! +-------------+
//!        |  one task per connection
//!        v
//! +---------+     +-------------+     +-----------+
//! | Session | --> | SyncService | --> | GithubApi |
//! +---------+     +-------------+     +-----------+
//!                        |
//!                        v
//!                    +-------+
//!                    | Store |  <- one SQLite connection per session
//!                    +-------+
//! ```

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use compact_str::{CompactString, ToCompactString};
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::broadcast,
    task::JoinSet,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    client::GithubApi,
    result::Result,
    service::SyncService,
    session::Session,
    store::Database,
};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) cannot spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct RelayServer {
    listener: TcpListener,
    database: Database,
    api: Arc<GithubApi>,
    active: ActiveSessions,
}

impl RelayServer {
    /// Prepare the schema, then bind. Nothing listens if the database is unusable.
    #[instrument(skip(database, api), fields(database = %database.path().display()))]
    pub async fn bind(
        addr: impl ToSocketAddrs + std::fmt::Debug,
        database: Database,
        api: Arc<GithubApi>,
    ) -> Result<Self> {
        database.init_schema().await?;
        info!("Database initialized");

        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, database, api))
    }

    /// Wrap an already bound listener; the schema must exist
    pub fn new(listener: TcpListener, database: Database, api: Arc<GithubApi>) -> Self {
        Self { listener, database, api, active: ActiveSessions::default() }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of sessions currently running
    pub fn active_sessions(&self) -> ActiveSessions {
        self.active.clone()
    }

    /// Accept clients until `shutdown` resolves, then close every session and wait for it
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        info!(addr = %self.local_addr()?, "Relay server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        sessions.spawn(handle_connection(
                            stream,
                            peer,
                            self.database.clone(),
                            Arc::clone(&self.api),
                            self.active.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    },
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Session task failed");
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing listener");
                    break;
                },
            }
        }

        drop(self.listener);
        let _ = shutdown_tx.send(());

        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Session task failed during shutdown");
            }
        }

        info!("Relay server stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    database: Database,
    api: Arc<GithubApi>,
    active: ActiveSessions,
    mut shutdown: broadcast::Receiver<()>,
) {
    let peer = peer.to_compact_string();
    info!(%peer, "Connection accepted");

    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
    }

    let store = match database.connect().await {
        Ok(store) => store,
        Err(e) => {
            error!(%peer, error = %e, "Failed to open database connection");
            return;
        },
    };

    let _active = active.enter(&peer);
    let session = Session::new(stream, peer.clone(), SyncService::new(api, store));

    tokio::select! {
        result = session.run() => {
            if let Err(e) = result {
                warn!(%peer, error = %e, "Session ended with error");
            }
        },
        _ = shutdown.recv() => {
            info!(%peer, "Session closed by server shutdown");
        },
    }

    info!(%peer, "Connection closed");
}

/// Shared count of live sessions
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    count: Arc<AtomicUsize>,
}

impl ActiveSessions {
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn enter(&self, peer: &str) -> ActiveGuard {
        let active = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(peer, active, "Active clients");
        ActiveGuard { count: Arc::clone(&self.count), peer: peer.into() }
    }
}

/// Decrements the session count when the session ends, on every path
struct ActiveGuard {
    count: Arc<AtomicUsize>,
    peer: CompactString,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let active = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(peer = %self.peer, active, "Active clients");
    }
}
