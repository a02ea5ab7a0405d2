//! Per-client session: login phase, then the command loop.
//!
//! ```text
//! unauthenticated ──valid login──▶ authenticated ──▶ command loop
//!        │  ▲                                            │
//!        │  └──ERROR_LOGIN (retry)                       │
//!        └──adios / EOF──▶ closed ◀──────adios / EOF─────┘
//! ```

pub mod command;
pub mod render;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use crate::{
    domain::{SyncKind, UserStatus},
    protocol::ServerCodec,
    result::Result,
    service::SyncService,
};
use command::{Command, is_quit};

/// State once a login has been accepted
#[derive(Debug)]
struct Authenticated {
    login: CompactString,
    status: UserStatus,
}

pub struct Session<S> {
    framed: Framed<S, ServerCodec>,
    peer: CompactString,
    service: SyncService,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<CompactString>, service: SyncService) -> Self {
        Self {
            framed: Framed::new(stream, ServerCodec::new()),
            peer: peer.into(),
            service,
        }
    }

    /// Serve the client until it quits or disconnects
    #[instrument(name = "session", skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self) -> Result<()> {
        let Some(mut auth) = self.login_loop().await? else {
            return Ok(());
        };

        let welcome = format!("{}\n{}", render::initial_status(&auth.status), render::prompt());
        self.send(welcome).await?;

        while let Some(line) = self.next_line().await? {
            let command = Command::parse(&line);
            debug!(login = %auth.login, ?command, "Command received");

            match command {
                Command::Sync(kind) => self.run_sync(&mut auth, kind).await?,
                Command::Local(kind) => self.run_local(&auth, kind).await?,
                Command::Help => {
                    let help = format!("{}\n{}", render::commands_help(), render::prompt());
                    self.send(help).await?;
                },
                Command::Quit => {
                    self.send(render::QUIT_REPLY).await?;
                    info!(login = %auth.login, "Session ended by client");
                    return Ok(());
                },
                Command::Unknown(_) => {
                    let reply = format!("{}{}", render::unknown_command(), render::prompt());
                    self.send(reply).await?;
                },
            }
        }

        info!(login = %auth.login, "Client closed the connection");
        Ok(())
    }

    /// Read logins until one validates; `None` when the client leaves first
    async fn login_loop(&mut self) -> Result<Option<Authenticated>> {
        loop {
            let Some(line) = self.next_line().await? else {
                info!("Connection closed during login");
                return Ok(None);
            };

            let login = line.trim();
            debug!(login, "Login received");

            if is_quit(login) {
                self.send(render::QUIT_REPLY).await?;
                info!("Session ended during login");
                return Ok(None);
            }

            if login.is_empty() {
                self.send(render::empty_login()).await?;
                continue;
            }

            match self.authenticate(login).await {
                Ok(auth) => {
                    info!(login = %auth.login, "Login accepted");
                    return Ok(Some(auth));
                },
                Err(e) => {
                    warn!(login, error = %e, "Login rejected");
                    self.send(render::login_error(login, &e)).await?;
                },
            }
        }
    }

    /// Use the cached user, or validate it on GitHub the first time it is seen
    async fn authenticate(&self, login: &str) -> Result<Authenticated> {
        let mut status = self.service.user_status(login).await?;

        if !status.exists {
            self.service.set_current_user(login).await?;
            status = self.service.user_status(login).await?;
        }

        let login = status.login.clone().unwrap_or_else(|| login.into());
        Ok(Authenticated { login, status })
    }

    async fn run_sync(&mut self, auth: &mut Authenticated, kind: SyncKind) -> Result<()> {
        let reply = match self.sync_and_list(auth, kind).await {
            Ok(report) => report,
            Err(e) => {
                warn!(login = %auth.login, %kind, error = %e, "Sync failed");
                render::sync_error(kind, &auth.login, &e)
            },
        };
        self.send(format!("{reply}{}", render::prompt())).await
    }

    async fn sync_and_list(&self, auth: &mut Authenticated, kind: SyncKind) -> Result<String> {
        let synced = match kind {
            SyncKind::Repos => self.service.sync_repos(&auth.login).await?,
            SyncKind::Followers => self.service.sync_followers(&auth.login).await?,
        };
        info!(login = %auth.login, %kind, synced, "Synced from GitHub");

        auth.status = self.service.user_status(&auth.login).await?;
        self.list(&auth.login, kind, auth.status.last_sync(kind), Some(synced))
            .await
    }

    async fn run_local(&mut self, auth: &Authenticated, kind: SyncKind) -> Result<()> {
        let last_sync = auth.status.last_sync(kind);
        let reply = match self.list(&auth.login, kind, last_sync, None).await {
            Ok(report) => report,
            Err(e) => {
                warn!(login = %auth.login, %kind, error = %e, "Reading stored data failed");
                render::read_error(kind, &auth.login, &e)
            },
        };
        self.send(format!("{reply}{}", render::prompt())).await
    }

    async fn list(
        &self,
        login: &str,
        kind: SyncKind,
        last_sync: Option<DateTime<Utc>>,
        synced: Option<usize>,
    ) -> Result<String> {
        Ok(match kind {
            SyncKind::Repos => {
                let rows = self.service.show_repos(login).await?;
                render::repos_report(login, last_sync, &rows, synced)
            },
            SyncKind::Followers => {
                let rows = self.service.show_followers(login).await?;
                render::followers_report(login, last_sync, &rows, synced)
            },
        })
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.framed.next().await.transpose()?)
    }

    /// Frame, write and flush one response
    async fn send(&mut self, message: impl AsRef<str>) -> Result<()> {
        self.framed.send(message.as_ref()).await?;
        Ok(())
    }
}
