//! Console client for the relay server

use std::io::ErrorKind;

use compact_str::{CompactString, format_compact};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, Lines},
    net::TcpStream,
};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::{
    protocol::ClientCodec,
    result::{RelayError, Result},
    session::{command::is_quit, render::LOGIN_ERROR_PREFIX},
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

const LOGIN_PROMPT: &str = "GitHub username (or 'adios' to quit): ";
const COMMAND_PROMPT: &str = "> ";

/// How a login attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginOutcome {
    Accepted,
    Quit,
}

pub struct RelayClient<S> {
    framed: Framed<S, ClientCodec>,
}

impl RelayClient<TcpStream> {
    /// Connect to a running relay server
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format_compact!("{host}:{port}");
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                info!(%addr, "Connected to relay server");
                Ok(Self::new(stream))
            },
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(RelayError::ServerUnavailable { addr })
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl<S> RelayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { framed: Framed::new(stream, ClientCodec::new()) }
    }

    /// Drive a whole session: login with retries, then commands until `adios`,
    /// end of input, or the server hanging up.
    pub async fn run<I, O>(&mut self, input: I, output: &mut O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        match self.login_loop(&mut lines, output).await? {
            Some(LoginOutcome::Accepted) => self.command_loop(&mut lines, output).await,
            Some(LoginOutcome::Quit) | None => Ok(()),
        }
    }

    async fn login_loop<I, O>(
        &mut self,
        lines: &mut Lines<I>,
        output: &mut O,
    ) -> Result<Option<LoginOutcome>>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        loop {
            write(output, LOGIN_PROMPT).await?;
            let Some(line) = lines.next_line().await? else {
                return Ok(None);
            };

            let login = line.trim();
            if login.is_empty() {
                write(output, "The username cannot be empty. Try again.\n").await?;
                continue;
            }

            let Some(reply) = self.request(login).await? else {
                write(output, "The server closed the connection before replying.\n").await?;
                return Ok(None);
            };

            if is_quit(login) {
                write(output, "Closing connection...\n").await?;
                return Ok(Some(LoginOutcome::Quit));
            }

            if reply.starts_with(LOGIN_ERROR_PREFIX) {
                debug!(login, "Login rejected by server");
                write(output, &format!("\n=== Login error ===\n{reply}\n")).await?;
                continue;
            }

            write(output, &format!("\n=== Initial status ===\n{reply}\n")).await?;
            return Ok(Some(LoginOutcome::Accepted));
        }
    }

    async fn command_loop<I, O>(&mut self, lines: &mut Lines<I>, output: &mut O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        loop {
            write(output, COMMAND_PROMPT).await?;
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };

            let command = line.trim();
            if command.is_empty() {
                continue;
            }

            let Some(reply) = self.request(command).await? else {
                write(output, "The server closed the connection.\n").await?;
                return Ok(());
            };

            write(output, &format!("\n=== Server response ===\n{reply}\n")).await?;

            if is_quit(command) {
                return Ok(());
            }
        }
    }

    /// Send one line and wait for its framed reply; `None` once the server hangs up
    async fn request(&mut self, line: &str) -> Result<Option<CompactString>> {
        self.framed.send(line).await?;
        let reply = self.framed.next().await.transpose()?;
        Ok(reply.map(CompactString::from))
    }
}

async fn write<O: AsyncWrite + Unpin>(output: &mut O, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
