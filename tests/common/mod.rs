//! Shared fixtures: a mocked GitHub API and a relay server on a loopback port

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use futures_util::{SinkExt, StreamExt};
use ghrelay::{
    client::{ClientConfig, GithubApi},
    protocol::ClientCodec,
    server::{ActiveSessions, RelayServer},
    store::Database,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_util::codec::Framed;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

pub fn user_json(id: u64, login: &str, name: Option<&str>) -> Value {
    json!({
        "id": id,
        "login": login,
        "name": name,
        "html_url": format!("https://github.com/{login}"),
        "type": "User",
        "company": null,
        "location": "San Francisco",
        "created_at": "2011-01-25T18:44:36Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

pub fn repo_json(id: u64, owner: &str, name: &str, language: Option<&str>, stars: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "private": false,
        "html_url": format!("https://github.com/{owner}/{name}"),
        "description": null,
        "language": language,
        "forks_count": 1,
        "stargazers_count": stars,
        "watchers_count": stars,
        "open_issues_count": 0,
        "fork": false,
        "default_branch": "main",
        "created_at": "2020-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "pushed_at": "2024-01-01T00:00:00Z"
    })
}

pub fn follower_json(id: u64, login: &str) -> Value {
    json!({
        "id": id,
        "login": login,
        "html_url": format!("https://github.com/{login}")
    })
}

pub async fn mount_user(server: &MockServer, user: Value) {
    let login = user["login"].as_str().unwrap_or_default().to_string();
    Mock::given(method("GET"))
        .and(path(format!("/users/{login}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user))
        .mount(server)
        .await;
}

pub async fn mount_missing_user(server: &MockServer, login: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{login}")))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
        )
        .mount(server)
        .await;
}

/// Serve `items` as the single page of a listing
pub async fn mount_listing(server: &MockServer, endpoint: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(server)
        .await;
}

pub fn api_for(server: &MockServer) -> Arc<GithubApi> {
    let config = ClientConfig::new(server.uri(), Some("test-token".into()));
    Arc::new(GithubApi::new(config).expect("valid client config"))
}

pub struct TestRelay {
    pub addr: SocketAddr,
    pub active: ActiveSessions,
    pub database: Database,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<ghrelay::result::Result<()>>>,
    _dir: TempDir,
}

impl TestRelay {
    pub async fn start(github: &MockServer) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let database = Database::new(dir.path().join("relay.db"));

        let server = RelayServer::bind("127.0.0.1:0", database.clone(), api_for(github))
            .await
            .expect("bind relay");
        let addr = server.local_addr().expect("local addr");
        let active = server.active_sessions();

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            active,
            database,
            shutdown: Some(tx),
            handle: Some(handle),
            _dir: dir,
        }
    }

    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        TestClient { framed: Framed::new(stream, ClientCodec::new()) }
    }

    /// Trigger shutdown and wait for the server to drain its sessions
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.expect("server task").expect("server result");
        }
    }
}

pub struct TestClient {
    framed: Framed<TcpStream, ClientCodec>,
}

impl TestClient {
    pub async fn request(&mut self, line: &str) -> String {
        self.framed.send(line).await.expect("send request");
        self.reply().await.expect("server replied")
    }

    /// Next framed message, `None` once the server closes the connection
    pub async fn reply(&mut self) -> Option<String> {
        self.framed.next().await.transpose().expect("decode reply")
    }

    /// Write a line without waiting for a reply; the server may already be gone
    pub async fn send(&mut self, line: &str) {
        let _ = self.framed.send(line).await;
    }

    /// True once the server has dropped the connection, cleanly or with a reset
    pub async fn is_closed(&mut self) -> bool {
        matches!(self.framed.next().await, None | Some(Err(_)))
    }

    pub async fn login(&mut self, login: &str) -> String {
        let reply = self.request(login).await;
        assert!(!reply.starts_with("ERROR_LOGIN"), "login rejected: {reply}");
        reply
    }
}
