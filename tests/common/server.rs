//! Test server management.
//!
//! Spawns and manages duetd instances for integration testing.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::sleep;

const TEST_SECRET: &str = "integration-secret-0123456789";

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    http_port: u16,
    config_path: PathBuf,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server on a free port with an in-memory record store.
    pub async fn spawn() -> anyhow::Result<Self> {
        let (port, http_port) = free_ports()?;
        let data_dir = tempfile::tempdir()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "duet.test"
metrics_port = {http_port}

[listen]
address = "127.0.0.1:{port}"

[auth]
secret = "{TEST_SECRET}"

[store]
backend = "memory"

[limits]
ping_interval = 0
idle_timeout = 0
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(binary())
            .arg(&config_path)
            .env("RUST_LOG", "duetd=debug")
            .spawn()?;

        let server = Self {
            child,
            port,
            http_port,
            config_path,
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until both listeners are accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            let ws = tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await;
            let http = tokio::net::TcpStream::connect(("127.0.0.1", self.http_port)).await;
            if ws.is_ok() && http.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Upgrade URL with `query` appended.
    pub fn url(&self, query: &str) -> String {
        format!("ws://127.0.0.1:{}/ws{}", self.port, query)
    }

    /// Issue an identity token through the binary's `mint-token` command.
    pub fn token(&self, id: i64, name: &str) -> anyhow::Result<String> {
        let output = Command::new(binary())
            .arg("mint-token")
            .arg(&self.config_path)
            .arg(id.to_string())
            .arg(name)
            .stderr(Stdio::inherit())
            .output()?;
        anyhow::ensure!(output.status.success(), "mint-token failed");
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Connect `id`/`name` to session `room`.
    pub async fn join(
        &self,
        room: &str,
        id: i64,
        name: &str,
    ) -> anyhow::Result<super::client::TestClient> {
        let token = self.token(id, name)?;
        super::client::TestClient::connect(&self.url(&format!("?room={room}&token={token}"))).await
    }
}

impl TestServer {
    /// Plain HTTP/1.0 GET against the side API, returning status and body.
    ///
    /// `token` is sent as a bearer token when given.
    pub async fn http_get(&self, path: &str, token: Option<&str>) -> anyhow::Result<(u16, String)> {
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", self.http_port)).await?;
        let auth = token
            .map(|t| format!("Authorization: Bearer {t}\r\n"))
            .unwrap_or_default();
        let request = format!("GET {path} HTTP/1.0\r\nHost: 127.0.0.1\r\n{auth}\r\n");
        stream.write_all(request.as_bytes()).await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;

        let status = response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("bad status line: {response}"))?;
        let body = response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        Ok((status, body))
    }

    /// Poll `path` until `check` accepts the response.
    pub async fn wait_for_http<F>(
        &self,
        path: &str,
        token: Option<&str>,
        mut check: F,
    ) -> anyhow::Result<()>
    where
        F: FnMut(u16, &str) -> bool,
    {
        for _ in 0..50 {
            let (status, body) = self.http_get(path, token).await?;
            if check(status, &body) {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("{path} never reached the expected state")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_duetd"))
}

/// Two distinct free ports, held open together while they are picked.
fn free_ports() -> anyhow::Result<(u16, u16)> {
    let a = std::net::TcpListener::bind("127.0.0.1:0")?;
    let b = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok((a.local_addr()?.port(), b.local_addr()?.port()))
}
