//! Test server management.
//!
//! Spawns and manages chatd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    admin_port: u16,
    http: reqwest::Client,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with in-memory storage and history.
    pub async fn spawn(port: u16, admin_port: u16) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test.server"
service = "chat"
metrics_port = {admin_port}

[listen]
address = "127.0.0.1:{port}"

[history]
enabled = true
backend = "memory"

[session]
primary_platform = "mobile"
heartbeat_secs = 1
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_chatd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            admin_port,
            http: reqwest::Client::new(),
            _data_dir: data_dir,
        };

        server.wait_until_ready(port).await?;
        server.wait_until_ready(admin_port).await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections on `port`.
    async fn wait_until_ready(&self, port: u16) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to listen on {} within 5 seconds", port)
    }

    /// WebSocket URL of the client gateway.
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/chat/stream", self.port)
    }

    fn admin(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.admin_port, path)
    }

    /// Connect a client and log in as (id, platform).
    pub async fn login(
        &self,
        id: &str,
        platform: &str,
        start: i64,
    ) -> anyhow::Result<super::client::TestClient> {
        let mut client = super::client::TestClient::connect(&self.url()).await?;
        client.auth(id, platform, start).await?;
        Ok(client)
    }

    pub async fn create_user(&self, id: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(self.admin("/users"))
            .json(&serde_json::json!({ "id": id, "name": id }))
            .send()
            .await?;
        anyhow::ensure!(response.status().is_success(), "create user {}: {}", id, response.status());
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> anyhow::Result<reqwest::StatusCode> {
        let response = self.http.delete(self.admin(&format!("/users/{id}"))).send().await?;
        Ok(response.status())
    }

    pub async fn create_room(&self, id: &str, owner: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(self.admin("/rooms"))
            .json(&serde_json::json!({ "id": id, "name": id, "owner": owner }))
            .send()
            .await?;
        anyhow::ensure!(response.status().is_success(), "create room {}: {}", id, response.status());
        Ok(())
    }

    pub async fn metrics(&self) -> anyhow::Result<String> {
        Ok(self.http.get(self.admin("/metrics")).send().await?.text().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
