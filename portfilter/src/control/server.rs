//! Unix domain socket server exposing the add/show/del endpoints

use super::protocol::{Reply, Request, RuleCommandProtocol};
use crate::error::{FilterError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Control server configuration
#[derive(Clone)]
pub struct ControlServerConfig {
    pub socket_path: PathBuf,
    pub protocol: Arc<RuleCommandProtocol>,
}

/// Line-oriented control server.
///
/// Each connection may send any number of requests:
/// `add <kind> <port>`, `show`, `del <index>`. Every request is answered
/// with `OK [index]` (a show listing precedes its `OK`) or `ERR <message>`.
pub struct ControlServer {
    config: ControlServerConfig,
}

impl ControlServer {
    /// Create a new control server with the given configuration
    pub fn new(config: ControlServerConfig) -> Self {
        Self { config }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.config.socket_path
    }

    /// Bind the Unix domain socket and serve forever
    pub async fn start(&self) -> Result<()> {
        // Remove a stale socket left by a previous run
        let _ = std::fs::remove_file(&self.config.socket_path);

        let listener = UnixListener::bind(&self.config.socket_path)?;
        info!("Control endpoint listening on {:?}", self.config.socket_path);

        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            let (socket, _) = listener.accept().await?;
            let protocol = self.config.protocol.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_client(socket, protocol).await {
                    debug!("Control connection error: {}", e);
                }
            });
        }
    }
}

/// Handle a single control connection
async fn handle_client(stream: UnixStream, protocol: Arc<RuleCommandProtocol>) -> Result<()> {
    debug!("Control client connected");

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        debug!("Control request: {:?}", line);
        if line.trim().is_empty() {
            continue;
        }

        let response = respond(&protocol, &line);
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }

    debug!("Control client disconnected");
    Ok(())
}

/// Build the wire response for one request line
pub fn respond(protocol: &RuleCommandProtocol, line: &str) -> String {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => return format!("ERR {}\n", FilterError::from(e)),
    };

    match protocol.handle(request) {
        Ok(Reply::Added(index)) => format!("OK {}\n", index),
        Ok(Reply::Listing(listing)) => format!("{}OK\n", listing),
        Ok(Reply::Deleted(_)) => "OK\n".to_string(),
        Err(e @ FilterError::Copy { .. }) if request == Request::Show => {
            warn!("Rule listing not delivered: {}", e);
            "OK\n".to_string()
        }
        Err(e) => format!("ERR {}\n", e),
    }
}
