//! Control socket client for the filter daemon

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Parsed daemon reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `OK`, with the optional value after it and any lines before it
    Ok { value: Option<String>, body: String },
    /// `ERR <message>`
    Err(String),
}

/// Send one request line and collect the full reply
pub async fn send_request(socket: &Path, request: &str) -> anyhow::Result<String> {
    tracing::debug!("Connecting to control socket at {:?}", socket);
    let mut stream = UnixStream::connect(socket).await?;

    tracing::debug!("Sending request: {:?}", request);
    stream.write_all(request.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    tracing::debug!("Received reply: {:?}", reply);

    if reply.is_empty() {
        anyhow::bail!("No response from daemon");
    }
    Ok(reply)
}

/// Split a reply into its body and final status line
pub fn interpret(reply: &str) -> anyhow::Result<Outcome> {
    let trimmed = reply.trim_end_matches('\n');
    let (body, status) = match trimmed.rfind('\n') {
        Some(pos) => (&trimmed[..=pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    };

    if let Some(message) = status.strip_prefix("ERR ") {
        return Ok(Outcome::Err(message.to_string()));
    }

    match status.strip_prefix("OK") {
        Some(rest) => {
            let value = rest.trim();
            Ok(Outcome::Ok {
                value: (!value.is_empty()).then(|| value.to_string()),
                body: body.to_string(),
            })
        }
        None => anyhow::bail!("Malformed reply from daemon: {:?}", status),
    }
}
