//! HTTP source fetcher (component C): size-checked streaming download with
//! a header allowlist and private-network rejection.

use std::net::{IpAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use loist_common::{Error, ErrorKind, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(300);

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

pub struct FetchedFile {
    pub path: PathBuf,
    pub content_length: u64,
    /// Deleted on drop; guarantees no temporary file survives a handler
    /// return, per `spec.md` §8 invariant 4.
    _guard: TempFileGuard,
}

struct TempFileGuard(PathBuf);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// `fetch(url, headers, max-size) → local-path`.
pub async fn fetch(
    url: &str,
    headers: &std::collections::HashMap<String, String>,
    max_size_bytes: u64,
) -> Result<FetchedFile> {
    let parsed = url::Url::parse(url)
        .map_err(|_| Error::terminal(ErrorKind::ValidationError, "malformed source URL"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::terminal(
            ErrorKind::FetchForbidden,
            format!("scheme '{}' is not allowed", parsed.scheme()),
        ));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::terminal(ErrorKind::FetchForbidden, "URL has no host"))?;
    reject_private_network(host)?;

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(TOTAL_TIMEOUT)
        .build()
        .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

    let mut request = client.head(parsed.clone());
    for (k, v) in headers {
        if !HOP_BY_HOP_HEADERS.contains(&k.to_ascii_lowercase().as_str()) {
            request = request.header(k, v);
        }
    }

    if let Ok(head_resp) = request.send().await {
        if let Some(len) = head_resp.content_length() {
            if len > max_size_bytes {
                return Err(Error::terminal(
                    ErrorKind::SizeExceeded,
                    format!("declared content-length {len} exceeds max {max_size_bytes}"),
                ));
            }
        }
    }

    let mut request = client.get(parsed);
    for (k, v) in headers {
        if !HOP_BY_HOP_HEADERS.contains(&k.to_ascii_lowercase().as_str()) {
            request = request.header(k, v);
        }
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::retriable(ErrorKind::FetchFailed, format!("request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let retriable = status.is_server_error();
        return Err(Error {
            kind: ErrorKind::FetchFailed,
            message: format!("upstream returned {status}"),
            retriable,
            details: Some(serde_json::json!({ "status": status.as_u16() })),
        });
    }

    let tmp_path = std::env::temp_dir().join(format!("loist-fetch-{}.tmp", uuid::Uuid::new_v4()));
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| Error::internal(format!("failed to create temp file: {e}")))?;
    let guard = TempFileGuard(tmp_path.clone());

    let mut total: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::retriable(ErrorKind::FetchFailed, format!("stream error: {e}")))?;
        total += chunk.len() as u64;
        if total > max_size_bytes {
            return Err(Error::terminal(
                ErrorKind::SizeExceeded,
                format!("stream exceeded max size {max_size_bytes} bytes"),
            ));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::internal(format!("failed writing temp file: {e}")))?;
    }
    file.flush().await.ok();

    Ok(FetchedFile {
        path: tmp_path,
        content_length: total,
        _guard: guard,
    })
}

fn reject_private_network(host: &str) -> Result<()> {
    if host == "localhost" {
        return Err(Error::terminal(ErrorKind::FetchForbidden, "localhost is not allowed"));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_or_loopback(ip) {
            return Err(Error::terminal(ErrorKind::FetchForbidden, "private/loopback address is not allowed"));
        }
        return Ok(());
    }

    if let Ok(addrs) = (host, 0u16).to_socket_addrs() {
        for addr in addrs {
            if is_private_or_loopback(addr.ip()) {
                return Err(Error::terminal(ErrorKind::FetchForbidden, "host resolves to a private/loopback address"));
            }
        }
    }

    Ok(())
}

fn is_private_or_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}
