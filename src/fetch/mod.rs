// src/fetch/mod.rs

use crate::error::{CubeError, CubeResult};
use crate::process::utils::group_thousands;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

pub const USER_AGENT: &str = concat!("snbcube/", env!("CARGO_PKG_VERSION"));

/// How much of an error body is kept in the error message.
const ERROR_BODY_LIMIT: usize = 300;

/// Retrieves the body behind a cube URL.
pub trait Fetch {
    fn fetch(&self, url: &Url) -> CubeResult<String>;
}

/// Blocking HTTP fetcher holding one connection pool for its lifetime.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `timeout` of `None` keeps reqwest's default.
    pub fn new(timeout: Option<Duration>) -> CubeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/csv"));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    fn fetch(&self, url: &Url) -> CubeResult<String> {
        let resp = self.client.get(url.clone()).send()?;
        audit_response(&resp);

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let body = body.trim();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                body.chars().take(ERROR_BODY_LIMIT).collect()
            };
            return Err(CubeError::Network {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(resp.text()?)
    }
}

/// URL, status, type and size at info; server-side details at debug.
fn audit_response(resp: &Response) {
    let header = |name: &str| {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };

    let size = format!("{} bytes", group_thousands(resp.content_length().unwrap_or(0)));
    info!(
        url = %resp.url(),
        status = resp.status().as_u16(),
        content_type = %header(CONTENT_TYPE.as_str()),
        size = %size,
        "response audit"
    );

    let cookies: Vec<String> = resp.cookies().map(|c| c.name().to_string()).collect();
    let cookies = if cookies.is_empty() {
        "None".to_string()
    } else {
        cookies.join(",")
    };
    debug!(
        server = %header("server"),
        date = %header("date"),
        disposition = %header("content-disposition"),
        cookies = %cookies,
        "response details"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve one canned response on a local port; the request head is sent
    /// back through the channel.
    fn serve_once(status_line: &str, body: &str) -> (Url, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            let _ = tx.send(String::from_utf8_lossy(&head).to_string());
        });
        let url = Url::parse(&format!("http://{}/api/cube/rentm/data/csv/en?fromDate=2024-05", addr)).unwrap();
        (url, rx)
    }

    #[test]
    fn returns_body_and_sends_csv_headers() {
        let (url, rx) = serve_once("200 OK", "Date,Value\n2024-05,1.5\n");
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let body = fetcher.fetch(&url).unwrap();
        assert_eq!(body, "Date,Value\n2024-05,1.5\n");

        let head = rx.recv().unwrap().to_lowercase();
        assert!(head.starts_with("get /api/cube/rentm/data/csv/en?fromdate=2024-05 http/1.1"));
        assert!(head.contains("accept: text/csv"));
        assert!(head.contains(&format!("user-agent: {}", USER_AGENT.to_lowercase())));
    }

    #[test]
    fn bad_request_surfaces_status() {
        let (url, _rx) = serve_once("400 Bad Request", "Invalid selection");
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let err = fetcher.fetch(&url).unwrap_err();
        match err {
            CubeError::Network { status, message } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "Invalid selection");
            }
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn empty_error_body_uses_reason() {
        let (url, _rx) = serve_once("404 Not Found", "");
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let err = fetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, CubeError::Network { status: Some(404), ref message } if message == "Not Found"));
    }

    #[test]
    fn connection_refused_has_no_status() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/api", port)).unwrap();
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let err = fetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, CubeError::Network { status: None, .. }));
    }
}
