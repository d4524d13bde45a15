//! Code fetching
//!
//! Retrieves scraper/runtime source text from a URL before dispatch. A
//! location whose path ends in `.gz` or `.gzip` signals compressed content
//! that is gunzipped transparently; anything else is returned verbatim as
//! text. The fetch is idempotent: same location, unchanged remote content,
//! same text.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while fetching code
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch exceeded its bounded timeout
    #[error("fetch timed out: {url}")]
    Timeout { url: String },

    /// Transport failure or non-success status
    #[error("code fetch failed: {0}")]
    Http(String),

    /// Corrupt compressed stream or non-text body; no partial text is returned
    #[error("failed to decode fetched code: {0}")]
    Decode(String),
}

/// Fetches scraper source text over HTTP
#[derive(Debug, Clone)]
pub struct CodeFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl CodeFetcher {
    /// Creates a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a fetcher with a custom HTTP client (proxies, TLS settings)
    pub fn with_client(timeout: Duration, client: reqwest::Client) -> Self {
        Self { client, timeout }
    }

    /// Fetches the given location and returns its text content
    ///
    /// # Arguments
    /// * `url` - Source location; a `.gz`/`.gzip` suffix triggers gunzip
    ///
    /// # Returns
    /// The raw text content to be shipped to a worker
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(format!("status {} from {}", status, url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        debug!(bytes = body.len(), url, "fetched function code");

        if is_compressed_location(url) {
            gunzip_text(&body)
        } else {
            String::from_utf8(body.to_vec())
                .map_err(|e| FetchError::Decode(format!("body is not valid UTF-8: {}", e)))
        }
    }
}

fn map_transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http(e.to_string())
    }
}

/// Whether the location's path names a recognized compressed-archive suffix
fn is_compressed_location(url: &str) -> bool {
    // Ignore query string and fragment when inspecting the suffix
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".gz") || path.ends_with(".gzip")
}

/// Gunzips a body into text, refusing partial output on a corrupt stream
fn gunzip_text(body: &[u8]) -> Result<String, FetchError> {
    let mut decoder = GzDecoder::new(body);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| FetchError::Decode(format!("gunzip failed: {}", e)))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_compressed_location_suffixes() {
        assert!(is_compressed_location("https://x/code.js.gz"));
        assert!(is_compressed_location("https://x/code.gzip"));
        assert!(is_compressed_location("https://x/code.js.gz?token=abc"));
        assert!(!is_compressed_location("https://x/code.js"));
        assert!(!is_compressed_location("https://x/gz/code.js"));
    }

    #[test]
    fn test_gunzip_roundtrip() {
        let body = gzip("console.log(1)");
        assert_eq!(gunzip_text(&body).unwrap(), "console.log(1)");
    }

    #[test]
    fn test_gunzip_rejects_corrupt_stream() {
        let err = gunzip_text(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_gunzip_rejects_truncated_stream() {
        let mut body = gzip("console.log(1)");
        body.truncate(body.len() / 2);
        let err = gunzip_text(&body).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    /// Serves one HTTP response on an ephemeral port and returns the base URL
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf).await;
                let header = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes()).await;
                let _ = stream.write_all(&body).await;
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_gzip_location_end_to_end() {
        let base = serve_once("200 OK", gzip("console.log(1)")).await;
        let fetcher = CodeFetcher::new(Duration::from_secs(5));

        let text = fetcher.fetch(&format!("{}/code.js.gz", base)).await.unwrap();
        assert_eq!(text, "console.log(1)");
    }

    #[tokio::test]
    async fn test_fetch_plain_location_is_verbatim() {
        let base = serve_once("200 OK", b"console.log(1)".to_vec()).await;
        let fetcher = CodeFetcher::new(Duration::from_secs(5));

        let text = fetcher.fetch(&format!("{}/code.js", base)).await.unwrap();
        assert_eq!(text, "console.log(1)");
    }

    #[tokio::test]
    async fn test_fetch_corrupt_gzip_is_decode_error() {
        let base = serve_once("200 OK", b"definitely not gzip".to_vec()).await;
        let fetcher = CodeFetcher::new(Duration::from_secs(5));

        let err = fetcher
            .fetch(&format!("{}/code.js.gz", base))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let base = serve_once("404 Not Found", Vec::new()).await;
        let fetcher = CodeFetcher::new(Duration::from_secs(5));

        let err = fetcher.fetch(&format!("{}/code.js", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        // Accept the connection but never respond
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let fetcher = CodeFetcher::new(Duration::from_millis(200));
        let err = fetcher
            .fetch(&format!("http://{}/code.js", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));

        server.abort();
    }
}
