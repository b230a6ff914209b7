//! HTTP archive source backed by reqwest.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::listing::parse_archive_listing;
use super::{validate_archive_name, ArchiveSource, Listing, SourceError};

pub const USER_AGENT: &str = concat!("gini-census/", env!("CARGO_PKG_VERSION"));

/// Archive source that scrapes an HTTP directory listing.
#[derive(Clone)]
pub struct HttpArchiveSource {
    client: Client,
    base_url: Url,
}

impl HttpArchiveSource {
    /// Create a source for the listing at `base_url`.
    ///
    /// Requests never time out unless `timeout` is set.
    pub fn new(
        base_url: &str,
        user_agent: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url).map_err(|e| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl {
                url: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let mut builder = Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .gzip(true)
            .brotli(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    /// Listing page URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of one archive: the base path with `name` appended as a segment.
    pub fn archive_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn list_archives(&self) -> Result<Listing, SourceError> {
        let start = Instant::now();
        let response = self.client.get(self.base_url.clone()).send().await?;
        let status = response.status();
        tracing::debug!(
            "GET {} -> {} in {}ms",
            self.base_url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if status != StatusCode::OK {
            return Ok(Listing {
                status: status.as_u16(),
                names: Vec::new(),
            });
        }

        let body = response.text().await?;
        Ok(Listing {
            status: status.as_u16(),
            names: parse_archive_listing(&body),
        })
    }

    async fn fetch_archive(&self, name: &str, dest_dir: &Path) -> Result<u16, SourceError> {
        validate_archive_name(name)?;
        let url = self.archive_url(name);

        let start = Instant::now();
        let mut response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!("GET {} -> {}", url, status.as_u16());
            return Ok(status.as_u16());
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(name);
        let mut file = tokio::fs::File::create(&path).await?;

        let mut written: u64 = 0;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Download of {} failed after {} bytes, partial file left at {}",
                        name,
                        written,
                        path.display()
                    );
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(
            "GET {} -> 200, {} bytes in {}ms",
            url,
            written,
            start.elapsed().as_millis()
        );
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_archive_url_appends_segment() {
        let source =
            HttpArchiveSource::new("https://example.org/Censos/Indice_de_Gini", None, None)
                .unwrap();
        assert_eq!(
            source.archive_url("AC.zip").as_str(),
            "https://example.org/Censos/Indice_de_Gini/AC.zip"
        );
    }

    #[test]
    fn test_archive_url_with_trailing_slash() {
        let source =
            HttpArchiveSource::new("https://example.org/Indice_de_Gini/", None, None).unwrap();
        assert_eq!(
            source.archive_url("Sao Paulo.zip").as_str(),
            "https://example.org/Indice_de_Gini/Sao%20Paulo.zip"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpArchiveSource::new("not a url", None, None).err().unwrap();
        assert!(matches!(err, SourceError::InvalidUrl { .. }));

        let err = HttpArchiveSource::new("mailto:someone@example.org", None, None)
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::InvalidUrl { .. }));
    }

    const LISTING_PAGE: &str = "<html><body><table>\
        <tr><th>Name</th><th>Size</th></tr>\
        <tr><td>AC.zip</td><td>4K</td></tr>\
        <tr><td>leiame.txt</td><td>1K</td></tr>\
        <tr><td>RO.zip</td><td>9K</td></tr>\
        </table></body></html>";

    /// Serve canned `(status, body)` responses by request path on a local port.
    /// Unknown paths get a 404.
    async fn serve(routes: HashMap<&'static str, (u16, Vec<u8>)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = routes
                    .get(path.as_str())
                    .cloned()
                    .unwrap_or((404, b"not found".to_vec()));
                let head = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}/gini", addr)
    }

    #[tokio::test]
    async fn test_list_archives_parses_page() {
        let base = serve(HashMap::from([(
            "/gini",
            (200, LISTING_PAGE.as_bytes().to_vec()),
        )]))
        .await;
        let source = HttpArchiveSource::new(&base, None, None).unwrap();

        let listing = source.list_archives().await.unwrap();
        assert_eq!(listing.status, 200);
        assert_eq!(listing.names, vec!["AC.zip", "RO.zip"]);
    }

    #[tokio::test]
    async fn test_list_archives_reports_status() {
        let base = serve(HashMap::new()).await;
        let source = HttpArchiveSource::new(&base, None, None).unwrap();

        let listing = source.list_archives().await.unwrap();
        assert_eq!(listing.status, 404);
        assert!(listing.names.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_archive_writes_body() {
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let base = serve(HashMap::from([("/gini/AC.zip", (200, body.clone()))])).await;
        let source = HttpArchiveSource::new(&base, None, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("zipfiles");

        let status = source.fetch_archive("AC.zip", &dest).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(std::fs::read(dest.join("AC.zip")).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_archive_non_ok_writes_nothing() {
        let base = serve(HashMap::new()).await;
        let source = HttpArchiveSource::new(&base, None, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("zipfiles");

        let status = source.fetch_archive("RO.zip", &dest).await.unwrap();
        assert_eq!(status, 404);
        assert!(!dest.join("RO.zip").exists());
    }

    #[tokio::test]
    async fn test_fetch_rejects_path_names() {
        let source = HttpArchiveSource::new("http://127.0.0.1:9/", None, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = source
            .fetch_archive("../escape.zip", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidName(_)));
    }
}
