//! Catalog fetcher.
//!
//! Pulls the catalog and the global allow-list from their two remote
//! endpoints over HTTPS with rustls (memory-safe TLS) and writes successful
//! results through to the cache. Plain HTTP is accepted so a loopback
//! endpoint can serve tests.
//!
//! Results apply in issue order: each refresh takes a sequence number up
//! front, and the cache discards any result overtaken by a newer one. A
//! failed fetch leaves the previous snapshot untouched.

use crate::cache::CatalogCache;
use crate::descriptor::{dedup_by_entry, GlobalAllowEntry, WebAppDescriptor};
use crate::CatalogError;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HOST, USER_AGENT};
use hyper::{Method, Request, Uri};
use rustls::ClientConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Catalog endpoint returning a flat JSON array of descriptors
    pub catalog_url: String,
    /// Allow-list endpoint returning a flat JSON array of entries
    pub allow_list_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://portal.example.com/api/catalog".to_string(),
            allow_list_url: "https://portal.example.com/api/allowlist".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "WebPortal/0.1 (Catalog Fetcher)".to_string(),
            max_body_size: 4 * 1024 * 1024, // 4 MB
        }
    }
}

/// Fetcher statistics.
#[derive(Debug, Default)]
pub struct FetcherStats {
    pub fetches_issued: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub stale_discards: AtomicU64,
    pub bytes_downloaded: AtomicU64,
}

/// Fetches both endpoints and keeps the cache as the single point of truth.
pub struct CatalogFetcher {
    config: FetcherConfig,
    cache: Arc<CatalogCache>,
    /// Issue-time sequence source for catalog fetches
    catalog_seq: AtomicU64,
    /// Issue-time sequence source for allow-list fetches
    allow_seq: AtomicU64,
    stats: FetcherStats,
}

impl CatalogFetcher {
    /// Create a new fetcher writing through to `cache`.
    pub fn new(config: FetcherConfig, cache: Arc<CatalogCache>) -> Self {
        info!(
            "Catalog fetcher initialized (catalog: {}, allow-list: {})",
            config.catalog_url, config.allow_list_url
        );

        Self {
            config,
            cache,
            catalog_seq: AtomicU64::new(0),
            allow_seq: AtomicU64::new(0),
            stats: FetcherStats::default(),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(cache: Arc<CatalogCache>) -> Self {
        Self::new(FetcherConfig::default(), cache)
    }

    /// Fetch the catalog endpoint and replace the cached snapshot.
    ///
    /// Duplicate entries collapse (first wins) before the store. On any
    /// failure the cache keeps its previous snapshot and the error is
    /// returned for the caller to surface.
    pub async fn refresh_catalog(&self) -> Result<Vec<WebAppDescriptor>, CatalogError> {
        // Sequence is taken at issue time, not completion time, so overlapping
        // refreshes resolve in the order they were started.
        let seq = self.catalog_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let body = match self.get(&self.config.catalog_url).await {
            Ok(body) => body,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Catalog fetch failed, keeping previous snapshot: {}", e);
                return Err(e);
            }
        };

        let descriptors: Vec<WebAppDescriptor> = match serde_json::from_slice(&body) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Catalog decode failed, keeping previous snapshot: {}", e);
                return Err(CatalogError::Decode(e));
            }
        };
        let descriptors = dedup_by_entry(descriptors);

        if self.cache.store_catalog_sequenced(seq, descriptors.clone())? {
            info!("Catalog refreshed: {} apps", descriptors.len());
        } else {
            self.stats.stale_discards.fetch_add(1, Ordering::Relaxed);
        }

        Ok(descriptors)
    }

    /// Fetch the allow-list endpoint and replace the cached list.
    ///
    /// Same ordering and failure behavior as [`refresh_catalog`](Self::refresh_catalog).
    pub async fn refresh_allow_list(&self) -> Result<Vec<GlobalAllowEntry>, CatalogError> {
        let seq = self.allow_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let body = match self.get(&self.config.allow_list_url).await {
            Ok(body) => body,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Allow-list fetch failed, keeping previous list: {}", e);
                return Err(e);
            }
        };

        let entries: Vec<GlobalAllowEntry> = match serde_json::from_slice(&body) {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Allow-list decode failed, keeping previous list: {}", e);
                return Err(CatalogError::Decode(e));
            }
        };

        if self.cache.store_global_allow_sequenced(seq, entries.clone())? {
            info!("Global allow-list refreshed: {} entries", entries.len());
        } else {
            self.stats.stale_discards.fetch_add(1, Ordering::Relaxed);
        }

        Ok(entries)
    }

    /// One unauthenticated GET with the configured timeout.
    async fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.stats.fetches_issued.fetch_add(1, Ordering::Relaxed);

        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| CatalogError::InvalidUrl(e.to_string()))?;

        let body = tokio::time::timeout(self.config.timeout, self.execute(&uri))
            .await
            .map_err(|_| CatalogError::Network(format!("Timeout fetching {}", url)))??;

        self.stats
            .bytes_downloaded
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        debug!("GET {} -> {} bytes", url, body.len());
        Ok(body)
    }

    async fn execute(&self, uri: &Uri) -> Result<Vec<u8>, CatalogError> {
        let host = uri
            .host()
            .ok_or_else(|| CatalogError::InvalidUrl("No host in URL".to_string()))?
            .to_string();
        let is_https = uri.scheme_str() == Some("https");
        let port = uri.port_u16().unwrap_or(if is_https { 443 } else { 80 });

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(USER_AGENT, &self.config.user_agent)
            .header(HOST, host.as_str())
            .body(Full::new(Bytes::new()))
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let addr = format!("{}:{}", host, port);
        let stream = tokio::net::TcpStream::connect(&addr)
            .await
            .map_err(|e| CatalogError::Network(format!("Connect {} failed: {}", addr, e)))?;

        let response_result = if is_https {
            let mut root_store = rustls::RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let tls_config = ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let connector = TlsConnector::from(Arc::new(tls_config));
            let server_name = rustls::pki_types::ServerName::try_from(host.clone())
                .map_err(|_| CatalogError::InvalidUrl(format!("Invalid server name: {}", host)))?;

            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| CatalogError::Network(format!("TLS handshake failed: {}", e)))?;

            let io = hyper_util::rt::TokioIo::new(tls_stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| CatalogError::Network(e.to_string()))?;

            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    warn!("Connection error: {}", e);
                }
            });

            sender.send_request(request).await
        } else {
            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| CatalogError::Network(e.to_string()))?;

            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    warn!("Connection error: {}", e);
                }
            });

            sender.send_request(request).await
        };

        let response = response_result.map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Network(format!(
                "{} returned {}",
                uri, status
            )));
        }

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| CatalogError::Network(format!("Body read failed: {}", e)))?;
        let body = collected.to_bytes();

        if body.len() > self.config.max_body_size {
            return Err(CatalogError::Network(format!(
                "Response too large: {} bytes",
                body.len()
            )));
        }

        Ok(body.to_vec())
    }

    /// Get fetcher statistics: (issued, failures, stale discards, bytes).
    pub fn stats(&self) -> (u64, u64, u64, u64) {
        (
            self.stats.fetches_issued.load(Ordering::Relaxed),
            self.stats.fetch_failures.load(Ordering::Relaxed),
            self.stats.stale_discards.load(Ordering::Relaxed),
            self.stats.bytes_downloaded.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn test_cache() -> Arc<CatalogCache> {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let config = CacheConfig {
            storage_dir: std::env::temp_dir().join(format!(
                "webportal-test-fetcher-{}-{}",
                std::process::id(),
                seq
            )),
            ..CacheConfig::default()
        };
        Arc::new(CatalogCache::open(config).unwrap())
    }

    /// Serve one canned HTTP/1.1 response on a loopback port.
    async fn serve_once(body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    async fn serve_status_once(status_line: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status_line
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_config_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.catalog_url.starts_with("https://"));
        assert!(config.allow_list_url.starts_with("https://"));
    }

    #[tokio::test]
    async fn test_refresh_catalog_populates_cache() {
        let base = serve_once(
            r#"[{"entry": "chat.example.com", "name": "Chat", "category": "Comms",
                 "urlsPermitted": ["*.example.com/*"]}]"#,
        )
        .await;

        let cache = test_cache();
        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                catalog_url: format!("{}/catalog", base),
                ..FetcherConfig::default()
            },
            cache.clone(),
        );

        let apps = fetcher.refresh_catalog().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].entry, "chat.example.com");

        assert_eq!(cache.catalog().len(), 1);
        assert_eq!(cache.categorized()[0].name, "Comms");
        assert!(!cache.is_expired());

        let (issued, failures, stale, bytes) = fetcher.stats();
        assert_eq!(issued, 1);
        assert_eq!(failures, 0);
        assert_eq!(stale, 0);
        assert!(bytes > 0);
    }

    #[tokio::test]
    async fn test_refresh_allow_list_populates_cache() {
        let base = serve_once(r#"[{"entry": "cdn.assets.net", "name": "Shared CDN"}]"#).await;

        let cache = test_cache();
        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                allow_list_url: format!("{}/allowlist", base),
                ..FetcherConfig::default()
            },
            cache.clone(),
        );

        let entries = fetcher.refresh_allow_list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(cache.global_allow()[0].entry, "cdn.assets.net");
    }

    fn descriptor(entry: &str, name: &str) -> WebAppDescriptor {
        WebAppDescriptor {
            entry: entry.to_string(),
            name: name.to_string(),
            description: String::new(),
            icon: String::new(),
            image: String::new(),
            category: String::new(),
            urls_permitted: Vec::new(),
            location: Vec::new(),
            kind: crate::descriptor::AppKind::Leaf,
            parent: None,
            required_role: None,
        }
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_previous_snapshot() {
        let base = serve_once("this is not json").await;

        let cache = test_cache();
        cache
            .store_catalog_sequenced(1, vec![descriptor("kept.example.com", "Kept")])
            .unwrap();
        let fetched_at = cache.last_fetched_at();

        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                catalog_url: format!("{}/catalog", base),
                ..FetcherConfig::default()
            },
            cache.clone(),
        );

        let result = fetcher.refresh_catalog().await;
        assert!(matches!(result, Err(CatalogError::Decode(_))));
        assert_eq!(cache.catalog()[0].entry, "kept.example.com");
        // A failed fetch must not move the freshness stamp either.
        assert_eq!(cache.last_fetched_at(), fetched_at);

        let (_, failures, _, _) = fetcher.stats();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_error_status_is_a_network_error() {
        let base = serve_status_once("503 Service Unavailable").await;

        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                catalog_url: format!("{}/catalog", base),
                ..FetcherConfig::default()
            },
            test_cache(),
        );

        let result = fetcher.refresh_catalog().await;
        assert!(matches!(result, Err(CatalogError::Network(_))));
    }

    #[tokio::test]
    async fn test_duplicate_entries_collapse_on_refresh() {
        let base = serve_once(
            r#"[{"entry": "a.example.com", "name": "First"},
                {"entry": "a.example.com", "name": "Second"}]"#,
        )
        .await;

        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                catalog_url: format!("{}/catalog", base),
                ..FetcherConfig::default()
            },
            test_cache(),
        );

        let apps = fetcher.refresh_catalog().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "First");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_url() {
        let fetcher = CatalogFetcher::new(
            FetcherConfig {
                catalog_url: "not a url".to_string(),
                ..FetcherConfig::default()
            },
            test_cache(),
        );

        let result = fetcher.refresh_catalog().await;
        assert!(matches!(result, Err(CatalogError::InvalidUrl(_))));
    }
}
