// # Gandi LiveDNS Provider
//
// This crate provides a Gandi LiveDNS v5 implementation of `RemoteClient`.
//
// Gandi stores one rrset per (name, type), so the value layout is
// `RecordSet` and the entry id is simply `name/TYPE`.
//
// ## Security Requirements
//
// - Token NEVER appears in logs or Debug output
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - LiveDNS v5: https://api.gandi.net/docs/livedns/
// - List domains: GET `/livedns/domains?page=&per_page=` (`total-count` header)
// - List records: GET `/livedns/domains/:fqdn/records?page=&per_page=`
//   (`total-count` response header)
// - Get rrset: GET `/livedns/domains/:fqdn/records/:name/:type`
// - Create rrset: POST `/livedns/domains/:fqdn/records`
// - Replace rrset: PUT `/livedns/domains/:fqdn/records/:name/:type`
// - Delete rrset: DELETE `/livedns/domains/:fqdn/records/:name/:type`
// - Zone lookup / creation: GET `/livedns/domains/:fqdn`, POST `/livedns/domains`

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use zonesync_core::config::{ProviderConfig, RetryConfig};
use zonesync_core::rate_limit::RateLimiter;
use zonesync_core::record::RecordKey;
use zonesync_core::retry::RetryPolicy;
use zonesync_core::traits::{RemoteClient, RemoteClientFactory, RemoteEntry, ValueLayout};
use zonesync_core::{Error, Result};

/// Gandi API base URL
const GANDI_API_BASE: &str = "https://api.gandi.net/v5";

/// Default listing page size
pub const DEFAULT_PER_PAGE: u32 = 500;

/// Gandi's TTL when an rrset does not carry one
const DEFAULT_TTL: u32 = 10800;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One rrset as LiveDNS serializes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RrSet {
    rrset_name: String,
    rrset_type: String,
    #[serde(default = "default_ttl")]
    rrset_ttl: u32,
    rrset_values: Vec<String>,
}

/// One entry of the domain listing
#[derive(Debug, Deserialize)]
struct Domain {
    fqdn: String,
}

/// Body of a PUT on an existing rrset
#[derive(Debug, Serialize)]
struct RrSetUpdate<'a> {
    rrset_ttl: u32,
    rrset_values: &'a [String],
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl From<RrSet> for RemoteEntry {
    fn from(rrset: RrSet) -> Self {
        let id = entry_id(&rrset.rrset_name, &rrset.rrset_type);
        RemoteEntry::new(rrset.rrset_name, rrset.rrset_type, rrset.rrset_ttl, rrset.rrset_values)
            .with_id(id)
    }
}

fn entry_id(name: &str, record_type: &str) -> String {
    let name = if name.is_empty() { "@" } else { name };
    format!("{name}/{record_type}")
}

/// Paging header and body of a successful response
struct GandiResponse {
    total_count: Option<usize>,
    body: String,
}

/// Gandi LiveDNS client
///
/// One instance is shared by every zone of a run; its [`RateLimiter`] is the
/// account-wide request budget.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the token.
pub struct GandiClient {
    /// Personal access token
    /// ⚠️ NEVER log this value
    token: String,

    /// API base URL, without trailing slash
    endpoint: String,

    /// Listing page size
    per_page: u32,

    /// HTTP client for API requests
    client: reqwest::Client,

    retry: RetryPolicy,

    limiter: RateLimiter,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for GandiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GandiClient")
            .field("token", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .field("per_page", &self.per_page)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GandiClient {
    /// Create a new Gandi client
    ///
    /// # Parameters
    ///
    /// - `token`: LiveDNS personal access token
    /// - `per_page`: Listing page size, [`DEFAULT_PER_PAGE`] when `None`
    /// - `endpoint`: API base URL, the public API when `None`
    /// - `retry`: Retry and pacing settings
    pub fn new(
        token: impl Into<String>,
        per_page: Option<u32>,
        endpoint: Option<String>,
        retry: &RetryConfig,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("Gandi token is required"));
        }

        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 {
            return Err(Error::config("per_page must be a positive integer"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("zonesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            token,
            endpoint: endpoint
                .unwrap_or_else(|| GANDI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            per_page,
            client,
            retry: RetryPolicy::from(retry),
            limiter: RateLimiter::new(Duration::from_millis(retry.min_request_interval_ms)),
        })
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// One HTTP exchange; non-2xx statuses become errors
    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<GandiResponse> {
        self.limiter.wait().await;

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::unavailable(format!("Request timed out: {e}"))
            } else {
                Error::unavailable(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        tracing::debug!("[gandi] {} {} -> {}", method, url, status);

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        let retry_after = header("retry-after").map(Duration::from_secs);
        let total_count = header("total-count").map(|n| n as usize);

        let body = response
            .text()
            .await
            .map_err(|e| Error::unavailable(format!("Failed to read response body: {e}")))?;

        if (200..300).contains(&status) {
            return Ok(GandiResponse { total_count, body });
        }

        let err = Error::from_status(status, body, retry_after);
        if let Error::RateLimited { retry_after } = &err {
            tracing::warn!("[gandi] Rate limited (HTTP 429), retry_after={:?}", retry_after);
            self.limiter
                .block_for(retry_after.unwrap_or(self.retry.rate_limit_backoff))
                .await;
        }
        Err(err)
    }

    /// Send with retries per the configured policy
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<GandiResponse> {
        let url = format!("{}{}", self.endpoint, path);
        let label = format!("{method} {path}");
        self.retry
            .run(&label, || self.send_once(&method, &url, query, body.as_ref()))
            .await
    }

    /// GET every page of a listing endpoint
    ///
    /// Pages start at 1 and stop on a short page or once `total-count`
    /// items have arrived.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let per_page = self.per_page as usize;
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [("page", page.to_string()), ("per_page", per_page.to_string())];
            let response = self.send(Method::GET, path, &query, None).await?;
            let batch: Vec<T> = serde_json::from_str(&response.body)?;
            let fetched = batch.len();
            items.extend(batch);

            tracing::debug!(
                "[gandi] {} page {}: {} items (total-count {:?})",
                path,
                page,
                fetched,
                response.total_count
            );

            let complete = response.total_count.is_some_and(|total| items.len() >= total);
            if fetched < per_page || complete {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    fn records_path(zone: &str) -> String {
        format!("/livedns/domains/{zone}/records")
    }

    fn rrset_path(zone: &str, id: &str) -> String {
        format!("/livedns/domains/{zone}/records/{id}")
    }
}

#[async_trait]
impl RemoteClient for GandiClient {
    fn provider_name(&self) -> &'static str {
        "gandi"
    }

    fn value_layout(&self) -> ValueLayout {
        ValueLayout::RecordSet
    }

    async fn list_records(&self, zone: &str) -> Result<Vec<RemoteEntry>> {
        let rrsets: Vec<RrSet> = self.get_all_pages(&Self::records_path(zone)).await?;
        Ok(rrsets.into_iter().map(RemoteEntry::from).collect())
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        let domains: Vec<Domain> = self.get_all_pages("/livedns/domains").await?;
        let mut zones: Vec<String> = domains
            .into_iter()
            .map(|d| d.fqdn.trim_end_matches('.').to_ascii_lowercase())
            .collect();
        zones.sort();
        Ok(zones)
    }

    async fn create_record(&self, zone: &str, entry: &RemoteEntry) -> Result<String> {
        let rrset = RrSet {
            rrset_name: entry.name.clone(),
            rrset_type: entry.record_type.clone(),
            rrset_ttl: entry.ttl,
            rrset_values: entry.values.clone(),
        };
        self.send(
            Method::POST,
            &Self::records_path(zone),
            &[],
            Some(serde_json::to_value(&rrset)?),
        )
        .await?;
        Ok(entry_id(&entry.name, &entry.record_type))
    }

    async fn update_record(&self, zone: &str, id: &str, entry: &RemoteEntry) -> Result<()> {
        let body = RrSetUpdate {
            rrset_ttl: entry.ttl,
            rrset_values: &entry.values,
        };
        self.send(
            Method::PUT,
            &Self::rrset_path(zone, id),
            &[],
            Some(serde_json::to_value(&body)?),
        )
        .await?;
        Ok(())
    }

    async fn delete_record(&self, zone: &str, id: &str) -> Result<()> {
        self.send(Method::DELETE, &Self::rrset_path(zone, id), &[], None)
            .await?;
        Ok(())
    }

    async fn fetch(&self, zone: &str, key: &RecordKey) -> Result<Vec<RemoteEntry>> {
        let id = entry_id(&key.name, key.record_type.as_str());
        match self
            .send(Method::GET, &Self::rrset_path(zone, &id), &[], None)
            .await
        {
            Ok(response) => {
                let rrset: RrSet = serde_json::from_str(&response.body)?;
                Ok(vec![rrset.into()])
            }
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn ensure_zone(&self, zone: &str) -> Result<bool> {
        match self
            .send(Method::GET, &format!("/livedns/domains/{zone}"), &[], None)
            .await
        {
            Ok(_) => return Ok(false),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        tracing::info!("[gandi] No zone for {}, creating it", zone);
        let body = serde_json::json!({ "fqdn": zone, "zone": {} });
        match self
            .send(Method::POST, "/livedns/domains", &[], Some(body))
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Err(Error::UnknownZone(format!(
                "{zone} is not registered at Gandi; register or transfer it to manage its DNS zone"
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Factory for creating Gandi clients
pub struct GandiFactory;

impl RemoteClientFactory for GandiFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        retry: &RetryConfig,
    ) -> Result<Arc<dyn RemoteClient>> {
        match config {
            ProviderConfig::Gandi {
                token,
                per_page,
                endpoint,
            } => Ok(Arc::new(GandiClient::new(
                token.clone(),
                *per_page,
                endpoint.clone(),
                retry,
            )?)),
            _ => Err(Error::config("Invalid config for Gandi provider")),
        }
    }
}

/// Register the Gandi provider with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonesync_provider_gandi::register(&registry).unwrap();
/// assert!(registry.has_provider("gandi"));
/// ```
pub fn register(registry: &zonesync_core::ProviderRegistry) -> Result<()> {
    registry.register_provider("gandi", Box::new(GandiFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use zonesync_core::record::RecordType;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            rate_limit_backoff_secs: 0,
            min_request_interval_ms: 0,
        }
    }

    fn client(server: &MockServer, per_page: u32, max_attempts: u32) -> GandiClient {
        GandiClient::new(
            "test-token",
            Some(per_page),
            Some(server.base_url()),
            &fast_retry(max_attempts),
        )
        .unwrap()
    }

    fn rrsets(range: std::ops::Range<usize>) -> serde_json::Value {
        json!(range
            .map(|i| json!({
                "rrset_name": format!("host{i}"),
                "rrset_type": "A",
                "rrset_ttl": 300,
                "rrset_values": ["192.0.2.1"],
            }))
            .collect::<Vec<_>>())
    }

    #[test]
    fn test_factory_creation() {
        let config = ProviderConfig::Gandi {
            token: "test_token".to_string(),
            per_page: None,
            endpoint: None,
        };
        assert!(GandiFactory.create(&config, &RetryConfig::default()).is_ok());
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Custom {
            factory: "other".to_string(),
            config: json!({}),
        };
        assert!(GandiFactory.create(&config, &RetryConfig::default()).is_err());
    }

    #[test]
    fn test_empty_token_and_zero_page_rejected() {
        assert!(GandiClient::new("", None, None, &RetryConfig::default()).is_err());
        assert!(GandiClient::new("t", Some(0), None, &RetryConfig::default()).is_err());
        let c = GandiClient::new("t", None, None, &RetryConfig::default()).unwrap();
        assert_eq!(c.per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let c = GandiClient::new("secret_token_12345", None, None, &RetryConfig::default()).unwrap();
        let debug_str = format!("{:?}", c);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("GandiClient"));
    }

    #[test]
    fn test_register() {
        let registry = zonesync_core::ProviderRegistry::new();
        register(&registry).unwrap();
        assert!(registry.has_provider("gandi"));
    }

    #[tokio::test]
    async fn test_pagination_follows_short_page() {
        let server = MockServer::start_async().await;
        let path = "/livedns/domains/example.com/records";
        let pages = [(1, 0..100), (2, 100..200), (3, 200..237)];
        let mut mocks = Vec::new();
        for (page, range) in pages {
            mocks.push(
                server
                    .mock_async(|when, then| {
                        when.method(GET)
                            .path(path)
                            .query_param("page", page.to_string())
                            .query_param("per_page", "100");
                        then.status(200).json_body(rrsets(range));
                    })
                    .await,
            );
        }

        let entries = client(&server, 100, 1).list_records("example.com").await.unwrap();

        assert_eq!(entries.len(), 237);
        for mock in &mocks {
            mock.assert_hits_async(1).await;
        }
        assert_eq!(entries[0].id.as_deref(), Some("host0/A"));
    }

    #[tokio::test]
    async fn test_pagination_stops_at_total_count() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/livedns/domains/example.com/records")
                    .query_param("page", "1");
                then.status(200)
                    .header("total-count", "2")
                    .json_body(rrsets(0..2));
            })
            .await;

        let entries = client(&server, 2, 1).list_records("example.com").await.unwrap();
        assert_eq!(entries.len(), 2);
        first.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_list_zones_pages_through_domains() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/livedns/domains")
                    .query_param("page", "1")
                    .query_param("per_page", "2");
                then.status(200)
                    .header("total-count", "3")
                    .json_body(json!([{ "fqdn": "example.org" }, { "fqdn": "Example.com." }]));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/livedns/domains")
                    .query_param("page", "2")
                    .query_param("per_page", "2");
                then.status(200)
                    .header("total-count", "3")
                    .json_body(json!([{ "fqdn": "a.net", "automatic_snapshots": true }]));
            })
            .await;

        let zones = client(&server, 2, 1).list_zones().await.unwrap();

        assert_eq!(zones, vec!["a.net", "example.com", "example.org"]);
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error_and_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/livedns/domains/example.com/records");
                then.status(401).body("invalid token");
            })
            .await;

        let err = client(&server, 100, 4)
            .list_records("example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_missing_zone_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/livedns/domains/nowhere.org/records");
                then.status(404).json_body(json!({ "message": "Domain not found" }));
            })
            .await;

        let err = client(&server, 100, 1)
            .list_records("nowhere.org")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_request_on_create_is_rejected() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/livedns/domains/example.com/records")
                    .json_body(json!({
                        "rrset_name": "www",
                        "rrset_type": "A",
                        "rrset_ttl": 300,
                        "rrset_values": ["not-an-ip"],
                    }));
                then.status(400).body("invalid value");
            })
            .await;

        let entry = RemoteEntry::new("www", "A", 300, ["not-an-ip"]);
        let err = client(&server, 100, 4)
            .create_record("example.com", &entry)
            .await
            .unwrap_err();
        assert_eq!(err, Error::rejected(400, "invalid value"));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_conflict_on_create_is_already_exists() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/livedns/domains/example.com/records");
                then.status(409).body("exists");
            })
            .await;

        let entry = RemoteEntry::new("www", "A", 300, ["192.0.2.1"]);
        let err = client(&server, 100, 1)
            .create_record("example.com", &entry)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_server_error_retried_then_unavailable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/livedns/domains/example.com/records/www/A");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = client(&server, 100, 3)
            .delete_record("example.com", "www/A")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteUnavailable(_)));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted_becomes_unavailable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/livedns/domains/example.com/records");
                then.status(429).header("retry-after", "0");
            })
            .await;

        let err = client(&server, 100, 2)
            .list_records("example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteUnavailable(_)));
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_update_puts_rrset() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/livedns/domains/example.com/records/@/TXT")
                    .json_body(json!({
                        "rrset_ttl": 600,
                        "rrset_values": ["\"v=spf1 -all\""],
                    }));
                then.status(201).json_body(json!({ "message": "DNS Record Created" }));
            })
            .await;

        let entry = RemoteEntry::new("@", "TXT", 600, ["\"v=spf1 -all\""]);
        client(&server, 100, 1)
            .update_record("example.com", "@/TXT", &entry)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_single_rrset() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/livedns/domains/example.com/records/www/CNAME");
                then.status(200).json_body(json!({
                    "rrset_name": "www",
                    "rrset_type": "CNAME",
                    "rrset_ttl": 300,
                    "rrset_values": ["web"],
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/livedns/domains/example.com/records/gone/A");
                then.status(404);
            })
            .await;

        let c = client(&server, 100, 1);
        let found = c
            .fetch("example.com", &RecordKey::new("www", RecordType::CNAME))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].values, vec!["web"]);

        let missing = c
            .fetch("example.com", &RecordKey::new("gone", RecordType::A))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_zone_creates_missing_zone() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/livedns/domains/new.org");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/livedns/domains")
                    .json_body(json!({ "fqdn": "new.org", "zone": {} }));
                then.status(201).json_body(json!({ "message": "Domain Created" }));
            })
            .await;

        assert!(client(&server, 100, 1).ensure_zone("new.org").await.unwrap());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_zone_unregistered_domain() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/livedns/domains/unregistered.org");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/livedns/domains");
                then.status(404);
            })
            .await;

        let err = client(&server, 100, 1)
            .ensure_zone("unregistered.org")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownZone(_)));
    }
}
