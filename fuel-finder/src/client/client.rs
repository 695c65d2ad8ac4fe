//! Fuel Finder HTTP client.
//!
//! Provides async methods for the Fuel Finder API. Owns the OAuth token and
//! a response cache, and transparently renews credentials once when the API
//! rejects a request with 401 or 403.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::Stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, Ttl, TtlCache};
use crate::pagination::{self, PageErrors};

use super::error::ClientError;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::types::{
    FuelPrice, FuelStation, OAuthResponse, OAuthToken, RenewalRequest, TokenRenewal, TokenRequest,
};

/// Default base URL for the Fuel Finder API.
const DEFAULT_BASE_URL: &str = "https://www.fuel-finder.service.gov.uk/api/";

/// The only API major version this client speaks.
pub const SUPPORTED_API_VERSION: u32 = 1;

/// Batches are numbered from one.
pub const MIN_BATCH_NUMBER: u32 = 1;

/// Default TTL for `get`/`post` responses, in seconds. Negative disables caching.
const DEFAULT_CACHE_TTL_SECS: i64 = -1;

/// Default TTL for station and price batches, in seconds.
const DEFAULT_BATCH_CACHE_TTL_SECS: i64 = 300;

const GENERATE_TOKEN_PATH: &str = "oauth/generate_access_token";
const REGENERATE_TOKEN_PATH: &str = "oauth/regenerate_access_token";

/// Configuration for the Fuel Finder client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Base URL for the API, without the version segment
    pub base_url: String,
    /// API major version
    pub api_version: u32,
    /// TTL in seconds for `get`/`post` responses (0 = forever, negative = off)
    pub cache_ttl: i64,
    /// TTL in seconds for station and price batches
    pub batch_cache_ttl: i64,
    /// How `get_all_*` treats a failed batch
    pub page_errors: PageErrors,
}

impl ClientConfig {
    /// Create a new config with the given credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: SUPPORTED_API_VERSION,
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            batch_cache_ttl: DEFAULT_BATCH_CACHE_TTL_SECS,
            page_errors: PageErrors::default(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Set the default response TTL in seconds.
    pub fn with_cache_ttl(mut self, secs: i64) -> Self {
        self.cache_ttl = secs;
        self
    }

    /// Set the batch TTL in seconds.
    pub fn with_batch_cache_ttl(mut self, secs: i64) -> Self {
        self.batch_cache_ttl = secs;
        self
    }

    pub fn with_page_errors(mut self, page_errors: PageErrors) -> Self {
        self.page_errors = page_errors;
        self
    }
}

/// A resource served in numbered batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Station metadata
    Stations,
    /// Pump prices
    Prices,
}

impl Resource {
    /// Path relative to the versioned base.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Stations => "pfs",
            Resource::Prices => "pfs/fuel-prices",
        }
    }
}

/// How a request interacts with the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Serve a fresh cached response, else fetch and cache.
    #[default]
    Default,
    /// Serve any cached response, stale or not, else fetch and cache.
    ForceCache,
    /// Always fetch, then overwrite the cache.
    Reload,
    /// Same as `Reload`.
    NoCache,
    /// Always fetch; the cache is neither read nor written.
    NoStore,
    /// Serve any cached response or nothing. Never touches the network.
    OnlyIfCached,
}

/// Per-request options for [`FuelFinderClient::get`] and [`FuelFinderClient::post`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub cache: CacheMode,
    /// Overrides the client's default TTL for this response
    pub ttl: Option<Ttl>,
    /// Whether a 401/403 triggers credential renewal and one retry
    pub retry: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self {
            body: None,
            cache: CacheMode::Default,
            ttl: None,
            retry: true,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable credential renewal on 401/403.
    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Fuel Finder API client.
///
/// Holds at most one OAuth token. The token is only replaced by a
/// successful [`authenticate`](Self::authenticate) or
/// [`refresh_token`](Self::refresh_token); failures leave it as it was.
pub struct FuelFinderClient<T = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    api_url: Url,
    token: RwLock<Option<OAuthToken>>,
    /// Serializes credential renewal between concurrent requests.
    recovery: Mutex<()>,
    cache: TtlCache<Value>,
}

impl FuelFinderClient<ReqwestTransport> {
    /// Create a new client using reqwest with default settings.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_transport(config, ReqwestTransport::new()?)
    }
}

impl<T: Transport> FuelFinderClient<T> {
    /// Create a new client over the given transport.
    ///
    /// Fails if the configured API version is not supported.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        if config.api_version != SUPPORTED_API_VERSION {
            return Err(ClientError::Configuration {
                message: format!("API version {} is not supported", config.api_version),
            });
        }

        let api_url = versioned_url(&config.base_url, config.api_version)?;
        let cache = TtlCache::new(&CacheConfig::new(Ttl::from_secs(config.cache_ttl)));

        Ok(Self {
            transport,
            config,
            api_url,
            token: RwLock::new(None),
            recovery: Mutex::new(()),
            cache,
        })
    }

    /// Start out holding `token`.
    pub fn with_token(self, token: OAuthToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
            ..self
        }
    }

    /// The currently held token.
    pub async fn token(&self) -> Option<OAuthToken> {
        self.token.read().await.clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Versioned base that request paths are resolved against.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// The response cache owned by this client.
    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve a path (or absolute URL) against the versioned base.
    pub fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        self.api_url.join(path).map_err(|e| ClientError::InvalidUrl {
            url: path.to_string(),
            message: e.to_string(),
        })
    }

    /// `GET` a path. Returns `None` only for [`CacheMode::OnlyIfCached`] misses.
    pub async fn get(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.resolve(path)?;
        self.request(Method::GET, url, options).await
    }

    /// `POST` to a path. Returns `None` only for [`CacheMode::OnlyIfCached`] misses.
    pub async fn post(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.resolve(path)?;
        self.request(Method::POST, url, options).await
    }

    /// Cache-aside dispatch.
    async fn request(
        &self,
        method: Method,
        url: Url,
        options: RequestOptions,
    ) -> Result<Option<Value>, ClientError> {
        let key = cache_key(&method, &url);
        let RequestOptions {
            body,
            cache,
            ttl,
            retry,
        } = options;
        let fetch = || self.fetch(&method, &url, body.as_ref(), retry);

        match cache {
            CacheMode::Default | CacheMode::ForceCache => {
                let allow_stale = cache == CacheMode::ForceCache;
                if let Some(value) = self.cache.get(&key, allow_stale).await {
                    return Ok(Some(value));
                }
                let value = fetch().await?;
                Ok(Some(self.cache.set(key, value, ttl).await))
            }
            CacheMode::Reload | CacheMode::NoCache => {
                let value = fetch().await?;
                Ok(Some(self.cache.set(key, value, ttl).await))
            }
            CacheMode::NoStore => fetch().await.map(Some),
            CacheMode::OnlyIfCached => Ok(self.cache.get(&key, true).await),
        }
    }

    /// Network dispatch with at most one credential renewal and retry.
    async fn fetch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        retry: bool,
    ) -> Result<Value, ClientError> {
        let mut recovered = false;

        loop {
            let (response, presented) = self.send(method, url, body).await?;

            if response.is_auth_failure() {
                if recovered {
                    warn!(%method, %url, status = %response.status, "rejected again after renewing credentials");
                    return Err(ClientError::Authentication {
                        message: format!(
                            "{method} {url} rejected with {} after renewing credentials",
                            response.status
                        ),
                    });
                }
                if retry {
                    debug!(%method, %url, status = %response.status, "authorization rejected, renewing credentials");
                    self.recover(presented.as_deref()).await?;
                    recovered = true;
                    continue;
                }
            }

            return check_status(response);
        }
    }

    /// One attempt with the current credentials.
    ///
    /// Also returns the access token that was presented, if any.
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<(HttpResponse, Option<String>), ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let presented = match self.token.read().await.as_ref() {
            Some(token) => {
                let value = HeaderValue::from_str(&token.authorization()).map_err(|_| {
                    ClientError::Authentication {
                        message: "access token is not a valid header value".to_string(),
                    }
                })?;
                headers.insert(AUTHORIZATION, value);
                Some(token.access_token.clone())
            }
            None => None,
        };

        debug!(%method, %url, "sending request");
        let response = self
            .transport
            .send(HttpRequest {
                method: method.clone(),
                url: url.clone(),
                headers,
                body: body.cloned(),
            })
            .await?;

        Ok((response, presented))
    }

    /// Renew credentials after `rejected` was refused: refresh, else
    /// authenticate from scratch.
    async fn recover(&self, rejected: Option<&str>) -> Result<(), ClientError> {
        let _guard = self.recovery.lock().await;

        let current = self
            .token
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone());
        if current.is_some() && current.as_deref() != rejected {
            debug!("credentials already renewed by a concurrent request");
            return Ok(());
        }

        match self.refresh_token().await {
            Ok(()) => Ok(()),
            Err(refresh_err) => {
                debug!(error = %refresh_err, "token refresh failed, re-authenticating");
                self.authenticate().await.map_err(|auth_err| {
                    warn!(error = %auth_err, "re-authentication failed");
                    ClientError::Authentication {
                        message: format!(
                            "token refresh failed ({refresh_err}); re-authentication failed ({auth_err})"
                        ),
                    }
                })
            }
        }
    }

    /// One uncached `POST` without credential renewal.
    async fn post_once(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let url = self.resolve(path)?;
        let (response, _) = self.send(&Method::POST, &url, Some(&body)).await?;
        check_status(response)
    }

    /// Obtain a new token with the client credentials.
    pub async fn authenticate(&self) -> Result<(), ClientError> {
        let body = serde_json::to_value(TokenRequest {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        })
        .map_err(|e| ClientError::json(e, None))?;

        let response = self.post_once(GENERATE_TOKEN_PATH, body).await?;
        let response =
            OAuthResponse::deserialize(&response).map_err(|e| ClientError::json(e, None))?;

        let token = response
            .data
            .filter(|token| !token.access_token.is_empty())
            .ok_or_else(|| ClientError::Authentication {
                message: response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "no access token in response".to_string()),
            })?;

        *self.token.write().await = Some(token);
        info!("received access token");
        Ok(())
    }

    /// Renew the held token with its refresh token.
    ///
    /// Fails without a request if no refresh token is held.
    pub async fn refresh_token(&self) -> Result<(), ClientError> {
        let refresh_token = self
            .token
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| ClientError::Authentication {
                message: "refresh token does not exist".to_string(),
            })?;

        let body = serde_json::to_value(RenewalRequest {
            client_id: &self.config.client_id,
            refresh_token: &refresh_token,
        })
        .map_err(|e| ClientError::json(e, None))?;

        let response = self.post_once(REGENERATE_TOKEN_PATH, body).await?;

        // Accept the token either bare or wrapped like the issuance response.
        let renewal = response
            .get("data")
            .filter(|data| data.is_object())
            .cloned()
            .unwrap_or(response);
        let renewal =
            TokenRenewal::deserialize(&renewal).map_err(|e| ClientError::json(e, None))?;

        if renewal.access_token.is_empty() {
            return Err(ClientError::Authentication {
                message: "failed to refresh token".to_string(),
            });
        }

        let mut guard = self.token.write().await;
        let Some(token) = guard.as_mut() else {
            return Err(ClientError::Authentication {
                message: "token was cleared during refresh".to_string(),
            });
        };
        token.merge(renewal);
        info!("refreshed access token");
        Ok(())
    }

    /// Get one batch of station metadata.
    ///
    /// With `since`, only stations changed after that instant are returned.
    pub async fn get_fuel_stations(
        &self,
        batch: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<FuelStation>, ClientError> {
        self.get_batch(Resource::Stations, batch, since).await
    }

    /// Get one batch of prices.
    ///
    /// With `since`, only prices changed after that instant are returned.
    pub async fn get_fuel_prices(
        &self,
        batch: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<FuelPrice>, ClientError> {
        self.get_batch(Resource::Prices, batch, since).await
    }

    /// Get every station batch.
    pub async fn get_all_fuel_stations(&self) -> Result<Vec<FuelStation>, ClientError> {
        pagination::unpaginate(self.pages(Resource::Stations, None)).await
    }

    /// Get every price batch.
    pub async fn get_all_fuel_prices(&self) -> Result<Vec<FuelPrice>, ClientError> {
        pagination::unpaginate(self.pages(Resource::Prices, None)).await
    }

    /// Lazily stream the batches of a resource, starting at batch 1.
    ///
    /// Records are deserialized as `R`, so callers can choose between the
    /// typed DTOs and raw JSON.
    pub fn pages<R: DeserializeOwned>(
        &self,
        resource: Resource,
        since: Option<DateTime<Utc>>,
    ) -> impl Stream<Item = Result<Vec<R>, ClientError>> {
        pagination::exhaust(
            move |batch| self.get_batch::<R>(resource, batch, since),
            MIN_BATCH_NUMBER,
            self.config.page_errors,
        )
    }

    /// Get one batch of a resource, cached for the batch TTL.
    pub async fn get_batch<R: DeserializeOwned>(
        &self,
        resource: Resource,
        batch: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<R>, ClientError> {
        let mut url = self.resolve(resource.path())?;
        url.query_pairs_mut()
            .append_pair("batch-number", &batch.to_string());
        if let Some(since) = since {
            url.query_pairs_mut().append_pair(
                "effective-start-timestamp",
                &since.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }

        let options =
            RequestOptions::new().with_ttl(Ttl::from_secs(self.config.batch_cache_ttl));
        let body = match self.request(Method::GET, url, options).await? {
            Some(body) if !body.is_null() => body,
            _ => return Ok(Vec::new()),
        };

        Vec::<R>::deserialize(&body).map_err(|e| ClientError::json(e, Some(&body.to_string())))
    }
}

/// `{base_url}/v{version}/`, tolerating a base without a trailing slash.
fn versioned_url(base_url: &str, version: u32) -> Result<Url, ClientError> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    Url::parse(&base)
        .and_then(|base| base.join(&format!("v{version}/")))
        .map_err(|e| ClientError::Configuration {
            message: format!("invalid base URL {base_url}: {e}"),
        })
}

/// Cache key: method plus the fully resolved URL, query included.
fn cache_key(method: &Method, url: &Url) -> String {
    format!("{method} {url}")
}

fn check_status(response: HttpResponse) -> Result<Value, ClientError> {
    if response.status.is_success() {
        return response.into_json();
    }
    Err(ClientError::HttpStatus {
        status: response.status.as_u16(),
        reason: response.reason(),
    })
}
