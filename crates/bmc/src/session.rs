//! Authenticated Redfish session.
//!
//! A [`Session`] owns the HTTP client, the credentials and the session token.
//! The token is created once when the session is opened and refreshed
//! transparently when it ages out of its validity window or when the BMC
//! answers `401`. Refreshes are single-flight: concurrent requests that find
//! a stale token wait for one login instead of each issuing their own.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, ACCEPT, ETAG, IF_MATCH, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::detect::Manufacturer;
use crate::error::{BmcError, Result};

/// Redfish session collection.
const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";

/// Header carrying the session token.
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default token validity window (Redfish `SessionTimeout` default).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Minimum timeout for firmware uploads.
const UPLOAD_TIMEOUT_SECS: u64 = 600;

/// Tokens are refreshed this long before the BMC would expire them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Connection settings for a Redfish service.
#[derive(Debug, Clone)]
pub struct RedfishConfig {
    /// Base URL (e.g., `https://10.0.0.10`).
    pub base_url: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Skip TLS verification (for self-signed certs).
    pub insecure: bool,
    /// Deadline for a single request.
    pub timeout: Duration,
    /// How long a session token is trusted before it is refreshed.
    pub session_ttl: Duration,
    /// Skip detection and use this manufacturer.
    pub manufacturer: Option<Manufacturer>,
}

impl RedfishConfig {
    /// Create a config for `host`, which may be a bare address or a full URL.
    pub fn new(
        host: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let host = host.as_ref().trim();
        let base_url = match host.split_once("://") {
            Some((scheme, rest)) => format!("{scheme}://{}", rest.trim_end_matches('/')),
            None => format!("https://{}", host.trim_end_matches('/')),
        };

        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            insecure: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            manufacturer: None,
        }
    }

    /// Allow insecure TLS (self-signed certs).
    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the token validity window.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Force the manufacturer instead of detecting it.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: Option<Manufacturer>) -> Self {
        self.manufacturer = manufacturer;
        self
    }
}

/// Structured response from the management API.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Parsed JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

impl Response {
    async fn read(response: reqwest::Response) -> std::result::Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Version tag from the `ETag` header, falling back to `@odata.etag`.
    #[must_use]
    pub fn etag(&self) -> Option<String> {
        self.header(ETAG.as_str())
            .map(str::to_string)
            .or_else(|| {
                self.body
                    .get("@odata.etag")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
    }

    /// `Location` header (new sessions, task monitors).
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION.as_str())
    }

    /// Turn a non-2xx response into [`BmcError::Api`].
    ///
    /// # Errors
    /// Returns an error if the status is not successful.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(BmcError::Api {
                status: self.status.as_u16(),
                message: error_message(&self.body),
            })
        }
    }

    /// Deserialize the body.
    ///
    /// # Errors
    /// Returns an error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            warn!(error = %e, "Failed to parse response");
            BmcError::Serialization(e)
        })
    }
}

/// Pull the most useful message out of a Redfish error body.
fn error_message(body: &Value) -> String {
    body.pointer("/error/@Message.ExtendedInfo/0/Message")
        .or_else(|| body.pointer("/error/message"))
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string)
}

#[derive(Debug, Clone)]
struct Token {
    value: String,
    location: Option<String>,
    issued_at: Instant,
    generation: u64,
}

impl Token {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() + EXPIRY_MARGIN >= ttl
    }
}

/// Authenticated connection to one Redfish service.
pub struct Session {
    client: Client,
    config: RedfishConfig,
    token: RwLock<Option<Token>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
    logins: AtomicU64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.config.base_url)
            .field("username", &self.config.username)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an unauthenticated session.
    ///
    /// # Errors
    /// Returns error if the base URL is malformed or the HTTP client cannot be created.
    pub fn new(config: RedfishConfig) -> Result<Self> {
        let url = Url::parse(&config.base_url).map_err(|e| {
            BmcError::InvalidArgument(format!("invalid BMC address {}: {e}", config.base_url))
        })?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(BmcError::InvalidArgument(format!(
                "invalid BMC address {}: missing host",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| BmcError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            logins: AtomicU64::new(0),
        })
    }

    /// Connection settings.
    #[must_use]
    pub fn config(&self) -> &RedfishConfig {
        &self.config
    }

    /// Number of login round-trips performed so far.
    #[must_use]
    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Whether a token is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Establish a fresh token, replacing any existing one.
    ///
    /// # Errors
    /// Returns [`BmcError::Authentication`] if the credentials are rejected.
    pub async fn authenticate(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.login().await.map(|_| ())
    }

    /// Return a usable token, logging in again if it has aged out.
    async fn ensure_valid(&self) -> Result<Token> {
        let stale_generation = {
            let guard = self.token.read().await;
            match guard.as_ref() {
                Some(token) if !token.is_expired(self.config.session_ttl) => {
                    return Ok(token.clone());
                }
                Some(token) => token.generation,
                None => 0,
            }
        };

        self.refresh(stale_generation).await
    }

    /// Replace the token identified by `stale_generation`.
    ///
    /// Only one refresh runs at a time; callers that queued behind it reuse
    /// the token it produced.
    async fn refresh(&self, stale_generation: u64) -> Result<Token> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(token) = self.token.read().await.as_ref() {
            if token.generation != stale_generation {
                debug!("Session already refreshed by a concurrent request");
                return Ok(token.clone());
            }
        }

        self.login().await
    }

    /// Create a Redfish session. Caller must hold `refresh_lock`.
    async fn login(&self) -> Result<Token> {
        info!(
            base_url = %self.config.base_url,
            username = %self.config.username,
            "Creating Redfish session"
        );
        self.logins.fetch_add(1, Ordering::SeqCst);

        let body = json!({
            "UserName": self.config.username,
            "Password": self.config.password,
        });
        let response = self
            .send(Method::POST, SESSIONS_PATH, Some(&body), &[], None)
            .await?;

        if matches!(
            response.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(BmcError::Authentication(format!(
                "credentials rejected for user {}",
                self.config.username
            )));
        }
        let response = response.error_for_status()?;

        let value = response
            .header(AUTH_TOKEN_HEADER)
            .map(str::to_string)
            .ok_or_else(|| {
                BmcError::Authentication("session created without an X-Auth-Token".to_string())
            })?;

        let token = Token {
            value,
            location: response.location().map(str::to_string),
            issued_at: Instant::now(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        *self.token.write().await = Some(token.clone());

        debug!(generation = token.generation, "Redfish session established");
        Ok(token)
    }

    /// Delete the session on the BMC. Safe to call more than once.
    ///
    /// # Errors
    /// Returns transport errors; a rejected logout is only logged.
    pub async fn close(&self) -> Result<()> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };
        let Some(location) = token.location else {
            debug!("Session has no location, nothing to delete");
            return Ok(());
        };

        info!(session = %location, "Deleting Redfish session");
        let response = self
            .send(Method::DELETE, &location, None, &[], Some(token.value))
            .await?;

        if !response.status.is_success() && response.status != StatusCode::NOT_FOUND {
            warn!(status = %response.status, "Session logout rejected");
        }
        Ok(())
    }

    /// Perform an authenticated request.
    ///
    /// A `401` triggers one session refresh and one retry; a second `401`
    /// fails with [`BmcError::Authentication`].
    ///
    /// # Errors
    /// Returns transport, timeout and authentication errors. Non-2xx statuses
    /// are returned as a [`Response`], not an error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<Response> {
        self.with_auth(|token| self.send(method.clone(), path, body, headers, Some(token)))
            .await
    }

    /// Authenticated GET.
    ///
    /// # Errors
    /// See [`Session::request`].
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, path, None, &[]).await
    }

    /// Authenticated GET of a JSON resource.
    ///
    /// # Errors
    /// Returns an error for non-2xx statuses or unparseable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.error_for_status()?.json()
    }

    /// Authenticated PATCH, optionally conditional on a version tag.
    ///
    /// # Errors
    /// See [`Session::request`].
    pub async fn patch(&self, path: &str, body: &Value, if_match: Option<&str>) -> Result<Response> {
        match if_match {
            Some(etag) => {
                self.request(Method::PATCH, path, Some(body), &[(IF_MATCH.as_str(), etag)])
                    .await
            }
            None => self.request(Method::PATCH, path, Some(body), &[]).await,
        }
    }

    /// Authenticated POST.
    ///
    /// # Errors
    /// See [`Session::request`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    /// Authenticated DELETE.
    ///
    /// # Errors
    /// See [`Session::request`].
    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.request(Method::DELETE, path, None, &[]).await
    }

    /// Authenticated multipart upload with `UpdateParameters` and `UpdateFile` parts.
    ///
    /// # Errors
    /// See [`Session::request`].
    pub async fn upload(
        &self,
        path: &str,
        parameters: &Value,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<Response> {
        let timeout = self
            .config
            .timeout
            .max(Duration::from_secs(UPLOAD_TIMEOUT_SECS));
        let url = self.url(path);
        info!(url = %url, file = %file_name, bytes = payload.len(), "Uploading firmware");

        self.with_auth(|token| {
            let payload = payload.clone();
            let url = url.clone();
            async move {
                let form = upload_form(parameters, file_name, payload)
                    .map_err(|e| transport_error(&e, timeout))?;
                let builder = self
                    .client
                    .post(&url)
                    .timeout(timeout)
                    .header(ACCEPT, "application/json")
                    .header(AUTH_TOKEN_HEADER, token)
                    .multipart(form);
                self.execute(builder, timeout).await
            }
        })
        .await
    }

    /// Run `attempt` with a valid token, refreshing once on `401`.
    async fn with_auth<F, Fut>(&self, attempt: F) -> Result<Response>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let token = self.ensure_valid().await?;
        let response = attempt(token.value.clone()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Request rejected with 401, refreshing session");
        let token = self.refresh(token.generation).await?;
        let response = attempt(token.value).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Err(BmcError::Authentication(
                "request rejected after session refresh".to_string(),
            ));
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
        token: Option<String>,
    ) -> Result<Response> {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Redfish request");

        let mut builder = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTH_TOKEN_HEADER, token);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        self.execute(builder, self.config.timeout).await
    }

    /// Send and read the whole response within `timeout`.
    async fn execute(&self, builder: RequestBuilder, timeout: Duration) -> Result<Response> {
        let exchange = async {
            let response = builder.send().await?;
            Response::read(response).await
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result.map_err(|e| transport_error(&e, timeout)),
            Err(_) => Err(BmcError::Timeout(timeout)),
        }
    }

    /// Resolve a resource path (or absolute URL) against the base URL.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.config.base_url)
        }
    }
}

fn upload_form(
    parameters: &Value,
    file_name: &str,
    payload: Vec<u8>,
) -> std::result::Result<Form, reqwest::Error> {
    let parameters = Part::text(parameters.to_string()).mime_str("application/json")?;
    let file = Part::bytes(payload)
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")?;

    Ok(Form::new()
        .part("UpdateParameters", parameters)
        .part("UpdateFile", file))
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> BmcError {
    if err.is_timeout() {
        BmcError::Timeout(timeout)
    } else {
        BmcError::Connection(err.to_string())
    }
}
