use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::RealtimeConfig;
use crate::error::SupabaseError;
use crate::realtime::Realtime;

pub const AUTH_ENDPOINT: &str = "auth/v1";
pub const ADMIN_ENDPOINT: &str = "auth/v1/admin";
pub const REST_ENDPOINT: &str = "rest/v1";
pub const STORAGE_ENDPOINT: &str = "storage/v1";
pub const REALTIME_ENDPOINT: &str = "realtime/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error body returned by the platform's HTTP APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    #[serde(rename = "msg")]
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)
    }
}

/// Main Supabase client
pub struct SupabaseClient {
    base_url: String,
    /// Anonymous or service-role key
    api_key: String,
    headers: HashMap<String, String>,
    http_client: HttpClient,
    realtime_config: RealtimeConfig,
}

impl SupabaseClient {
    /// Create a new client for the project at `base_url`
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SupabaseError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&format!("{}/{}/", base_url, REST_ENDPOINT))?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            headers: HashMap::new(),
            http_client: HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?,
            realtime_config: RealtimeConfig::default(),
        })
    }

    /// Add headers sent with every request
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the configuration used by channels from [`SupabaseClient::realtime`]
    pub fn with_realtime_config(mut self, config: RealtimeConfig) -> Self {
        self.realtime_config = config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Realtime entry point for this project
    pub fn realtime(&self) -> Realtime {
        Realtime::new(&self.base_url, &self.api_key).with_config(self.realtime_config.clone())
    }

    /// Start a request to `path` (relative to the base URL) carrying the API key.
    ///
    /// Custom headers replace the default `apikey` and `Authorization` values
    /// rather than adding a second one.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http_client.request(method, url).headers(self.header_map())
    }

    fn header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let defaults = [
            ("apikey", self.api_key.clone()),
            ("authorization", format!("Bearer {}", self.api_key)),
        ];
        let custom = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()));

        for (name, value) in defaults.into_iter().chain(custom) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header {}", name),
            }
        }
        headers
    }

    /// Execute `request` and decode the JSON response.
    ///
    /// Returns `Ok(None)` for `204 No Content`. A failed request whose body is
    /// an [`ErrorResponse`] yields [`SupabaseError::ApiError`].
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, SupabaseError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Supabase responded with {}", status);

        if !status.is_success() {
            return match response.json::<ErrorResponse>().await {
                Ok(error) => Err(SupabaseError::ApiError(error)),
                Err(e) => {
                    warn!("Unrecognized error body for status {}: {}", status, e);
                    Err(SupabaseError::UnexpectedStatus(status.as_u16()))
                }
            };
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(response.json::<T>().await?))
    }
}
