use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;
use url::Url;

use crate::model::{FeedEvent, Item, List};

pub const DEFAULT_BASE_URL: &str = "https://api.favespot.app/v1/";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("favespot: unauthorized")]
    Unauthorized,
    #[error("favespot: forbidden")]
    Forbidden,
    #[error("favespot: not found: {0}")]
    NotFound(String),
    #[error("favespot: rate limited: {0}")]
    RateLimited(String),
    #[error("favespot: api error {status}: {message}")]
    Upstream { status: u16, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    /// Opaque bearer token; acquiring and refreshing it is the session
    /// layer's problem, not this client's.
    pub auth_token: Option<String>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    auth_token: Option<String>,
    rate: RwLock<RateLimit>,
}

#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub used: f64,
    pub remaining: f64,
    pub reset_at: Option<SystemTime>,
}

/// One page of the activity feed plus the server-known total, which the
/// pagination controller uses to detect exhaustion.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    #[serde(default)]
    pub events: Vec<FeedEvent>,
    #[serde(default)]
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope<T> {
    data: T,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("favespot client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            auth_token: config.auth_token,
            rate: RwLock::new(RateLimit::default()),
        })
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate.read().unwrap().clone()
    }

    /// Every item the user owns, saved, or was recommended, across all
    /// lists. Unpaginated; this is the reconciliation snapshot.
    pub fn saved_items(&self, user_id: &str) -> Result<Vec<Item>> {
        if user_id.trim().is_empty() {
            bail!("favespot: user id required");
        }
        let path = format!("users/{}/items", user_id);
        self.fetch_json(&path, &[])
    }

    pub fn list(&self, list_id: &str) -> Result<List> {
        if list_id.trim().is_empty() {
            bail!("favespot: list id required");
        }
        let path = format!("lists/{}", list_id);
        self.fetch_json(&path, &[])
    }

    pub fn list_items(&self, list_id: &str) -> Result<Vec<Item>> {
        if list_id.trim().is_empty() {
            bail!("favespot: list id required");
        }
        let path = format!("lists/{}/items", list_id);
        self.fetch_json(&path, &[])
    }

    /// Fetch the half-open feed window `[from, to)`, server-sorted newest
    /// first.
    pub fn feed_page(&self, from: usize, to: usize) -> Result<FeedPage> {
        if to <= from {
            bail!("favespot: feed window must be non-empty");
        }
        let params = [
            ("from".to_string(), from.to_string()),
            ("to".to_string(), to.to_string()),
        ];
        self.fetch_json("feed", &params)
    }

    pub fn add_fave(&self, user_id: &str, list_id: &str, item_id: &str) -> Result<()> {
        if user_id.trim().is_empty() || list_id.trim().is_empty() || item_id.trim().is_empty() {
            bail!("favespot: add fave requires user, list, and item ids");
        }
        let form = vec![
            ("userId".to_string(), user_id.to_string()),
            ("listId".to_string(), list_id.to_string()),
            ("itemId".to_string(), item_id.to_string()),
        ];
        self.request(Method::POST, "faves", &[], Some(form))?;
        Ok(())
    }

    pub fn remove_fave(&self, user_id: &str, item_id: &str) -> Result<()> {
        if user_id.trim().is_empty() || item_id.trim().is_empty() {
            bail!("favespot: remove fave requires user and item ids");
        }
        let form = vec![
            ("userId".to_string(), user_id.to_string()),
            ("itemId".to_string(), item_id.to_string()),
        ];
        self.request(Method::POST, "faves/remove", &[], Some(form))?;
        Ok(())
    }

    fn fetch_json<T>(&self, path: &str, params: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.request(Method::GET, path, params, None)?;
        let envelope: Envelope<T> = resp
            .json()
            .with_context(|| format!("favespot: decode response for {}", path))?;
        Ok(envelope.data)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        form: Option<Vec<(String, String)>>,
    ) -> Result<Response> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            drop(pairs);
        }

        let mut req = self.http.request(method, url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(form_data) = form {
            req = req.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
            req = req.form(&form_data);
        }

        let resp = req.send()?;
        self.capture_rate(resp.headers());
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            let message = error_message(&body);
            Err(match status.as_u16() {
                401 => ApiError::Unauthorized.into(),
                403 => ApiError::Forbidden.into(),
                404 => ApiError::NotFound(message).into(),
                429 => ApiError::RateLimited(message).into(),
                code => ApiError::Upstream {
                    status: code,
                    message,
                }
                .into(),
            })
        }
    }

    fn capture_rate(&self, headers: &HeaderMap) {
        let remaining = header_float(headers, "x-ratelimit-remaining");
        let used = header_float(headers, "x-ratelimit-used");
        let reset = header_float(headers, "x-ratelimit-reset");
        if remaining == 0.0 && used == 0.0 && reset == 0.0 {
            return;
        }
        let reset_at = SystemTime::now().checked_add(Duration::from_secs_f64(reset.max(0.0)));
        let mut rate = self.rate.write().unwrap();
        rate.remaining = remaining;
        rate.used = used;
        rate.reset_at = reset_at;
    }
}

/// Error payloads are `{"error": "..."}` when the backend is behaving, raw
/// text otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|msg| msg.as_str())
                .map(|msg| msg.to_string())
        })
        .unwrap_or_else(|| body.to_string())
}

fn header_float(headers: &HeaderMap, key: &str) -> f64 {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}
