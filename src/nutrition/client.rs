use anyhow::Context;
use reqwest::{RequestBuilder, StatusCode};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::dto::{best_match, Listing, NewNutritionFact, NutritionFact};
use super::fallback;
use crate::config::NutritionApiConfig;
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("nutrition service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("nutrition service sent an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("nutrition service rejected the credentials")]
    Unauthorized,

    #[error("nutrition service answered {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl UpstreamError {
    /// Whether the offline dataset should stand in for the upstream answer.
    pub fn falls_back(&self) -> bool {
        !matches!(self, UpstreamError::Status { .. })
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

/// A lookup result; `degraded` marks data served from the offline dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub data: T,
    pub degraded: bool,
}

impl<T> Lookup<T> {
    fn live(data: T) -> Self {
        Self { data, degraded: false }
    }

    fn degraded(data: T) -> Self {
        Self { data, degraded: true }
    }
}

/// Basic-auth client for the external ingredient database.
#[derive(Clone)]
pub struct NutritionClient {
    http: reqwest::Client,
    config: NutritionApiConfig,
}

impl NutritionClient {
    pub fn new(config: NutritionApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build nutrition http client")?;
        Ok(Self { http, config })
    }

    pub fn mock_mode(&self) -> bool {
        self.config.mock_mode
    }

    pub async fn list_all(&self) -> Result<Lookup<Vec<NutritionFact>>, UpstreamError> {
        if self.config.mock_mode {
            return Ok(Lookup::degraded(fallback::ingredients()));
        }

        match self.fetch_all().await {
            Ok(facts) => Ok(Lookup::live(facts)),
            Err(e) => recover(e, "list", fallback::ingredients),
        }
    }

    /// `data` is `None` when no ingredient matches `name`.
    pub async fn search(&self, name: &str) -> Result<Lookup<Option<NutritionFact>>, UpstreamError> {
        if self.config.mock_mode {
            return Ok(Lookup::degraded(fallback::find(name)));
        }

        match self.fetch_one(name).await {
            Ok(found) => Ok(Lookup::live(found)),
            Err(e) => recover(e, "search", || fallback::find(name)),
        }
    }

    pub async fn add(&self, new: &NewNutritionFact) -> Result<Lookup<NutritionFact>, UpstreamError> {
        if self.config.mock_mode {
            return Ok(Lookup::degraded(fallback::echo_added(new)));
        }

        let request = self.http.post(&self.config.url).form(new);
        let body = match self.call(request).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                let e = UpstreamError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: String::new(),
                };
                return recover(e, "add", || fallback::echo_added(new));
            }
            Err(e) => return recover(e, "add", || fallback::echo_added(new)),
        };

        let stored = serde_json::from_str::<Listing>(&body)
            .ok()
            .and_then(|listing| listing.into_facts().into_iter().next());
        Ok(Lookup::live(stored.unwrap_or_else(|| {
            debug!(name = %new.name, "add accepted without a fact in the reply");
            NutritionFact {
                id: None,
                name: new.name.clone(),
                carbs_per_100g: Some(new.carbs),
                fat_per_100g: Some(new.fat),
                protein_per_100g: Some(new.protein),
                calories_per_100g: None,
            }
        })))
    }

    async fn fetch_all(&self) -> Result<Vec<NutritionFact>, UpstreamError> {
        match self.call(self.http.get(&self.config.url)).await? {
            Some(body) => Ok(serde_json::from_str::<Listing>(&body)?.into_facts()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_one(&self, name: &str) -> Result<Option<NutritionFact>, UpstreamError> {
        let request = self
            .http
            .get(&self.config.url)
            .query(&[("ingredient", name)]);
        let Some(body) = self.call(request).await? else {
            return Ok(None);
        };
        let facts = serde_json::from_str::<Listing>(&body)?.into_facts();
        // a lone answer is the upstream's own pick
        Ok(best_match(&facts, name).cloned().or_else(|| match facts.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }))
    }

    /// Sends the request; `Ok(None)` on 404, the body text on success.
    async fn call(&self, request: RequestBuilder) -> Result<Option<String>, UpstreamError> {
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "nutrition service replied");
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(UpstreamError::Unauthorized),
            s if s.is_success() => Ok(Some(response.text().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::Status { status, body })
            }
        }
    }
}

fn recover<T>(
    e: UpstreamError,
    operation: &str,
    offline: impl FnOnce() -> T,
) -> Result<Lookup<T>, UpstreamError> {
    if e.falls_back() {
        warn!(operation, error = %e, "nutrition service unavailable, serving offline data");
        Ok(Lookup::degraded(offline()))
    } else {
        error!(operation, error = %e, "nutrition service request failed");
        Err(e)
    }
}
