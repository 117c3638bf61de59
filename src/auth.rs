//! Resolution of `access-token` credentials to OSM identities.

use crate::config::{AuthConfig, StaticToken};
use crate::model::OsmIdentity;
use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const ACCESS_TOKEN_HEADER: &str = "access-token";

const OSM_USER_DETAILS_PATH: &str = "api/0.6/user/details.json";

#[async_trait::async_trait]
pub trait TokenValidator: Send + Sync {
    /// `Ok(None)` when the token is not valid. `Err` only when validity could
    /// not be determined.
    async fn validate(&self, token: &str) -> Result<Option<OsmIdentity>>;
}

/// Fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, OsmIdentity>,
}

impl StaticTokenValidator {
    pub fn new(tokens: impl IntoIterator<Item = (String, OsmIdentity)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(tokens: &[StaticToken]) -> Self {
        Self::new(tokens.iter().map(|t| {
            (
                t.token.clone(),
                OsmIdentity::new(t.osm_id, t.username.clone()),
            )
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait::async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<Option<OsmIdentity>> {
        Ok(self.tokens.get(token).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct UserDetailsResponse {
    user: UserDetails,
}

#[derive(Debug, Deserialize)]
struct UserDetails {
    id: i64,
    display_name: String,
}

/// Validates OAuth2 tokens by asking the OSM API who they belong to.
#[derive(Debug, Clone)]
pub struct OsmTokenValidator {
    client: reqwest::Client,
    details_url: url::Url,
}

impl OsmTokenValidator {
    pub fn new(osm_api_url: &str) -> Result<Self> {
        let mut base = url::Url::parse(osm_api_url)
            .with_context(|| format!("Invalid OSM API URL: {}", osm_api_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let details_url = base
            .join(OSM_USER_DETAILS_PATH)
            .context("Failed to build OSM user details URL")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            details_url,
        })
    }
}

#[async_trait::async_trait]
impl TokenValidator for OsmTokenValidator {
    async fn validate(&self, token: &str) -> Result<Option<OsmIdentity>> {
        let response = self
            .client
            .get(self.details_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach OSM API")?;

        match response.status() {
            StatusCode::OK => {
                let details: UserDetailsResponse = response
                    .json()
                    .await
                    .context("Unexpected OSM user details response")?;
                Ok(Some(OsmIdentity::new(
                    details.user.id,
                    details.user.display_name,
                )))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            other => bail!("OSM API answered {} while validating a token", other),
        }
    }
}

/// Tries each validator in order; the first identity wins.
#[derive(Clone, Default)]
pub struct ChainValidator {
    validators: Vec<Arc<dyn TokenValidator>>,
}

impl ChainValidator {
    pub fn new(validators: Vec<Arc<dyn TokenValidator>>) -> Self {
        Self { validators }
    }
}

#[async_trait::async_trait]
impl TokenValidator for ChainValidator {
    async fn validate(&self, token: &str) -> Result<Option<OsmIdentity>> {
        for validator in &self.validators {
            if let Some(identity) = validator.validate(token).await? {
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }
}

/// Static tokens are consulted before the OSM API. With neither configured,
/// every token is rejected.
pub fn build_validator(config: &AuthConfig) -> Result<Arc<dyn TokenValidator>> {
    let mut validators: Vec<Arc<dyn TokenValidator>> = Vec::new();

    let static_tokens = StaticTokenValidator::from_config(&config.static_tokens);
    if !static_tokens.is_empty() {
        validators.push(Arc::new(static_tokens));
    }
    if let Some(osm_api_url) = &config.osm_api_url {
        validators.push(Arc::new(OsmTokenValidator::new(osm_api_url)?));
    }

    if validators.is_empty() {
        log::warn!("No token validator configured: every write request will be rejected");
    }
    Ok(Arc::new(ChainValidator::new(validators)))
}
