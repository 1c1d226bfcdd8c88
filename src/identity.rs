use failsafe::futures::CircuitBreaker;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::circuit_breaker::{create_provider_circuit_breaker, provider_error, ProviderBreaker};
use crate::config::Config;
use crate::errors::AppError;

const VERIFIED_TTL: Duration = Duration::from_secs(300);
const MULTI_TENANT_IDS: [&str; 3] = ["common", "organizations", "consumers"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Microsoft,
}

/// Identity asserted by an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub provider: Provider,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

impl BoolOrString {
    fn is_true(&self) -> bool {
        match self {
            BoolOrString::Bool(b) => *b,
            BoolOrString::Str(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<BoolOrString>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphProfile {
    mail: Option<String>,
    user_principal_name: Option<String>,
    display_name: Option<String>,
}

/// SHA-256 fingerprint of a provider token; raw tokens never become cache keys.
fn token_fingerprint(provider: Provider, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}:", provider).as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Client for verifying OAuth tokens with Google and Microsoft.
pub struct IdentityVerifier {
    client: reqwest::Client,
    cache: Cache<String, VerifiedIdentity>,
    google_breaker: ProviderBreaker,
    microsoft_breaker: ProviderBreaker,
    google_client_id: Option<String>,
    google_tokeninfo_url: String,
    microsoft_client_id: Option<String>,
    microsoft_tenant_id: String,
    microsoft_graph_url: String,
}

impl IdentityVerifier {
    /// Creates a new `IdentityVerifier`.
    ///
    /// # Arguments
    ///
    /// * `config` - Provider client ids and endpoint URLs.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create identity client: {}", e))
            })?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(VERIFIED_TTL)
            .build();

        Ok(Self {
            client,
            cache,
            google_breaker: create_provider_circuit_breaker(),
            microsoft_breaker: create_provider_circuit_breaker(),
            google_client_id: config.google_client_id.clone(),
            google_tokeninfo_url: config.google_tokeninfo_url.clone(),
            microsoft_client_id: config.microsoft_client_id.clone(),
            microsoft_tenant_id: config.microsoft_tenant_id.clone(),
            microsoft_graph_url: config.microsoft_graph_url.clone(),
        })
    }

    /// Verifies a Google ID token via the tokeninfo endpoint.
    ///
    /// # Returns
    ///
    /// * `Result<VerifiedIdentity, AppError>` - 401 for rejected tokens or a
    ///   foreign audience, 502 when Google cannot be reached.
    pub async fn verify_google(&self, id_token: &str) -> Result<VerifiedIdentity, AppError> {
        let client_id = self
            .google_client_id
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Google OAuth not configured".to_string()))?;

        let key = token_fingerprint(Provider::Google, id_token);
        if let Some(identity) = self.cache.get(&key).await {
            tracing::debug!("Google identity cache hit for {}", identity.email);
            return Ok(identity);
        }

        let request = self
            .client
            .get(&self.google_tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send();
        let response = self
            .google_breaker
            .call(request)
            .await
            .map_err(|e| provider_error("Google tokeninfo", e))?;

        if !response.status().is_success() {
            tracing::warn!("Google rejected ID token: {}", response.status());
            return Err(AppError::Unauthorized("Invalid Google token".to_string()));
        }

        let info: GoogleTokenInfo = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Google tokeninfo: {}", e))
        })?;

        if info.aud.as_deref() != Some(client_id) {
            tracing::warn!("Google token audience mismatch: {:?}", info.aud);
            return Err(AppError::Unauthorized("Invalid token audience".to_string()));
        }

        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::BadRequest("Email not provided by Google".to_string()))?
            .to_lowercase();

        let identity = VerifiedIdentity {
            provider: Provider::Google,
            name: info
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string()),
            email,
            picture: info.picture,
            email_verified: info.email_verified.map(|v| v.is_true()).unwrap_or(false),
        };

        tracing::info!("✓ Google identity verified: {}", identity.email);
        self.cache.insert(key, identity.clone()).await;
        Ok(identity)
    }

    /// Verifies a Microsoft access token against Graph `/me`.
    ///
    /// When an `id_token` is supplied, its audience (and tenant, for
    /// single-tenant setups) is checked before Graph is called.
    pub async fn verify_microsoft(
        &self,
        access_token: &str,
        id_token: Option<&str>,
    ) -> Result<VerifiedIdentity, AppError> {
        let client_id = self
            .microsoft_client_id
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Microsoft OAuth not configured".to_string()))?;

        if let Some(id_token) = id_token.filter(|t| !t.is_empty()) {
            check_microsoft_id_token(id_token, client_id, &self.microsoft_tenant_id)?;
        }

        let key = token_fingerprint(Provider::Microsoft, access_token);
        if let Some(identity) = self.cache.get(&key).await {
            tracing::debug!("Microsoft identity cache hit for {}", identity.email);
            return Ok(identity);
        }

        let url = format!("{}/me", self.microsoft_graph_url);
        let request = self.client.get(&url).bearer_auth(access_token).send();
        let response = self
            .microsoft_breaker
            .call(request)
            .await
            .map_err(|e| provider_error("Microsoft Graph", e))?;

        if !response.status().is_success() {
            tracing::warn!("Microsoft Graph rejected access token: {}", response.status());
            return Err(AppError::Unauthorized("Invalid Microsoft token".to_string()));
        }

        let profile: GraphProfile = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Microsoft profile: {}", e))
        })?;

        let email = profile
            .mail
            .or(profile.user_principal_name)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::BadRequest("Email not provided by Microsoft".to_string()))?
            .to_lowercase();

        let identity = VerifiedIdentity {
            provider: Provider::Microsoft,
            email,
            name: profile
                .display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown User".to_string()),
            picture: None,
            // Graph only answers for accounts Microsoft has verified.
            email_verified: true,
        };

        tracing::info!("✓ Microsoft identity verified: {}", identity.email);
        self.cache.insert(key, identity.clone()).await;
        Ok(identity)
    }
}

/// Checks audience and tenant of a Microsoft ID token.
///
/// The signature is not verified here; the access token is authenticated by
/// Graph itself.
fn check_microsoft_id_token(id_token: &str, client_id: &str, tenant_id: &str) -> Result<(), AppError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.set_audience(&[client_id]);

    let claims = decode::<serde_json::Value>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| {
            tracing::warn!("Microsoft ID token rejected: {}", e);
            AppError::Unauthorized("Invalid token audience".to_string())
        })?
        .claims;

    if !MULTI_TENANT_IDS.contains(&tenant_id) {
        let tid = claims.get("tid").and_then(|t| t.as_str());
        if tid != Some(tenant_id) {
            tracing::warn!("Microsoft ID token tenant mismatch: {:?}", tid);
            return Err(AppError::Unauthorized("Invalid token tenant".to_string()));
        }
    }

    Ok(())
}
