//! API client for communicating with the recipe backend.
//!
//! This module provides the `ApiClient` struct for account calls (login,
//! signup, logout), recipe calls (list, detail, add, edit, delete), and the
//! AI chef (recipe from ingredients, recipe from a food photo).

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{photo_data_url, ChefError, GeneratedRecipe, Recipe, RecipeDetail, RecipeDraft, MAX_PHOTO_BYTES};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Image uploads go through the same client, so this is generous.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    full_name: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    ingredients: &'a [String],
}

#[derive(Debug, Serialize)]
struct IdentifyRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    message: Option<String>,
}

/// API client for the recipe backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the backend at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&url).with_context(|| format!("Invalid request URL: {}", url))
    }

    /// Credentials may only travel over HTTPS, or to this machine.
    fn allows_credentials(url: &Url) -> bool {
        if url.scheme() == "https" {
            return true;
        }
        match url.host_str() {
            Some("localhost") => true,
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false),
            None => false,
        }
    }

    fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| ApiError::Unauthorized.into())
    }

    fn auth_headers(&self, url: &Url) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            if !Self::allows_credentials(url) {
                return Err(ApiError::InsecureTransport(url.origin().ascii_serialization()).into());
            }
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send_with_retry(
        &self,
        url: &Url,
        build: impl Fn() -> Result<RequestBuilder>,
    ) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()?
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .send_with_retry(&url, || {
                Ok(self.client.get(url.clone()).headers(self.auth_headers(&url)?))
            })
            .await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn send_json<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.url(path)?;
        self.send_with_retry(&url, || {
            Ok(self
                .client
                .request(method.clone(), url.clone())
                .headers(self.auth_headers(&url)?)
                .json(body))
        })
        .await
    }

    /// Multipart bodies are consumed on send, so these are not retried.
    async fn send_multipart(&self, method: Method, path: &str, form: Form) -> Result<reqwest::Response> {
        let url = self.url(path)?;
        let response = self
            .client
            .request(method, url.clone())
            .headers(self.auth_headers(&url)?)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to upload to {}", url))?;
        Self::check_response(response).await
    }

    // ===== Account =====

    /// Exchange email and password for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let url = self.url("api/auth/login")?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        let body: LoginResponse = response.json().await.context("Failed to parse login response")?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::InvalidResponse(
                body.message
                    .unwrap_or_else(|| "Login response did not include a token".to_string()),
            )
            .into()),
        }
    }

    /// Register a new account. The backend sends a verification email.
    pub async fn signup(&self, email: &str, password: &str, full_name: &str) -> Result<()> {
        let url = self.url("api/auth/signup")?;
        let response = self
            .client
            .post(url)
            .json(&SignupRequest { email, password, full_name })
            .send()
            .await
            .context("Failed to send signup request")?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// Tell the backend the session is over
    pub async fn logout(&self) -> Result<()> {
        self.send_json(Method::POST, "api/auth/logout", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    // ===== Recipes =====

    /// Fetch every published recipe
    pub async fn recipes(&self) -> Result<Vec<Recipe>> {
        self.get("api/recipes").await
    }

    /// Fetch recipes owned by the signed-in user
    pub async fn my_recipes(&self) -> Result<Vec<Recipe>> {
        self.require_token()?;
        self.get("api/recipes/mine").await
    }

    /// Fetch one recipe with its ingredients
    pub async fn recipe(&self, id: i64) -> Result<RecipeDetail> {
        self.get(&format!("api/recipes/{}", id)).await
    }

    pub async fn create_recipe(&self, draft: &RecipeDraft, image: Option<&Path>) -> Result<()> {
        self.require_token()?;
        draft.validate()?;
        let form = Self::recipe_form(draft, image).await?;
        self.send_multipart(Method::POST, "api/recipes", form).await?;
        debug!(title = %draft.title, "Recipe created");
        Ok(())
    }

    pub async fn update_recipe(&self, id: i64, draft: &RecipeDraft, image: Option<&Path>) -> Result<()> {
        self.require_token()?;
        draft.validate()?;
        let form = Self::recipe_form(draft, image).await?;
        self.send_multipart(Method::PUT, &format!("api/recipes/{}", id), form)
            .await?;
        debug!(recipe_id = id, "Recipe updated");
        Ok(())
    }

    pub async fn delete_recipe(&self, id: i64) -> Result<()> {
        self.require_token()?;
        let url = self.url(&format!("api/recipes/{}", id))?;
        let response = self
            .client
            .delete(url.clone())
            .headers(self.auth_headers(&url)?)
            .send()
            .await
            .context("Failed to send delete request")?;
        Self::check_response(response).await?;
        debug!(recipe_id = id, "Recipe deleted");
        Ok(())
    }

    // ===== AI chef =====

    /// Ask the AI chef for a recipe using the given ingredients
    pub async fn generate_recipe(&self, ingredients: &[String]) -> Result<GeneratedRecipe> {
        if ingredients.iter().all(|i| i.trim().is_empty()) {
            return Err(ChefError::NoIngredients.into());
        }
        let response = self
            .send_json(Method::POST, "api/ai/generate-recipe", &GenerateRequest { ingredients })
            .await?;
        Self::parse_generated(response).await
    }

    /// Ask the AI chef to identify the dish in a photo and write its recipe
    pub async fn identify_food(&self, photo: &Path) -> Result<GeneratedRecipe> {
        let size = tokio::fs::metadata(photo)
            .await
            .with_context(|| format!("Failed to read photo {}", photo.display()))?
            .len();
        if size > MAX_PHOTO_BYTES as u64 {
            return Err(ChefError::PhotoTooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                max: MAX_PHOTO_BYTES,
            }
            .into());
        }

        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("Failed to read photo {}", photo.display()))?;
        let image = photo_data_url(&bytes, image_mime(photo))?;

        let response = self
            .send_json(Method::POST, "api/ai/identify-food", &IdentifyRequest { image })
            .await?;
        Self::parse_generated(response).await
    }

    /// The recipe arrives as one JSON object, possibly streamed as plain text.
    async fn parse_generated(response: reqwest::Response) -> Result<GeneratedRecipe> {
        let body = response.text().await.context("Failed to read AI chef response")?;
        let recipe: GeneratedRecipe = serde_json::from_str(body.trim())
            .map_err(|e| ApiError::InvalidResponse(format!("AI chef returned an unreadable recipe: {}", e)))?;
        if recipe.title.trim().is_empty() {
            return Err(ApiError::InvalidResponse("AI chef returned a recipe without a title".to_string()).into());
        }
        debug!(title = %recipe.title, "AI chef suggested a recipe");
        Ok(recipe)
    }

    /// `data` carries the draft as JSON; `image` is the optional photo.
    async fn recipe_form(draft: &RecipeDraft, image: Option<&Path>) -> Result<Form> {
        let data = serde_json::to_string(draft)?;
        let mut form = Form::new().text("data", data);

        if let Some(path) = image {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(image_mime(path))?;
            form = form.part("image", part);
        }

        Ok(form)
    }
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
