//! Federated identity token acquisition.
//!
//! Two strategies exist depending on what the job host exposes:
//! - an OIDC request endpoint (`System.OidcRequestUri`) accepting a bearer
//!   system access token
//! - the task orchestration API, addressed by collection/project/plan/job
//!
//! Both fail when the response carries no `oidcToken`.

use crate::context::Context;
use crate::traits::TaskInputs;
use anyhow::{Context as _, Result, bail};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;
use url::Url;

const OIDC_API_VERSION: &str = "7.1";
const TASK_API_VERSION: &str = "7.1-preview.1";
const SYSTEM_CONNECTION: &str = "SYSTEMVSSCONNECTION";

/// HTTP client trait for testing
pub trait HttpClient: Send + Sync {
    /// POST an empty JSON body with a bearer token and return the response body
    fn post(&self, url: &str, bearer: &str) -> Result<String>;
}

/// Real HTTP client using reqwest
#[derive(Clone)]
pub struct ReqwestClient;

impl HttpClient for ReqwestClient {
    fn post(&self, url: &str, bearer: &str) -> Result<String> {
        let response = reqwest::blocking::Client::new()
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(bearer)
            .body("{}")
            .send()
            .with_context(|| format!("Failed to request OIDC token from: {}", url))?;

        if !response.status().is_success() {
            bail!(
                "OIDC token request failed with status {}: {}",
                response.status(),
                url
            );
        }

        response
            .text()
            .with_context(|| format!("Failed to read response body from: {}", url))
    }
}

/// Mints an ID token for a service connection
pub trait TokenGenerator: Send + Sync {
    fn generate(&self, inputs: &dyn TaskInputs, connection: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct OidcTokenResponse {
    #[serde(rename = "oidcToken")]
    oidc_token: Option<String>,
}

/// Extract `oidcToken` from a response body, rejecting empty tokens
pub fn parse_token_response(body: &str, connection: &str) -> Result<String> {
    let response: OidcTokenResponse = serde_json::from_str(body).with_context(|| {
        format!(
            "Failed to parse the federated token response for service connection '{}'",
            connection
        )
    })?;

    match response.oidc_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => bail!(
            "Failed to acquire a federated token for service connection '{}': the response did not contain an oidcToken",
            connection
        ),
    }
}

fn system_access_token(inputs: &dyn TaskInputs) -> Result<String> {
    inputs
        .endpoint_auth_parameter(SYSTEM_CONNECTION, "AccessToken")
        .or_else(|| inputs.variable("System.AccessToken"))
        .context("Could not determine credentials to use: no system access token is available")
}

/// POSTs to `System.OidcRequestUri`
pub struct OidcRequestTokenGenerator<H: HttpClient> {
    http: H,
}

impl<H: HttpClient> OidcRequestTokenGenerator<H> {
    pub fn with_client(http: H) -> Self {
        Self { http }
    }

    pub fn request_url(request_uri: &str, connection: &str) -> Result<Url> {
        let mut url = Url::parse(request_uri)
            .with_context(|| format!("Invalid OIDC request URI: {}", request_uri))?;
        url.query_pairs_mut()
            .append_pair("api-version", OIDC_API_VERSION)
            .append_pair("serviceConnectionId", connection);
        Ok(url)
    }
}

impl<H: HttpClient> TokenGenerator for OidcRequestTokenGenerator<H> {
    fn generate(&self, inputs: &dyn TaskInputs, connection: &str) -> Result<String> {
        let request_uri = inputs
            .variable("System.OidcRequestUri")
            .context("System.OidcRequestUri is not set")?;
        let url = Self::request_url(&request_uri, connection)?;
        let bearer = system_access_token(inputs)?;

        debug!(connection, "Requesting federated token from the OIDC endpoint");
        let body = self.http.post(url.as_str(), &bearer)?;
        parse_token_response(&body, connection)
    }
}

/// Calls the task orchestration API scoped to the running job
pub struct TaskApiTokenGenerator<H: HttpClient> {
    http: H,
}

impl<H: HttpClient> TaskApiTokenGenerator<H> {
    pub fn with_client(http: H) -> Self {
        Self { http }
    }

    pub fn request_url(inputs: &dyn TaskInputs, connection: &str) -> Result<Url> {
        let variable = |name: &str| {
            inputs
                .variable(name)
                .with_context(|| format!("Pipeline variable {} is not set", name))
        };

        let mut collection = variable("System.CollectionUri")?;
        if !collection.ends_with('/') {
            collection.push('/');
        }
        let base = Url::parse(&collection)
            .with_context(|| format!("Invalid collection URI: {}", collection))?;

        let path = format!(
            "{}/_apis/distributedtask/hubs/{}/plans/{}/jobs/{}/oidctoken",
            variable("System.TeamProjectId")?,
            variable("System.HostType")?,
            variable("System.PlanId")?,
            variable("System.JobId")?,
        );
        let mut url = base.join(&path)?;
        url.query_pairs_mut()
            .append_pair("serviceConnectionId", connection)
            .append_pair("api-version", TASK_API_VERSION);
        Ok(url)
    }
}

impl<H: HttpClient> TokenGenerator for TaskApiTokenGenerator<H> {
    fn generate(&self, inputs: &dyn TaskInputs, connection: &str) -> Result<String> {
        let url = Self::request_url(inputs, connection)?;
        let bearer = system_access_token(inputs)?;

        debug!(connection, "Requesting federated token from the task API");
        let body = self.http.post(url.as_str(), &bearer)?;
        parse_token_response(&body, connection)
    }
}

/// Prefers the OIDC request endpoint, falling back to the task API on job
/// hosts that do not expose one
pub struct DefaultTokenGenerator<H: HttpClient + Clone = ReqwestClient> {
    http: H,
}

impl DefaultTokenGenerator<ReqwestClient> {
    pub fn new() -> Self {
        Self::with_client(ReqwestClient)
    }
}

impl Default for DefaultTokenGenerator<ReqwestClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HttpClient + Clone> DefaultTokenGenerator<H> {
    pub fn with_client(http: H) -> Self {
        Self { http }
    }
}

impl<H: HttpClient + Clone> TokenGenerator for DefaultTokenGenerator<H> {
    fn generate(&self, inputs: &dyn TaskInputs, connection: &str) -> Result<String> {
        if inputs.variable("System.OidcRequestUri").is_some() {
            OidcRequestTokenGenerator::with_client(self.http.clone()).generate(inputs, connection)
        } else {
            TaskApiTokenGenerator::with_client(self.http.clone()).generate(inputs, connection)
        }
    }
}

/// Mint a token for `connection` and register it as a secret before anyone
/// can log it
pub fn generate_id_token(ctx: &Context, connection: &str) -> Result<String> {
    let token = ctx.tokens.generate(ctx.inputs.as_ref(), connection)?;
    ctx.pipeline.set_secret(&token);
    Ok(token)
}

/// Token generator returning a fixed token and recording requested connections
#[cfg(test)]
pub struct MockTokenGenerator {
    token: Option<String>,
    requests: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockTokenGenerator {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every request fails
    pub fn failing() -> Self {
        Self {
            token: None,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TokenGenerator for MockTokenGenerator {
    fn generate(&self, _inputs: &dyn TaskInputs, connection: &str) -> Result<String> {
        self.requests.lock().unwrap().push(connection.to_string());
        match &self.token {
            Some(token) => Ok(token.clone()),
            None => bail!("Failed to acquire a federated token for service connection '{}'", connection),
        }
    }
}
