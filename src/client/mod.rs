// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Blocking client for the Unified Policy REST API.

mod error;
mod query;
mod version;

pub use error::{error_detail, ApiError, ErrorKind};
pub use query::{Paging, PolicyQuery, RuleQuery, TemplateQuery};
pub use version::{
    parse_version, Compatibility, VersionError, MIN_ARTIFACTORY_VERSION, MIN_XRAY_VERSION,
};

use crate::config::{Credentials, ResolvedConfig};
use crate::model::{LifecyclePolicyWire, RuleWire, TemplateWire};

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

pub const TEMPLATES_ENDPOINT: &str = "unifiedpolicy/api/v1/templates";
pub const RULES_ENDPOINT: &str = "unifiedpolicy/api/v1/rules";
pub const POLICIES_ENDPOINT: &str = "unifiedpolicy/api/v1/policies";

const API_KEY_HEADER: &str = "x-jfrog-art-api";

pub fn user_agent() -> String {
    format!("unified-policy/{}", env!("CARGO_PKG_VERSION"))
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub page_size: u64,
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Removed,
    /// The entity did not exist; treated as success.
    AlreadyGone,
}

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::blocking::Client,
    base: Url,
}

impl Client {
    pub fn new(config: &ResolvedConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let (name, value) = match &config.credentials {
            Credentials::AccessToken(token) => (AUTHORIZATION, format!("Bearer {token}")),
            Credentials::ApiKey(key) => (HeaderName::from_static(API_KEY_HEADER), key.clone()),
        };
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| ApiError::Transport("credentials contain invalid header characters".to_string()))?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.bypass_tls_verification)
            .build()?;

        Ok(Self {
            http,
            base: config.url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn item_url(&self, collection: &str, id: &str) -> Result<Url, ApiError> {
        let mut url = self.url(collection)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("{} cannot be a base url", self.base)))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, endpoint = %url, "sending request");
        self.http.request(method, url)
    }

    /// Sends the request. Statuses in `accept` are returned as they are, as is
    /// any success status; everything else becomes an [`ApiError`].
    fn send(
        &self,
        request: RequestBuilder,
        accept: &[StatusCode],
        operation: &'static str,
        resource: &'static str,
    ) -> Result<Response, ApiError> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() || accept.contains(&status) {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        debug!(status_code = status.as_u16(), response = %body, "request failed");
        Err(ApiError::status(status.as_u16(), operation, resource, &body))
    }

    fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
        resource: &'static str,
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let response = self.send(self.request(Method::GET, url), &[], operation, resource)?;
        Self::decode(response)
    }

    fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        collection: &str,
        body: &B,
        resource: &'static str,
    ) -> Result<T, ApiError> {
        let url = self.url(collection)?;
        let request = self.request(Method::POST, url).json(body);
        Self::decode(self.send(request, &[], "create", resource)?)
    }

    fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        resource: &'static str,
    ) -> Result<Option<T>, ApiError> {
        let url = self.item_url(collection, id)?;
        let response = self.send(
            self.request(Method::GET, url),
            &[StatusCode::NOT_FOUND],
            "read",
            resource,
        )?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).map(Some)
    }

    fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        body: &B,
        resource: &'static str,
    ) -> Result<T, ApiError> {
        let url = self.item_url(collection, id)?;
        let request = self.request(Method::PUT, url).json(body);
        Self::decode(self.send(request, &[], "update", resource)?)
    }

    fn delete(&self, collection: &str, id: &str, resource: &'static str) -> Result<Deleted, ApiError> {
        let url = self.item_url(collection, id)?;
        let response = self.send(
            self.request(Method::DELETE, url),
            &[StatusCode::NOT_FOUND],
            "delete",
            resource,
        )?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Deleted::AlreadyGone),
            _ => Ok(Deleted::Removed),
        }
    }

    fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        pairs: &[(&'static str, String)],
        resource: &'static str,
    ) -> Result<Page<T>, ApiError> {
        let url = self.url(collection)?;
        let request = self.request(Method::GET, url).query(pairs);
        Self::decode(self.send(request, &[], "list", resource)?)
    }

    pub fn create_template(&self, template: &TemplateWire) -> Result<TemplateWire, ApiError> {
        self.create(TEMPLATES_ENDPOINT, template, "template")
    }

    pub fn get_template(&self, id: &str) -> Result<Option<TemplateWire>, ApiError> {
        self.get(TEMPLATES_ENDPOINT, id, "template")
    }

    pub fn update_template(&self, id: &str, template: &TemplateWire) -> Result<TemplateWire, ApiError> {
        self.update(TEMPLATES_ENDPOINT, id, template, "template")
    }

    pub fn delete_template(&self, id: &str) -> Result<Deleted, ApiError> {
        self.delete(TEMPLATES_ENDPOINT, id, "template")
    }

    pub fn list_templates(&self, query: &TemplateQuery) -> Result<Page<TemplateWire>, ApiError> {
        self.list(TEMPLATES_ENDPOINT, &query.pairs(), "templates")
    }

    pub fn create_rule(&self, rule: &RuleWire) -> Result<RuleWire, ApiError> {
        self.create(RULES_ENDPOINT, rule, "rule")
    }

    pub fn get_rule(&self, id: &str) -> Result<Option<RuleWire>, ApiError> {
        self.get(RULES_ENDPOINT, id, "rule")
    }

    pub fn update_rule(&self, id: &str, rule: &RuleWire) -> Result<RuleWire, ApiError> {
        self.update(RULES_ENDPOINT, id, rule, "rule")
    }

    pub fn delete_rule(&self, id: &str) -> Result<Deleted, ApiError> {
        self.delete(RULES_ENDPOINT, id, "rule")
    }

    pub fn list_rules(&self, query: &RuleQuery) -> Result<Page<RuleWire>, ApiError> {
        self.list(RULES_ENDPOINT, &query.pairs(), "rules")
    }

    /// A name conflict is reported as [`ApiError::PolicyExists`].
    pub fn create_policy(&self, policy: &LifecyclePolicyWire) -> Result<LifecyclePolicyWire, ApiError> {
        self.create(POLICIES_ENDPOINT, policy, "lifecycle policy")
            .map_err(|e| match e.kind() {
                Some(ErrorKind::Conflict) => ApiError::PolicyExists(policy.name.clone()),
                _ => e,
            })
    }

    pub fn get_policy(&self, id: &str) -> Result<Option<LifecyclePolicyWire>, ApiError> {
        self.get(POLICIES_ENDPOINT, id, "lifecycle policy")
    }

    pub fn update_policy(
        &self,
        id: &str,
        policy: &LifecyclePolicyWire,
    ) -> Result<LifecyclePolicyWire, ApiError> {
        self.update(POLICIES_ENDPOINT, id, policy, "lifecycle policy")
    }

    pub fn delete_policy(&self, id: &str) -> Result<Deleted, ApiError> {
        self.delete(POLICIES_ENDPOINT, id, "lifecycle policy")
    }

    /// Lists policies; rule ids are recovered from expanded rule objects.
    pub fn list_policies(&self, query: &PolicyQuery) -> Result<Page<LifecyclePolicyWire>, ApiError> {
        let mut page: Page<LifecyclePolicyWire> =
            self.list(POLICIES_ENDPOINT, &query.pairs(), "lifecycle policies")?;
        for policy in &mut page.items {
            policy.resolve_expanded_rules();
        }
        Ok(page)
    }
}
