use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use super::resource::{Resource, ResourceRecord};
use crate::auth::SessionUser;
use crate::config::{self, PAGE_LIMIT};
use crate::error::ApiError;
use crate::list::PageFetcher;
use crate::models::{ListPage, Profile, ProfileUpdate, TeacherSummary};
use crate::network::{network_activity, NetworkActivity};

/// How many teachers the subject form offers in its picker
const TEACHER_OPTIONS_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
}

/// HTTP client for the backend REST API.
///
/// Every request counts toward the shared network activity signal while it
/// is in flight and carries the bearer token when one is set.
#[derive(Debug, Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    activity: Arc<NetworkActivity>,
}

impl PortalClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal_server_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
            activity: network_activity(),
        })
    }

    pub fn from_config() -> Result<Self, ApiError> {
        let api = &config::config().api;
        if api.base_url.is_empty() {
            tracing::warn!("API_URL is not set; requests will fail");
        }
        Self::new(api.base_url.clone(), Duration::from_secs(api.timeout_secs))
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_activity(mut self, activity: Arc<NetworkActivity>) -> Self {
        self.activity = activity;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send, settle the activity count, and turn non-2xx answers into `ApiError`
    async fn execute(&self, request: RequestBuilder, fallback: &str) -> Result<Value, ApiError> {
        let _busy = self.activity.begin();

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        if status.is_success() {
            return Ok(body);
        }

        let err = ApiError::from_response(status.as_u16(), &body, fallback);
        if err.is_session_rejection() {
            tracing::warn!("Backend rejected session ({}): {}", status, err);
        } else {
            tracing::error!("API error ({}): {}", status, err);
        }
        Err(err)
    }

    fn decode<R: DeserializeOwned>(body: Value) -> Result<R, ApiError> {
        serde_json::from_value(body).map_err(|e| {
            tracing::error!("Unexpected response shape: {}", e);
            ApiError::invalid_response("Malformed response from server")
        })
    }

    // ---- auth service -------------------------------------------------------

    /// Exchange credentials for the backend access token
    pub async fn login(&self, identifier: &str, password: &str) -> Result<String, ApiError> {
        let request = self
            .request(Method::POST, "auth/login")
            .json(&json!({ "identifier": identifier, "password": password }));
        let body = self.execute(request, "Login failed").await?;
        let Envelope { data } = Self::decode::<Envelope<String>>(body)?;
        if data.is_empty() {
            return Err(ApiError::unauthorized("Login failed"));
        }
        Ok(data)
    }

    /// Profile of the user owning `token`
    pub async fn profile_with_token(&self, token: &str) -> Result<Profile, ApiError> {
        let request = self.request(Method::GET, "auth/me").bearer_auth(token);
        let body = self.execute(request, "Failed to fetch profile").await?;
        Ok(Self::decode::<Envelope<Profile>>(body)?.data)
    }

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let request = self.request(Method::GET, "auth/me");
        let body = self.execute(request, "Failed to fetch profile").await?;
        Ok(Self::decode::<Envelope<Profile>>(body)?.data)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        let request = self.request(Method::PUT, "auth/me").json(update);
        let body = self.execute(request, "Failed to update profile").await?;
        Ok(Self::decode::<Envelope<Profile>>(body)?.data)
    }

    pub async fn register(&self, payload: &RegisterRequest) -> Result<Value, ApiError> {
        let request = self.request(Method::POST, "auth/register").json(payload);
        self.execute(request, "Registration failed").await
    }

    pub async fn activate(&self, code: &str) -> Result<Value, ApiError> {
        let request = self
            .request(Method::POST, "auth/activation")
            .json(&json!({ "code": code }));
        self.execute(request, "Activation failed").await
    }

    /// Full sign-in: login, then resolve the profile to learn the role
    pub async fn authorize(&self, identifier: &str, password: &str) -> Result<SessionUser, ApiError> {
        let access_token = self.login(identifier, password).await?;
        let profile = self.profile_with_token(&access_token).await?;
        if profile.id.is_empty() {
            return Err(ApiError::unauthorized("Login failed"));
        }

        Ok(SessionUser {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            role: profile.role,
            access_token: Some(access_token),
        })
    }

    // ---- resources ----------------------------------------------------------

    pub async fn list_page<T: DeserializeOwned>(
        &self,
        resource: Resource,
        page: u32,
        limit: u32,
        search: &str,
    ) -> Result<ListPage<T>, ApiError> {
        // `search` goes out even when empty
        let query = [
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("search", search.to_string()),
        ];
        let request = self.request(Method::GET, resource.path()).query(&query);
        let fallback = format!("Failed to fetch {} data", resource.noun());
        let body = self.execute(request, &fallback).await?;
        Self::decode(body)
    }

    /// One page of `R`'s resource with the standard page size
    pub async fn list<R: ResourceRecord>(&self, page: u32, search: &str) -> Result<ListPage<R>, ApiError> {
        self.list_page(R::RESOURCE, page, PAGE_LIMIT, search).await
    }

    pub async fn create<R: ResourceRecord>(&self, input: &R::Input) -> Result<R, ApiError> {
        let request = self.request(Method::POST, R::RESOURCE.path()).json(input);
        let fallback = format!("Failed to create {}", R::RESOURCE.noun());
        let body = self.execute(request, &fallback).await?;
        Ok(Self::decode::<Envelope<R>>(body)?.data)
    }

    pub async fn update<R: ResourceRecord>(&self, id: &str, input: &R::Input) -> Result<R, ApiError> {
        let path = format!("{}/{}", R::RESOURCE.path(), id);
        let request = self.request(Method::PUT, &path).json(input);
        let fallback = format!("Failed to update {}", R::RESOURCE.noun());
        let body = self.execute(request, &fallback).await?;
        Ok(Self::decode::<Envelope<R>>(body)?.data)
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", resource.path(), id);
        let request = self.request(Method::DELETE, &path);
        let fallback = format!("Failed to delete {}", resource.noun());
        self.execute(request, &fallback).await?;
        Ok(())
    }

    /// Teachers offered when assigning a subject
    pub async fn teacher_options(&self) -> Result<Vec<TeacherSummary>, ApiError> {
        let page = self
            .list_page::<TeacherSummary>(Resource::Teachers, 1, TEACHER_OPTIONS_LIMIT, "")
            .await?;
        Ok(page.items)
    }

    /// Page source for a list controller over `R`'s resource
    pub fn fetcher<R: ResourceRecord>(&self) -> Arc<dyn PageFetcher<R>> {
        Arc::new(ResourceFetcher::<R>::new(self.clone()))
    }
}

/// Fetches pages of one resource through a `PortalClient`
pub struct ResourceFetcher<R> {
    client: PortalClient,
    _record: PhantomData<fn() -> R>,
}

impl<R> ResourceFetcher<R> {
    pub fn new(client: PortalClient) -> Self {
        Self {
            client,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ResourceRecord> PageFetcher<R> for ResourceFetcher<R> {
    async fn fetch_page(&self, page: u32, search: &str) -> Result<ListPage<R>, ApiError> {
        self.client.list::<R>(page, search).await
    }
}
