//! Request extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, Extensions, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tracker_core::{Application, ClientHints, Deadline, Error};

use crate::response::ApiError;
use crate::state::AppState;

/// Client IP address.
///
/// Left-most `X-Forwarded-For` entry, then `X-Real-IP`, then the socket
/// peer. Header values that do not parse as an address are skipped. Empty
/// when none is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_parts(parts: &Parts) -> Self {
        Self::resolve(&parts.headers, &parts.extensions)
    }

    pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Self {
        if let Some(ip) = forwarded_ip(headers) {
            return ClientIp(ip);
        }
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();
        ClientIp(peer)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());
    let xff = header("x-forwarded-for").and_then(|v| v.split(',').next());
    [xff, header("x-real-ip")]
        .into_iter()
        .flatten()
        .find_map(parse_ip)
        .map(|ip| ip.to_string())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    IpAddr::from_str(raw.trim()).ok()
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_parts(parts))
    }
}

/// Per-request scope: trace id, deadline, client address.
///
/// Installed by the deadline stage; handlers outside a deadline-layered
/// route get one built with the default budget.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub deadline: Deadline,
    pub client_ip: String,
}

impl RequestContext {
    pub fn new(client_ip: ClientIp, deadline: Deadline) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline,
            client_ip: client_ip.0,
        }
    }

    /// Header-derived inputs for ingestion and enrichment.
    pub fn hints(&self, headers: &HeaderMap) -> ClientHints {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        ClientHints {
            client_ip: Some(self.client_ip.clone()).filter(|ip| !ip.is_empty()),
            user_agent: header("user-agent"),
            accept_language: header("accept-language"),
            country: header("cf-ipcountry"),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(ctx.clone());
        }
        let deadline = Deadline::after(state.config.timeouts.default_budget());
        Ok(RequestContext::new(ClientIp::from_parts(parts), deadline))
    }
}

/// The authenticated application, placed in request scope by the
/// API-key stage.
#[derive(Debug, Clone)]
pub struct Tenant(pub Arc<Application>);

impl Tenant {
    pub fn app_id(&self) -> &str {
        &self.0.app_id
    }

    /// Resolve the `app_id` a request names against the tenant. Absent
    /// means the tenant's own; any other value is forbidden.
    pub fn scope(&self, requested: Option<&str>) -> Result<String, Error> {
        match requested.map(str::trim).filter(|id| !id.is_empty()) {
            None => Ok(self.app_id().to_string()),
            Some(id) if id == self.app_id() => Ok(id.to_string()),
            Some(_) => Err(Error::forbidden("app_id does not match the API key")),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Tenant>()
            .cloned()
            .ok_or_else(|| Error::authentication("API key is required").into())
    }
}

/// Query-string extractor whose rejection is the failure envelope.
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(Error::validation_with_details(
                "Invalid query parameters",
                vec![rejection.body_text()],
            )
            .into()),
        }
    }
}

/// JSON body extractor whose rejection is the failure envelope.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(Error::validation_with_details(
                "Invalid JSON body",
                vec![rejection.body_text()],
            )
            .into()),
        }
    }
}
