use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::aggregator::{FetchOptions, TrafficAggregator};
use crate::error::FetchError;
use crate::projection::{dashboard_view, DashboardView};
use crate::report::{ProviderId, TrafficReport};
use crate::session::auth::{RegisterError, Registration};

pub const CACHE_HEADER: &str = "x-traffic-cache";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: TrafficAggregator,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/traffic/{provider}", get(traffic))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// JSON error body `{error, message}` with a status per kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn status_for(e: &FetchError) -> StatusCode {
    match e {
        FetchError::InvalidDomain(_) => StatusCode::BAD_REQUEST,
        FetchError::Unauthenticated => StatusCode::UNAUTHORIZED,
        FetchError::NoDataForDomain | FetchError::ProviderNotConfigured(_) => {
            StatusCode::NOT_FOUND
        }
        FetchError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        FetchError::UpstreamRejected { .. } | FetchError::UnparsableResponse => {
            StatusCode::BAD_GATEWAY
        }
        FetchError::UpstreamUnreachable => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError {
            status: status_for(&e),
            error: e.kind(),
            message: e.user_message(),
        }
    }
}

impl From<RegisterError> for ApiError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::Invalid { reason, .. } => ApiError {
                status: StatusCode::BAD_REQUEST,
                error: "invalid_registration",
                message: reason.to_string(),
            },
            RegisterError::Rejected(message) => ApiError {
                status: StatusCode::BAD_REQUEST,
                error: "registration_rejected",
                message,
            },
            RegisterError::Unreachable => ApiError {
                status: StatusCode::BAD_GATEWAY,
                error: "upstream_unreachable",
                message: "The account service could not be reached. Please try again."
                    .to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct LoginReq {
    identifier: String,
    secret: String,
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginReq>) -> Result<StatusCode, ApiError> {
    state
        .aggregator
        .session()
        .login(&body.identifier, &body.secret)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state.aggregator.session().logout();
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct MessageResp {
    message: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Registration>,
) -> Result<Json<MessageResp>, ApiError> {
    let message = state.aggregator.session().register(&body).await?;
    Ok(Json(MessageResp { message }))
}

#[derive(Deserialize)]
struct TrafficQuery {
    domain: String,
    #[serde(default)]
    refresh: bool,
    ttl_secs: Option<u64>,
}

#[derive(Serialize)]
struct TrafficResp {
    report: TrafficReport,
    view: DashboardView,
}

async fn traffic(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(q): Query<TrafficQuery>,
) -> Result<Response, ApiError> {
    let provider: ProviderId = provider.parse().map_err(|message| ApiError {
        status: StatusCode::NOT_FOUND,
        error: "unknown_provider",
        message,
    })?;

    let options = FetchOptions {
        force_refresh: q.refresh,
        ttl: q.ttl_secs.map(Duration::from_secs),
    };
    let (report, status) = state
        .aggregator
        .fetch_with_status(&q.domain, provider, options)
        .await?;

    let view = dashboard_view(&report);
    let mut resp = Json(TrafficResp { report, view }).into_response();
    resp.headers_mut().insert(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(status.as_str()),
    );
    Ok(resp)
}
