use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use companyhub_api::{
    ApiError, CacheStatsResponse, CompanyListResponse, CompanyResponse, CreateCompanyRequest,
    CreateCompanyResponse, HealthResponse, LogoutRequest, RefreshRequest, SignInRequest,
    SignUpRequest, SignUpResponse, TokenResponse, UpdateCompanyRequest,
};
use companyhub_auth::{AuthError, AuthService, SignUp, TokenPair};
use companyhub_storage::SessionClient;
use uuid::Uuid;

use crate::server::AppState;
use crate::service::ServiceError;

const FINGERPRINT_HEADER: &str = "x-client-fingerprint";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::bad_request(e.to_string()),
            ServiceError::Storage(e) if e.is_not_found() => ApiError::not_found(e.to_string()),
            ServiceError::Storage(e) if e.is_already_exists() => ApiError::conflict(e.to_string()),
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                ApiError::internal("storage failure")
            }
        }
    }
}

fn auth_error(err: AuthError) -> ApiError {
    match err {
        e if e.is_unauthorized() => ApiError::unauthorized(e.to_string()),
        AuthError::InvalidInput(msg) => ApiError::bad_request(msg),
        e @ AuthError::UsernameTaken(_) => ApiError::conflict(e.to_string()),
        e => {
            tracing::error!(error = %e, "authentication failure");
            ApiError::internal("authentication failure")
        }
    }
}

fn parse_company_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid company id '{raw}'")))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Client description stored with a refresh session.
fn session_client(headers: &HeaderMap) -> SessionClient {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let ip = header_str(FORWARDED_FOR_HEADER)
        .split(',')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    SessionClient {
        user_agent: header_str(header::USER_AGENT.as_str()),
        fingerprint: header_str(FINGERPRINT_HEADER),
        ip,
    }
}

fn token_response(pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: pair.expires_in,
    }
}

// ---- Health and operations ----

pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        storage: None,
        event_log: None,
    })
}

/// Probes the store and the event log.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match state.companies.store().read(Uuid::nil()).await {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "storage readiness probe failed");
            format!("error: {e}")
        }
    };
    let event_log = match state.event_log.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "event log readiness probe failed");
            format!("error: {e}")
        }
    };

    let ready = storage == "ok" && event_log == "ok";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if ready { "ready" } else { "unavailable" }.into(),
        storage: Some(storage),
        event_log: Some(event_log),
    };
    (status, Json(body))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => ApiError::service_unavailable("metrics are not initialized").into_response(),
    }
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.companies.cache().stats();
    Json(CacheStatsResponse {
        entries: stats.entries,
        hits: stats.hits,
        misses: stats.misses,
        last_applied: state.consumer_progress.borrow().to_string(),
    })
}

// ---- Companies ----

pub async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<CompanyListResponse>, ApiError> {
    let companies = state.companies.get_all().await?;
    Ok(Json(CompanyListResponse {
        companies: companies.into_iter().map(CompanyResponse::from).collect(),
    }))
}

pub async fn create_company(
    State(state): State<AppState>,
    payload: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let id = state.companies.create(&request.name).await?;
    Ok((StatusCode::CREATED, Json(CreateCompanyResponse { id })))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompanyResponse>, ApiError> {
    let id = parse_company_id(&id)?;
    match state.companies.get_by_id(id).await? {
        Some(record) => Ok(Json(CompanyResponse::from(record))),
        None => Err(ApiError::not_found(format!("company not found: {id}"))),
    }
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCompanyRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_company_id(&id)?;
    let request = json_body(payload)?;
    state.companies.update(id, &request.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_company_id(&id)?;
    state.companies.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Authentication ----

pub async fn sign_up(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let id = auth
        .sign_up(SignUp {
            username: request.username,
            password: request.password,
            email: request.email,
        })
        .await
        .map_err(auth_error)?;
    Ok((StatusCode::CREATED, Json(SignUpResponse { id })))
}

pub async fn sign_in(
    State(auth): State<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = json_body(payload)?;
    let pair = auth
        .sign_in(&request.username, &request.password, session_client(&headers))
        .await
        .map_err(auth_error)?;
    Ok(Json(token_response(pair)))
}

pub async fn refresh(
    State(auth): State<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = json_body(payload)?;
    let pair = auth
        .refresh(request.refresh_token, session_client(&headers))
        .await
        .map_err(auth_error)?;
    Ok(Json(token_response(pair)))
}

pub async fn logout(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request = json_body(payload)?;
    auth.logout(request.refresh_token).await.map_err(auth_error)?;
    Ok(StatusCode::NO_CONTENT)
}
