//! # API REST
//!
//! REST API implementation for MedHelp.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Bearer token extraction and error-to-status mapping
//!
//! Uses `api-shared` for wire models and `medhelp-core` for every decision about who may
//! see or change what.

#![warn(rust_2018_idioms)]

pub mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use api_shared::auth::bearer_token;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::Router;
use medhelp_core::{ClinicServices, CoreConfig, Identity};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted analysis upload.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers: the resolved
/// configuration and the core services wired to the record and file stores.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub services: Arc<ClinicServices>,
}

impl AppState {
    /// Open the stores under the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the record store or file store cannot be opened.
    pub fn open(cfg: Arc<CoreConfig>) -> medhelp_core::CoreResult<Self> {
        let services = ClinicServices::open(cfg.clone())?;
        Ok(Self {
            cfg,
            services: Arc::new(services),
        })
    }

    /// Resolve the caller's identity from the `Authorization` header.
    pub fn authorize(&self, headers: &HeaderMap) -> ApiResult<Identity> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(value)?;
        Ok(self.services.authenticate(token)?)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::registration,
        handlers::authentication,
        handlers::list_directions,
        handlers::create_direction,
        handlers::get_direction,
        handlers::list_direction_analyses,
        handlers::set_status,
        handlers::set_checked,
        handlers::upload_analysis_file,
        handlers::download_analysis_file,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::RegistrationReq,
        api_shared::RegistrarForm,
        api_shared::PatientForm,
        api_shared::AuthenticationReq,
        api_shared::TokenRes,
        api_shared::DirectionRes,
        api_shared::PatientRes,
        api_shared::DoctorRes,
        api_shared::AnalysisRes,
        api_shared::CreateDirectionReq,
        api_shared::NewPatientReq,
        api_shared::NewDoctorReq,
        api_shared::CreateDirectionRes,
        api_shared::SetStatusReq,
        api_shared::SetCheckedReq,
        api_shared::FileRes,
        api_shared::UploadRes,
        handlers::UploadForm,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/registration", post(handlers::registration))
        .route("/authentication", post(handlers::authentication))
        .route(
            "/directions",
            get(handlers::list_directions).post(handlers::create_direction),
        )
        .route("/direction/:id", get(handlers::get_direction))
        .route("/direction/:id/analysis", get(handlers::list_direction_analyses))
        .route("/status", post(handlers::set_status))
        .route("/check", post(handlers::set_checked))
        .route(
            "/analysis/:analysis/file",
            post(handlers::upload_analysis_file)
                .get(handlers::download_analysis_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the REST API until the process stops.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ MedHelp REST listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests;
