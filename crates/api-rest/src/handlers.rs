use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::{
    AnalysisRes, AuthenticationReq, CreateDirectionReq, CreateDirectionRes, DirectionRes,
    ErrorRes, FileRes, HealthRes, HealthService, RegistrationReq, SetCheckedReq, SetStatusReq,
    TokenRes, UploadRes,
};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use medhelp_core::{AnalysisId, Download, ReferralId, ReferralStatus, Registration};
use utoipa::ToSchema;

/// Multipart body of an analysis upload. Documentation only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub(crate) struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/registration",
    request_body = RegistrationReq,
    responses(
        (status = 200, description = "Account created", body = TokenRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "No matching patient", body = ErrorRes),
        (status = 409, description = "Username taken or patient already registered", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Register a registrar or patient account
///
/// The form must carry exactly one of the `registrar` or `patient` branches. A patient
/// account is bound to the existing patient record matching `lastname` and
/// `policy_number`.
///
/// # Returns
/// * `Ok(Json<TokenRes>)` - A fresh identity token for the new account
///
/// # Errors
/// Returns `400`, `404`, `409` or `500` as documented above.
#[axum::debug_handler]
pub(crate) async fn registration(
    State(state): State<AppState>,
    Json(req): Json<RegistrationReq>,
) -> ApiResult<Json<TokenRes>> {
    let registration = match (req.registrar, req.patient) {
        (Some(registrar), None) => Registration::Registrar {
            username: req.username,
            password: req.password,
            registrar_secret: registrar.secret,
        },
        (None, Some(patient)) => Registration::Patient {
            username: req.username,
            password: req.password,
            last_name: patient.lastname,
            policy_number: patient.policy_number,
        },
        _ => {
            return Err(ApiError::bad_request(
                "exactly one of 'registrar' or 'patient' is required",
            ))
        }
    };

    let issued = state.services.accounts.register(registration)?;
    Ok(Json(issued.into()))
}

#[utoipa::path(
    post,
    path = "/authentication",
    request_body = AuthenticationReq,
    responses(
        (status = 200, description = "Credentials accepted", body = TokenRes),
        (status = 401, description = "Invalid username or password", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Exchange a username and password for a fresh identity token.
#[axum::debug_handler]
pub(crate) async fn authentication(
    State(state): State<AppState>,
    Json(req): Json<AuthenticationReq>,
) -> ApiResult<Json<TokenRes>> {
    let issued = state.services.accounts.login(&req.username, &req.password)?;
    Ok(Json(issued.into()))
}

#[utoipa::path(
    get,
    path = "/directions",
    responses(
        (status = 200, description = "Referrals visible to the caller, oldest first", body = Vec<DirectionRes>),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List referrals
///
/// Registrars receive every referral; patients receive only their own.
#[axum::debug_handler]
pub(crate) async fn list_directions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DirectionRes>>> {
    let identity = state.authorize(&headers)?;
    let referrals = state.services.referrals.list_referrals(&identity)?;
    Ok(Json(referrals.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/directions",
    request_body = CreateDirectionReq,
    responses(
        (status = 201, description = "Referral filed", body = CreateDirectionRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Caller is not a registrar", body = ErrorRes),
        (status = 409, description = "Policy number on file under another last name", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// File a new referral with its analyses (registrar only)
///
/// The patient is matched by policy number and created if unknown; the doctor is matched by
/// name and specialty.
#[axum::debug_handler]
pub(crate) async fn create_direction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDirectionReq>,
) -> ApiResult<(StatusCode, Json<CreateDirectionRes>)> {
    let identity = state.authorize(&headers)?;
    let (details, analyses) = state
        .services
        .referrals
        .create_referral(&identity, req.into())?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDirectionRes {
            direction: details.into(),
            analyses: analyses.into_iter().map(Into::into).collect(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/direction/{id}",
    params(("id" = i64, Path, description = "Referral id")),
    responses(
        (status = 200, description = "Referral details", body = DirectionRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Referral belongs to another patient", body = ErrorRes),
        (status = 404, description = "Referral not found", body = ErrorRes)
    )
)]
/// Fetch one referral with its patient and doctor.
#[axum::debug_handler]
pub(crate) async fn get_direction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<DirectionRes>> {
    let identity = state.authorize(&headers)?;
    let details = state
        .services
        .referrals
        .get_referral(&identity, ReferralId::new(id))?;
    Ok(Json(details.into()))
}

#[utoipa::path(
    get,
    path = "/direction/{id}/analysis",
    params(("id" = i64, Path, description = "Referral id")),
    responses(
        (status = 200, description = "Analyses ordered under the referral", body = Vec<AnalysisRes>),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Referral belongs to another patient", body = ErrorRes),
        (status = 404, description = "Referral not found", body = ErrorRes)
    )
)]
/// List the analyses of a referral.
#[axum::debug_handler]
pub(crate) async fn list_direction_analyses(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<AnalysisRes>>> {
    let identity = state.authorize(&headers)?;
    let analyses = state
        .services
        .referrals
        .list_analyses(&identity, ReferralId::new(id))?;
    Ok(Json(analyses.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/status",
    request_body = SetStatusReq,
    responses(
        (status = 204, description = "Status updated"),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Caller is not a registrar", body = ErrorRes),
        (status = 404, description = "Referral not found", body = ErrorRes)
    )
)]
/// Overwrite a referral's status code (registrar only).
#[axum::debug_handler]
pub(crate) async fn set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetStatusReq>,
) -> ApiResult<StatusCode> {
    let identity = state.authorize(&headers)?;
    state.services.referrals.set_status(
        &identity,
        ReferralId::new(req.direction_id),
        ReferralStatus::new(req.status),
    )?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/check",
    request_body = SetCheckedReq,
    responses(
        (status = 204, description = "Check state updated"),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Caller is not a registrar", body = ErrorRes),
        (status = 404, description = "Analysis not found", body = ErrorRes)
    )
)]
/// Mark an analysis as checked or unchecked (registrar only).
#[axum::debug_handler]
pub(crate) async fn set_checked(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetCheckedReq>,
) -> ApiResult<StatusCode> {
    let identity = state.authorize(&headers)?;
    state
        .services
        .analyses
        .set_checked(&identity, AnalysisId::new(req.analysis_id), req.checked)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/analysis/{analysis}/file",
    params(("analysis" = i64, Path, description = "Analysis id")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File attached", body = UploadRes),
        (status = 400, description = "Missing or empty `file` field", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Analysis belongs to another patient", body = ErrorRes),
        (status = 404, description = "Analysis not found", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Attach a result file to an analysis
///
/// Reads the multipart field named `file`. Registrars may upload to any analysis; patients
/// only to analyses of their own referrals.
#[axum::debug_handler]
pub(crate) async fn upload_analysis_file(
    State(state): State<AppState>,
    Path(analysis): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadRes>> {
    let identity = state.authorize(&headers)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))?;

    let (analysis, file) = state.services.analyses.attach_file(
        &identity,
        AnalysisId::new(analysis),
        &file_name,
        &bytes,
    )?;

    Ok(Json(UploadRes {
        analysis: analysis.into(),
        file: FileRes::from(file),
    }))
}

#[utoipa::path(
    get,
    path = "/analysis/{analysis}/file",
    params(("analysis" = i64, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "File content", body = String, content_type = "application/octet-stream"),
        (status = 204, description = "No file attached yet"),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Analysis belongs to another patient", body = ErrorRes),
        (status = 404, description = "Analysis not found", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Download the result file attached to an analysis
///
/// The file is served as an attachment named after the analysis.
#[axum::debug_handler]
pub(crate) async fn download_analysis_file(
    State(state): State<AppState>,
    Path(analysis): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let identity = state.authorize(&headers)?;
    let analysis_id = AnalysisId::new(analysis);

    let file = match state
        .services
        .analyses
        .resolve_download(&identity, analysis_id)?
    {
        Download::File(file) => file,
        Download::NoContent => return Ok(StatusCode::NO_CONTENT.into_response()),
        Download::Unauthorized => {
            return Err(ApiError::forbidden(format_args!(
                "download of analysis {analysis_id}"
            )))
        }
    };

    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| ApiError::internal("download_analysis_file", e))?;

    let content_type = file
        .media_type
        .unwrap_or_else(|| "application/octet-stream".to_owned());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&file.download_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987 UTF-8 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let encoded: String = name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
