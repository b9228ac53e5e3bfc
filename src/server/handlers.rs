//! HTTP handlers for the contract API.

use super::error::ApiError;
use super::AppState;
use crate::analysis::aggregator::generate_summary_text;
use crate::config::LimitsConfig;
use crate::extract;
use crate::models::{
    default_checks, default_language, CheckCategory, ContractAnalysis, ContractAnalyzeRequest,
    ContractFlag, ContractType, ScoreOnlyResponse,
};
use crate::report::{self, ReportFormat};
use crate::security::ClientInfo;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

pub(crate) async fn landing_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.config.general.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "LLM-powered contract compliance scoring",
        "checks": CheckCategory::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        "contract_types": ContractType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        "endpoints": {
            "health": "GET /health",
            "analyze": "POST /v1/contracts/analyze",
            "quick_score": "POST /v1/contracts/analyze/quick",
            "upload": "POST /v1/contracts/upload",
            "analysis": "GET /v1/contracts/{id}",
            "scores": "GET /v1/contracts/{id}/score",
            "flags": "GET /v1/contracts/{id}/flags",
            "report": "GET /v1/contracts/{id}/report?format=pdf|markdown|json",
        },
        "authentication": "Authorization: Bearer your_api_key",
    }))
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.config.general.environment,
        "ai_provider": state.analyzer.provider_name(),
        "ai_model": state.analyzer.model_name(),
        "stored_analyses": state.store.len().await,
    }))
}

/// Map a JSON body rejection onto the API error shape.
fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::UnsupportedMediaType(rejection.body_text()),
        _ => ApiError::Validation(rejection.body_text()),
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(err.body_text()),
        _ => ApiError::Validation(err.body_text()),
    }
}

/// Check text length, language code and checks of an analysis request.
pub(crate) fn validate_request(
    request: &ContractAnalyzeRequest,
    limits: &LimitsConfig,
) -> Result<(), ApiError> {
    let chars = request.text.chars().count();
    if chars < limits.min_text_chars {
        return Err(ApiError::Validation(format!(
            "Contract text must be at least {} characters (got {})",
            limits.min_text_chars, chars
        )));
    }
    if chars > limits.max_text_chars {
        return Err(ApiError::Validation(format!(
            "Contract text must be at most {} characters (got {})",
            limits.max_text_chars, chars
        )));
    }

    validate_language(&request.language)?;

    if request.checks.is_empty() {
        return Err(ApiError::Validation(
            "At least one check category is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_language(language: &str) -> Result<(), ApiError> {
    if (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid language code '{}': expected a 2-3 letter ISO 639 code",
            language
        )))
    }
}

/// Run a full analysis and store the result.
async fn run_analysis(
    state: &AppState,
    client: &ClientInfo,
    request: ContractAnalyzeRequest,
) -> Result<ContractAnalysis, ApiError> {
    let language = request.language.to_lowercase();
    let analysis = state
        .analyzer
        .analyze(&request.text, request.contract_type, &language, &request.checks)
        .await
        .map_err(|e| ApiError::from_analysis("Analysis failed", e))?;

    info!(
        "Analysis {} for client '{}': overall {} with {} flags",
        analysis.id, client.name, analysis.scores.overall, analysis.flag_summary.total
    );
    debug!(
        "Flag summary for {}:\n{}",
        analysis.id,
        generate_summary_text(&analysis.flag_summary)
    );

    state.store.insert(analysis.clone()).await;
    Ok(analysis)
}

pub(crate) async fn analyze_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    payload: Result<Json<ContractAnalyzeRequest>, JsonRejection>,
) -> Result<Json<ContractAnalysis>, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request, &state.config.limits)?;

    run_analysis(&state, &client, request).await.map(Json)
}

pub(crate) async fn quick_score_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    payload: Result<Json<ContractAnalyzeRequest>, JsonRejection>,
) -> Result<Json<ScoreOnlyResponse>, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request, &state.config.limits)?;

    let response = state
        .analyzer
        .quick_score(&request.text)
        .await
        .map_err(|e| ApiError::from_analysis("Quick score failed", e))?;

    info!(
        "Quick score {} for client '{}': overall {}",
        response.id, client.name, response.scores.overall
    );
    Ok(Json(response))
}

/// Uploaded file plus the optional form fields.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Option<String>, Vec<u8>)>,
    contract_type: Option<String>,
    language: Option<String>,
    checks: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field.content_type().map(ToString::to_string);
                debug!(
                    "Receiving upload '{}' ({})",
                    field.file_name().unwrap_or("unnamed"),
                    content_type.as_deref().unwrap_or("no content type")
                );
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((content_type, bytes.to_vec()));
            }
            "type" => form.contract_type = Some(field.text().await.map_err(multipart_error)?),
            "language" => form.language = Some(field.text().await.map_err(multipart_error)?),
            "checks" => form.checks = Some(field.text().await.map_err(multipart_error)?),
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(form)
}

/// Parse a comma separated list of checks; blank means the default.
fn parse_checks(raw: Option<&str>) -> Result<Vec<CheckCategory>, ApiError> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(default_checks()),
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<CheckCategory>().map_err(ApiError::Validation))
        .collect()
}

pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    multipart: Multipart,
) -> Result<Json<ContractAnalysis>, ApiError> {
    let form = read_upload_form(multipart).await?;

    let (content_type, bytes) = form
        .file
        .ok_or_else(|| ApiError::Validation("Missing 'file' field in upload".to_string()))?;

    let contract_type = match form.contract_type.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw.parse::<ContractType>().map_err(ApiError::Validation)?,
        _ => ContractType::default(),
    };
    let language = form
        .language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(default_language);
    let checks = parse_checks(form.checks.as_deref())?;

    let max_bytes = state.config.limits.max_upload_bytes;
    let debug = state.config.general.debug;
    let text = tokio::task::spawn_blocking(move || {
        extract::extract_text(content_type.as_deref(), &bytes, max_bytes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("text extraction aborted: {}", e), debug))??;

    // Long documents are cut to the accepted maximum instead of rejected.
    let max_chars = state.config.limits.max_text_chars;
    let text = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    };

    let request = ContractAnalyzeRequest {
        text,
        contract_type,
        language,
        checks,
    };
    validate_request(&request, &state.config.limits)?;

    run_analysis(&state, &client, request).await.map(Json)
}

async fn find_analysis(state: &AppState, id: &str) -> Result<ContractAnalysis, ApiError> {
    state
        .store
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Contract analysis '{}' not found", id)))
}

pub(crate) async fn get_analysis_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContractAnalysis>, ApiError> {
    find_analysis(&state, &id).await.map(Json)
}

pub(crate) async fn get_scores_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScoreOnlyResponse>, ApiError> {
    let analysis = find_analysis(&state, &id).await?;
    Ok(Json(ScoreOnlyResponse::from(&analysis)))
}

pub(crate) async fn get_flags_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ContractFlag>>, ApiError> {
    let analysis = find_analysis(&state, &id).await?;
    Ok(Json(analysis.flags))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportQuery {
    format: Option<String>,
}

pub(crate) async fn get_report_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ReportFormat>().map_err(ApiError::Validation)?,
        None => ReportFormat::default(),
    };
    let analysis = find_analysis(&state, &id).await?;

    // PDF layout is CPU bound
    let branding = state.config.report.clone();
    let debug = state.config.general.debug;
    let rendered = tokio::task::spawn_blocking(move || report::render(&analysis, &branding, format))
        .await
        .map_err(|e| ApiError::internal(format!("report rendering aborted: {}", e), debug))?
        .map_err(|e| ApiError::internal(e, debug))?;

    debug!(
        "Rendered {} report for {} ({} bytes)",
        rendered.format.extension(),
        id,
        rendered.body.len()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, rendered.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", rendered.filename),
            ),
        ],
        rendered.body,
    )
        .into_response())
}
