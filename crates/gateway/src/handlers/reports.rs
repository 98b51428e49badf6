use axum::{
    extract::{Host, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use billboard_protocol::{CreateReportResponse, MessageResponse, ReportPageResponse};
use serde::Deserialize;
use std::sync::Arc;

use super::{request_origin, ApiMultipart, ApiQuery};
use crate::error::Result;
use crate::models::Identity;
use crate::services::{ImageUpload, PageRequest, ReportFields};
use crate::AppState;

/// Kept as raw strings so that junk values fall back to defaults instead of rejecting.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    host: Option<Host>,
    headers: HeaderMap,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<CreateReportResponse>> {
    let mut fields = ReportFields::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                images.push(ImageUpload { file_name, bytes });
            }
            "latitude" => fields.latitude = Some(field.text().await?),
            "longitude" => fields.longitude = Some(field.text().await?),
            "description" => fields.description = Some(field.text().await?),
            "category" => fields.category = Some(field.text().await?),
            "violations" => fields.violations = Some(field.text().await?),
            other => tracing::debug!("Ignoring unexpected multipart field `{}`", other),
        }
    }
    tracing::debug!("Report submission from {} with {} file(s)", identity.user_id, images.len());

    let report = state.reports.create(identity, fields, images).await?;
    let origin = request_origin(host.as_ref().map(|Host(h)| h.as_str()), &headers);
    Ok(Json(CreateReportResponse {
        success: true,
        message: "Report saved".to_string(),
        data: report.to_view(&origin),
    }))
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
    host: Option<Host>,
    headers: HeaderMap,
) -> Result<Json<ReportPageResponse>> {
    let page = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref());
    let result = state.reports.list(page).await?;
    tracing::debug!(
        "Serving page {} ({} of {} reports)",
        result.current_page,
        result.reports.len(),
        result.total
    );

    let origin = request_origin(host.as_ref().map(|Host(h)| h.as_str()), &headers);
    Ok(Json(ReportPageResponse {
        data: result.reports.iter().map(|r| r.to_view(&origin)).collect(),
        total_pages: result.total_pages,
        current_page: result.current_page,
        total: result.total,
    }))
}

pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.reports.delete(identity, &id).await?;
    Ok(Json(MessageResponse::ok("Report deleted successfully")))
}
