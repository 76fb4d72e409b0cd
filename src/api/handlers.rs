use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::state::ApiState;
use crate::models::{
    InvoiceAmendment, InvoiceDraft, InvoiceStatus, IssuerId, ListInvoicesFilter,
};

/// Header set by the authentication gateway in front of this service.
pub const ISSUER_HEADER: &str = "X-Issuer-Id";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PdfQuery {
    pub paid: Option<Decimal>,
}

pub fn extract_issuer(req: &HttpRequest) -> ApiResult<IssuerId> {
    req.headers()
        .get(ISSUER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(IssuerId::new)
        .ok_or_else(|| ApiError::unauthorized(format!("missing {} header", ISSUER_HEADER)))
}

/// Create an invoice and allocate its number
pub async fn create_invoice(
    req: HttpRequest,
    data: web::Json<InvoiceDraft>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let issuer = extract_issuer(&req)?;
    let issue_date = Utc::now().date_naive();

    let record = state
        .invoices
        .create(&issuer, data.into_inner(), issue_date)
        .await?;

    Ok(HttpResponse::Created().json(record))
}

pub async fn list_invoices(
    req: HttpRequest,
    query: web::Query<ListQuery>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let issuer = extract_issuer(&req)?;
    let query = query.into_inner();

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            InvoiceStatus::from_string(s)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status {}", s)))?,
        ),
        None => None,
    };
    let filter = ListInvoicesFilter {
        status,
        client_id: query.client_id.filter(|c| !c.is_empty()),
    };

    let invoices = state.invoices.list(&issuer, &filter).await?;
    Ok(HttpResponse::Ok().json(json!({
        "invoices": invoices,
        "count": invoices.len()
    })))
}

pub async fn get_invoice(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let issuer = extract_issuer(&req)?;
    let id = path.into_inner();

    match state.invoices.get(&issuer, id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(ApiError::not_found("Invoice not found")),
    }
}

pub async fn update_invoice(
    req: HttpRequest,
    path: web::Path<Uuid>,
    data: web::Json<InvoiceAmendment>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let issuer = extract_issuer(&req)?;
    let id = path.into_inner();

    match state.invoices.amend(&issuer, id, data.into_inner()).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(ApiError::not_found("Invoice not found")),
    }
}

/// Render the invoice as a PDF attachment
pub async fn download_invoice_pdf(
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<PdfQuery>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let issuer = extract_issuer(&req)?;
    let id = path.into_inner();

    let rendered = state
        .invoices
        .render(&issuer, id, query.paid)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))?;

    Ok(HttpResponse::Ok()
        .content_type(rendered.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(rendered.file_name)],
        })
        .body(rendered.bytes))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy"
    }))
}

pub async fn readiness_check(state: web::Data<ApiState>) -> HttpResponse {
    let db_healthy = match &state.db {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    if db_healthy {
        HttpResponse::Ok().json(json!({
            "status": "ready",
            "checks": { "database": "ok" }
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({
            "status": "not_ready",
            "checks": { "database": "failed" }
        }))
    }
}

pub async fn metrics_endpoint() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::gather())
}
