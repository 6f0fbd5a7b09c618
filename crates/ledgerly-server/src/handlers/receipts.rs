//! Receipt scanning handler

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    Json,
};
use base64::Engine;
use serde::Deserialize;
use tracing::info;

use crate::{AppError, AppState, MAX_SCAN_BODY_SIZE, MAX_UPLOAD_SIZE};
use ledgerly_core::{ModelBackend, ReceiptFields};

/// Request body for scanning a receipt
#[derive(Debug, Deserialize)]
pub struct ScanReceiptRequest {
    /// Base64-encoded image bytes
    pub image_base64: String,
    /// MIME type of the image (e.g. "image/jpeg")
    pub mime_type: String,
}

/// POST /api/receipts/scan - Extract transaction fields from a receipt image
///
/// Returns 422 when the model decides the image is not a receipt, and 503
/// when no model backend is configured.
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ReceiptFields>, AppError> {
    let Some(model) = &state.model else {
        return Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Receipt scanning is not configured",
        ));
    };

    // Read the body ourselves; the default extractor limit is too small
    // for receipt photos
    let bytes = axum::body::to_bytes(request.into_body(), MAX_SCAN_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or image too large (max 10MB)"))?;

    let req: ScanReceiptRequest = serde_json::from_slice(&bytes)
        .map_err(|_| AppError::bad_request("Invalid scan request body"))?;

    if !req.mime_type.starts_with("image/") {
        return Err(AppError::bad_request(&format!(
            "Unsupported MIME type: {}",
            req.mime_type
        )));
    }

    let image = base64::engine::general_purpose::STANDARD
        .decode(req.image_base64.trim())
        .map_err(|_| AppError::bad_request("image_base64 is not valid base64"))?;

    if image.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::bad_request("Image exceeds maximum upload size"));
    }

    let fields = model
        .scan_receipt(&image, &req.mime_type)
        .await?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "The image does not appear to be a receipt",
            )
        })?;

    info!(
        merchant = %fields.merchant_name,
        amount_cents = fields.amount_cents,
        "Receipt scanned"
    );

    Ok(Json(fields))
}
