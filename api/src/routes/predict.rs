//! Video classification endpoint (/predict)

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{
    FILE_TOO_LARGE, PREDICTION_TYPE_FIELD, PROCESSING_FAILED, STATUS_OK, VIDEO_FIELD,
};
use crate::error::LogErr;
use crate::orchestrator::Prediction;
use crate::validation::{Rejection, UploadForm, UploadedVideo};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict))
}

#[derive(Serialize)]
struct PredictResponse {
    status: &'static str,
    prediction: Prediction,
}

#[derive(Serialize)]
struct FailureResponse {
    status: &'static str,
    message: String,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = FailureResponse {
        status: status.canonical_reason().unwrap_or("Error"),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Collect the `video` file part and `prediction_type` text part.
/// Other fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(VIDEO_FIELD) => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                form.video = Some(UploadedVideo { filename, data });
            }
            Some(PREDICTION_TYPE_FIELD) => {
                form.prediction_type = Some(field.text().await?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /predict - Classify an uploaded clip
/// Accepts multipart form data with:
/// - "video": the clip (mp4, mov, avi or mkv)
/// - "prediction_type": "binary" or "multi-class"
async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let form = match multipart {
        Ok(multipart) => match read_form(multipart).await {
            Ok(form) => form,
            Err(e) => {
                let status = e.status();
                log::warn!("[predict] Multipart error ({}): {}", status, e);
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    return failure(status, FILE_TOO_LARGE);
                }
                return failure(StatusCode::BAD_REQUEST, Rejection::NoFile.to_string());
            }
        },
        // Non-multipart requests carry no file
        Err(rejection) => {
            log::debug!("[predict] Not a multipart request: {}", rejection);
            UploadForm::default()
        }
    };

    let upload = match state.validator.validate(form) {
        Ok(upload) => upload,
        Err(rejection) => {
            log::info!("[predict] Rejected upload: {}", rejection);
            return failure(StatusCode::BAD_REQUEST, rejection.to_string());
        }
    };

    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        orchestrator.handle_upload(&upload.filename, &upload.data, upload.mode)
    })
    .await
    .log_fault("[predict] Prediction task failed", StatusCode::BAD_REQUEST);

    match outcome {
        Ok(Ok(prediction)) => (
            StatusCode::OK,
            Json(PredictResponse {
                status: STATUS_OK,
                prediction,
            }),
        )
            .into_response(),
        Ok(Err(e)) => failure(e.status(), e.user_message()),
        Err(status) => failure(status, PROCESSING_FAILED),
    }
}
