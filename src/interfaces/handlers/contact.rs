use actix_multipart::Multipart;
use actix_web::{
    http::header::{self, HeaderMap},
    post, web, HttpRequest, HttpResponse, Responder,
};
use futures_util::{StreamExt, TryStreamExt};

use crate::{
    entities::submission::RawSubmission,
    errors::AppError,
    use_cases::gatekeeper::RequestMeta,
    utils::client_ip::get_client_ip,
    AppState,
};

#[post("/contact")]
pub async fn submit_contact(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> impl Responder {
    let meta = RequestMeta {
        identifier: get_client_ip(&req, &state.identity),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let read_form = read_submission(req.headers(), payload, state.max_body_bytes);

    match state.contact_handler.submit(&meta, read_form).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => e.to_http_response(),
    }
}

fn body_too_large(limit: usize) -> AppError {
    AppError::Internal(format!("Request body exceeds {} bytes", limit))
}

/// Reads a urlencoded or multipart form body into a [`RawSubmission`].
async fn read_submission(
    headers: &HeaderMap,
    payload: web::Payload,
    limit: usize,
) -> Result<RawSubmission, AppError> {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        read_multipart(headers, payload, limit).await
    } else {
        read_urlencoded(payload, limit).await
    }
}

async fn read_urlencoded(mut payload: web::Payload, limit: usize) -> Result<RawSubmission, AppError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(body_too_large(limit));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(RawSubmission::from_pairs(url::form_urlencoded::parse(&body)))
}

async fn read_multipart(
    headers: &HeaderMap,
    payload: web::Payload,
    limit: usize,
) -> Result<RawSubmission, AppError> {
    let mut multipart = Multipart::new(headers, payload);
    let mut raw = RawSubmission::default();
    let mut total = 0usize;

    while let Some(mut field) = multipart.try_next().await? {
        let name = field.name().map(str::to_owned);

        let mut value = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > limit {
                return Err(body_too_large(limit));
            }
            value.extend_from_slice(&chunk);
        }

        if let Some(name) = name {
            raw.set_field(&name, String::from_utf8_lossy(&value).into_owned());
        }
    }

    Ok(raw)
}
