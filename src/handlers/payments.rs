use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::auth::{CurrentUser, Role};
use crate::errors::ServiceError;
use crate::services::payments::{
    CallbackResponse, InitiatePaymentRequest, InitiatePaymentResponse, PaymentCallbackRequest,
    PaymentSummary,
};
use crate::{AppState, ListQuery, Paginated};

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate))
        .route("/callback", post(callback))
        .route("/my", get(my_payments))
}

/// Start a payment attempt for an unpaid order.
#[utoipa::path(
    post,
    path = "/api/payments/initiate",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Pending transaction created", body = InitiatePaymentResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<InitiatePaymentResponse>), ServiceError> {
    current.require_role(Role::User)?;
    let response = state.services.payments.initiate(current.id(), req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Provider webhook reporting the outcome of a payment attempt.
///
/// Anonymous by necessity; when a webhook secret is configured the raw body
/// must carry a valid HMAC signature.
#[utoipa::path(
    post,
    path = "/api/payments/callback",
    request_body = PaymentCallbackRequest,
    responses(
        (status = 200, description = "Callback processed", body = CallbackResponse),
        (status = 400, description = "Invalid payload or status", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown provider reference", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflicting terminal state", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ServiceError> {
    if let Some(secret) = state.config.payment_webhook_secret.as_deref() {
        let tolerance = state.config.payment_webhook_tolerance_secs.unwrap_or(300);
        if !verify_signature(&headers, &body, secret, tolerance) {
            warn!("payment callback signature verification failed");
            return Err(ServiceError::Unauthorized(
                "Invalid callback signature".to_string(),
            ));
        }
    }

    let req: PaymentCallbackRequest = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid callback payload: {e}")))?;

    let outcome = state.services.payments.process_callback(req).await?;
    Ok(Json(outcome))
}

/// The caller's payment transactions, newest first.
#[utoipa::path(
    get,
    path = "/api/payments/my",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("pageSize" = Option<u64>, Query, description = "Page size (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Own transactions", body = Paginated<PaymentSummary>),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn my_payments(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<PaymentSummary>>, ServiceError> {
    current.require_role(Role::User)?;
    let page = state
        .services
        .payments
        .my_payments(current.id(), &query)
        .await?;
    Ok(Json(page))
}

/// HMAC-SHA256 over `{timestamp}.{body}` carried in `x-timestamp` /
/// `x-signature` headers, with a bounded clock skew.
fn verify_signature(headers: &HeaderMap, payload: &[u8], secret: &str, tolerance_secs: u64) -> bool {
    let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) else {
        return false;
    };
    let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) else {
        return false;
    };

    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, ts: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(ts.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_passes() {
        let secret = "webhook-secret";
        let body = br#"{"provider_ref":"x","status":"Success"}"#;
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign(secret, &ts, body);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", ts.parse().unwrap());
        headers.insert("x-signature", sig.parse().unwrap());

        assert!(verify_signature(&headers, body, secret, 300));
    }

    #[test]
    fn stale_timestamp_fails() {
        let secret = "webhook-secret";
        let body = b"{}";
        let ts = (chrono::Utc::now().timestamp() - 3600).to_string();
        let sig = sign(secret, &ts, body);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", ts.parse().unwrap());
        headers.insert("x-signature", sig.parse().unwrap());

        assert!(!verify_signature(&headers, body, secret, 300));
    }

    #[test]
    fn wrong_signature_fails() {
        let body = b"{}";
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign("other-secret", &ts, body);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", ts.parse().unwrap());
        headers.insert("x-signature", sig.parse().unwrap());

        assert!(!verify_signature(&headers, body, "webhook-secret", 300));
    }

    #[test]
    fn missing_headers_fail() {
        assert!(!verify_signature(&HeaderMap::new(), b"{}", "s", 300));
    }
}
