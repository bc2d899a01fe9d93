//! API Middleware - Input Validation, Errors and Request Logging
//!
//! - Input validation for whitelist request fields
//! - `ApiError`, the JSON error response of every handler
//! - Request logging with correlation IDs
//! - Security headers

use axum::{
    extract::{rejection::JsonRejection, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Instant;

use crate::common::logging::{generate_correlation_id, log_api_request, log_api_response};
pub use crate::types::whitelist::MAX_ADDRESS_LEN;
use crate::types::whitelist::address_problem;
use crate::whitelist::WhitelistError;

/// Header carrying the correlation ID in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const MAX_EMAIL_LEN: usize = 254;

// ============================================================================
// Input Validation
// ============================================================================

/// Validation result
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![msg.into()],
        }
    }

    /// Turn a failed validation into a 400
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors.join("; ")))
        }
    }
}

/// Validate a wallet address
pub fn validate_wallet_address(address: &str) -> ValidationResult {
    match address_problem(address) {
        Some(problem) => ValidationResult::error(problem),
        None => ValidationResult::ok(),
    }
}

/// Validate an email; empty means "no email"
pub fn validate_email(email: &str) -> ValidationResult {
    if email.is_empty() {
        return ValidationResult::ok();
    }

    if email.len() > MAX_EMAIL_LEN {
        return ValidationResult::error(format!(
            "Email must not exceed {} characters",
            MAX_EMAIL_LEN
        ));
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            ValidationResult::ok()
        }
        _ => ValidationResult::error("Email is not a valid address"),
    }
}

/// Validate an allocation and convert it to token units
pub fn validate_allocation(allocation: Option<i64>) -> Result<Option<u64>, ApiError> {
    match allocation {
        None => Ok(None),
        Some(value) => u64::try_from(value)
            .map(Some)
            .map_err(|_| ApiError::validation("Allocation must be a non-negative integer")),
    }
}

/// Unwrap a JSON body, reporting malformed bodies as 400s
pub fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

// ============================================================================
// Error Response
// ============================================================================

/// Error returned by API handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or malformed request fields (400)
    Validation(String),
    /// Duplicate address (400)
    Conflict(String),
    /// Address not present (404)
    NotFound(String),
    /// Backing store failure under the propagate policy (500)
    Storage(String),
}

/// JSON body of an error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "ALREADY_WHITELISTED",
            ApiError::NotFound(_) => "NOT_WHITELISTED",
            ApiError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(m)
            | ApiError::Conflict(m)
            | ApiError::NotFound(m)
            | ApiError::Storage(m) => m,
        }
    }
}

impl From<WhitelistError> for ApiError {
    fn from(err: WhitelistError) -> Self {
        match err {
            WhitelistError::AlreadyWhitelisted(_) => {
                ApiError::Conflict("Address is already whitelisted".to_string())
            }
            WhitelistError::NotWhitelisted(_) => {
                ApiError::NotFound("Address is not whitelisted".to_string())
            }
            WhitelistError::Storage(e) => ApiError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message().to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract client IP from request headers
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    // Try X-Forwarded-For first (for proxied requests)
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            // Take the first IP in the chain
            return Some(value.split(',').next()?.trim().to_string());
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }

    None
}

/// Log each request/response pair under one correlation ID
///
/// An incoming `x-request-id` is reused; otherwise a new one is generated.
/// The ID is echoed back on the response.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(request.headers());

    log_api_request(&method, &path, client_ip.as_deref(), &correlation_id);
    let started = Instant::now();

    let mut response = next.run(request).await;

    log_api_response(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
        &correlation_id,
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'"),
    );

    response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_wallet_address_validation() {
        assert!(validate_wallet_address("W1").is_valid);
        assert!(validate_wallet_address("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM").is_valid);
        assert!(validate_wallet_address("0x52908400098527886E0F7030069857D2E4169EE7").is_valid);

        assert!(!validate_wallet_address("").is_valid);
        assert!(!validate_wallet_address("   ").is_valid);
        assert!(!validate_wallet_address("two words").is_valid);
        assert!(!validate_wallet_address(&"a".repeat(MAX_ADDRESS_LEN + 1)).is_valid);
        assert!(!validate_wallet_address("bulk-add").is_valid);
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("").is_valid);
        assert!(validate_email("ops@example.com").is_valid);

        assert!(!validate_email("ops").is_valid);
        assert!(!validate_email("@example.com").is_valid);
        assert!(!validate_email("ops@localhost").is_valid);
        assert!(!validate_email("ops@example.com.").is_valid);
        assert!(!validate_email("o ps@example.com").is_valid);
    }

    #[test]
    fn test_allocation_validation() {
        assert_eq!(validate_allocation(None), Ok(None));
        assert_eq!(validate_allocation(Some(0)), Ok(Some(0)));
        assert_eq!(validate_allocation(Some(500)), Ok(Some(500)));
        assert!(matches!(
            validate_allocation(Some(-1)),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_failed_validation_is_bad_request() {
        let result = validate_wallet_address("remove").into_result();
        assert!(matches!(result, Err(ApiError::Validation(msg)) if msg.contains("reserved")));
    }

    #[test]
    fn test_whitelist_error_mapping() {
        let conflict = ApiError::from(WhitelistError::AlreadyWhitelisted("W1".to_string()));
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(conflict.message(), "Address is already whitelisted");

        let missing = ApiError::from(WhitelistError::NotWhitelisted("W1".to_string()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.message(), "Address is not whitelisted");

        let storage = ApiError::from(WhitelistError::Storage(StorageError::Connection(
            "refused".to_string(),
        )));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_extract_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
