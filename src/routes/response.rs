//! Shared response helpers for the REST API
//!
//! Every JSON endpoint answers with the envelope
//! `{"success": bool, "data": ...}` or `{"success": false, "error": ...}`
//! so clients can branch without inspecting status codes. The CORS origin
//! header is appended centrally by the server, not here.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;

use crate::error::MandalartError;

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// 200 with a success envelope.
pub fn ok<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({"success": true, "data": data}),
    )
}

/// 201 with a success envelope.
pub fn created<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::CREATED,
        &serde_json::json!({"success": true, "data": data}),
    )
}

/// Map an error to its HTTP status and wrap it in the failure envelope.
pub fn error_response(err: &MandalartError) -> Response<Full<Bytes>> {
    let status = match err {
        MandalartError::NotFound(_) => StatusCode::NOT_FOUND,
        MandalartError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MandalartError::Auth(_) => StatusCode::UNAUTHORIZED,
        MandalartError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_response(
        status,
        &serde_json::json!({"success": false, "error": err.to_string()}),
    )
}

pub fn not_found(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({"success": false, "error": format!("No route for {}", path)}),
    )
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"success": false, "error": "Method not allowed"}),
    )
}

/// Empty 204 for OPTIONS preflight. The origin header joins the other CORS
/// headers when the server stamps it on.
pub fn cors_preflight() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, X-Api-Key, Authorization",
        )
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_wraps_the_data() {
        let resp = ok(&serde_json::json!({"id": "g1"}));
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "g1");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn each_error_variant_maps_to_its_status() {
        let cases = [
            (
                MandalartError::NotFound("Goal not found".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                MandalartError::InvalidInput("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                MandalartError::Auth("nope".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                MandalartError::Conflict("taken".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                MandalartError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let resp = error_response(&err);
            assert_eq!(resp.status(), status);
            let json = body_json(resp).await;
            assert_eq!(json["success"], false);
            assert!(json["error"].is_string());
            assert!(json.get("data").is_none());
        }
    }

    #[tokio::test]
    async fn clean_message_for_not_found() {
        let resp = error_response(&MandalartError::NotFound("Goal not found".to_string()));
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Goal not found");
    }

    #[test]
    fn preflight_allows_the_api_headers() {
        let resp = cors_preflight();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let allow = resp
            .headers()
            .get("Access-Control-Allow-Headers")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(allow.contains("X-Api-Key"));
    }
}
