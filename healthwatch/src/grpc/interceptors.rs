//! gRPC interceptors
//!
//! Interceptors run before every handler and may reject the call.

use tonic::{Request, Status};
use uuid::Uuid;

/// Metadata key carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID interceptor
///
/// Keeps a caller-supplied `x-request-id` or generates a new one, so every
/// handler log line can be correlated with the call.
pub fn request_id_interceptor(mut req: Request<()>) -> Result<Request<()>, Status> {
    let request_id = req
        .metadata()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.metadata_mut().insert(
        REQUEST_ID_HEADER,
        request_id
            .parse()
            .map_err(|_| Status::internal("Failed to parse request ID"))?,
    );

    Ok(req)
}

/// Request ID attached by [`request_id_interceptor`], or `"unknown"`
pub fn request_id_of<T>(req: &Request<T>) -> String {
    req.metadata()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_request_id() {
        let req = request_id_interceptor(Request::new(())).unwrap();
        let id = request_id_of(&req);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_keeps_caller_request_id() {
        let mut req = Request::new(());
        req.metadata_mut()
            .insert(REQUEST_ID_HEADER, "demo-42".parse().unwrap());

        let req = request_id_interceptor(req).unwrap();
        assert_eq!(request_id_of(&req), "demo-42");
    }

    #[test]
    fn test_missing_request_id() {
        assert_eq!(request_id_of(&Request::new(())), "unknown");
    }
}
