//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Every `/api` route shares one limiter keyed by client IP. Each client gets
//! a bucket of 100 requests that refills at 100 requests per 15 minutes (one
//! every 9 seconds). This is a GCRA bucket, not a fixed window: a client that
//! drains the bucket and keeps going gets one more request every 9 seconds.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{ConnectInfo, connect_info::MockConnectInfo},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use serde_json::json;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Bucket size: requests a client may make back to back.
pub const REQUESTS_PER_WINDOW: u32 = 100;

/// Time for an empty bucket to refill completely.
pub const WINDOW: Duration = Duration::from_secs(15 * 60);

const RATE_LIMITED_MESSAGE: &str =
    "Too many requests from this IP, please try again after 15 minutes";

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor for deployments behind a local reverse proxy.
///
/// Forwarding headers are honoured only when the socket peer is a loopback
/// address, i.e. the proxy runs on the same host. Then the first address in
/// `X-Forwarded-For` wins, then `X-Real-IP`. Any other peer is keyed on its own
/// address, whatever headers it sends.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

/// The socket peer, from the real connection info or the test mock.
fn peer_addr<T>(req: &Request<T>) -> Option<SocketAddr> {
    let extensions = req.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
}

/// Client address announced by a proxy.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = peer_addr(req).ok_or(GovernorError::UnableToExtractKey)?.ip();

        if peer.is_loopback()
            && let Some(ip) = forwarded_ip(req.headers())
        {
            return Ok(ip);
        }
        Ok(peer)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the `/api` rate limiter: [`REQUESTS_PER_WINDOW`] per [`WINDOW`].
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    rate_limiter(WINDOW / REQUESTS_PER_WINDOW, REQUESTS_PER_WINDOW)
}

/// A per-IP limiter with room for `burst` requests, regaining one every
/// `replenish`.
///
/// # Panics
///
/// Panics if `replenish` is zero or `burst` is zero, which
/// `GovernorConfigBuilder` rejects.
#[must_use]
pub fn rate_limiter(replenish: Duration, burst: u32) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .period(replenish)
        .burst_size(burst)
        .finish()
        .expect("rate limiter config with non-zero period and burst is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Rewrite the limiter's plain-text 429 into the API's JSON error shape.
pub async fn rate_limit_response(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let mut rewritten = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "message": RATE_LIMITED_MESSAGE })),
    )
        .into_response();

    // Keep retry-after and x-ratelimit-* headers from the limiter
    parts.headers.remove(axum::http::header::CONTENT_TYPE);
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    rewritten.headers_mut().extend(parts.headers.drain());
    rewritten
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const PROXY: &str = "127.0.0.1:40000";
    const REMOTE: &str = "192.0.2.10:51000";

    fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/api/products");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        if let Some(addr) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        }
        req
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_loopback_proxy_forwarded_for_takes_first_hop() {
        let req = request(
            &[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "198.51.100.2")],
            Some(PROXY),
        );
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), ip("203.0.113.7"));
    }

    #[test]
    fn test_loopback_proxy_real_ip_then_peer() {
        let req = request(&[("x-real-ip", "198.51.100.2")], Some(PROXY));
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), ip("198.51.100.2"));

        let req = request(&[("x-forwarded-for", "garbage")], Some(PROXY));
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), ip("127.0.0.1"));
    }

    #[test]
    fn test_remote_peer_headers_are_ignored() {
        let req = request(
            &[("x-forwarded-for", "10.1.2.3"), ("x-real-ip", "10.4.5.6")],
            Some(REMOTE),
        );
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), ip("192.0.2.10"));
    }

    #[test]
    fn test_mock_connect_info_is_a_peer() {
        let mut req = request(&[], None);
        req.extensions_mut()
            .insert(MockConnectInfo(REMOTE.parse::<SocketAddr>().unwrap()));
        assert_eq!(ClientIpKeyExtractor.extract(&req).unwrap(), ip("192.0.2.10"));
    }

    #[test]
    fn test_no_peer_is_an_error() {
        let req = request(&[("x-forwarded-for", "203.0.113.7")], None);
        assert!(ClientIpKeyExtractor.extract(&req).is_err());
    }

    fn limited_app(replenish: Duration, burst: u32) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(rate_limiter(replenish, burst))
            .layer(axum::middleware::map_response(rate_limit_response))
            .layer(MockConnectInfo(REMOTE.parse::<SocketAddr>().unwrap()))
    }

    async fn status_of(app: &Router, forwarded_for: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/");
        if let Some(xff) = forwarded_for {
            builder = builder.header("x-forwarded-for", xff);
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_forged_forwarded_for_does_not_reset_the_bucket() {
        let app = limited_app(Duration::from_secs(60), 3);

        for i in 0..3 {
            let xff = format!("10.0.{i}.1");
            assert_eq!(status_of(&app, Some(&xff)).await, StatusCode::OK);
        }
        assert_eq!(
            status_of(&app, Some("10.9.9.1")).await,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_bucket_refills_one_request_per_period() {
        let app = limited_app(Duration::from_millis(300), 2);

        assert_eq!(status_of(&app, None).await, StatusCode::OK);
        assert_eq!(status_of(&app, None).await, StatusCode::OK);
        assert_eq!(status_of(&app, None).await, StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_millis(350)).await;

        // One period restores exactly one request, not the whole bucket
        assert_eq!(status_of(&app, None).await, StatusCode::OK);
        assert_eq!(status_of(&app, None).await, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_api_limiter_refills_every_nine_seconds() {
        assert_eq!(WINDOW / REQUESTS_PER_WINDOW, Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_rate_limit_response_rewrites_429_only() {
        let ok = rate_limit_response(StatusCode::OK.into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);

        let limited = rate_limit_response(
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "9")],
                "Too Many Requests! Wait for 9s",
            )
                .into_response(),
        )
        .await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers()["retry-after"], "9");

        let bytes = axum::body::to_bytes(limited.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], RATE_LIMITED_MESSAGE);
    }
}
