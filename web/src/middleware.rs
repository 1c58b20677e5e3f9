//! Request tracking middleware.
//!
//! Every request gets a correlation ID (taken from `X-Correlation-ID` when the
//! caller supplies a valid UUID, generated otherwise), runs inside a tracing
//! span carrying it, and is counted and timed in the HTTP metrics. The ID is
//! echoed back on the response.
//!
//! # Example
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/bookings", post(create_booking))
//!     .route_layer(request_tracking_layer());
//! ```

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    response::Response,
};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Register HTTP metric descriptions. Call once at startup.
pub fn register_http_metrics() {
    metrics::describe_counter!(
        "showtime_http_requests_total",
        "API requests by method, route template and status"
    );
    metrics::describe_histogram!(
        "showtime_http_request_duration_seconds",
        "API request latency by method and route template"
    );
}

/// Create the request tracking layer.
#[must_use]
pub const fn request_tracking_layer() -> RequestTrackingLayer {
    RequestTrackingLayer
}

/// Layer for request tracking.
#[derive(Clone, Debug)]
pub struct RequestTrackingLayer;

impl<S> Layer<S> for RequestTrackingLayer {
    type Service = RequestTracking<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracking { inner }
    }
}

/// Middleware service for request tracking.
#[derive(Clone, Debug)]
pub struct RequestTracking<S> {
    inner: S,
}

impl<S> Service<Request> for RequestTracking<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(correlation_id);

        // Label by route template so IDs in paths do not explode cardinality.
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
        let method = req.method().to_string();

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %method,
            route = %route,
        );

        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            let status = response.status().as_u16().to_string();
            metrics::counter!(
                "showtime_http_requests_total",
                "method" => method.clone(),
                "route" => route.clone(),
                "status" => status
            )
            .increment(1);
            metrics::histogram!(
                "showtime_http_request_duration_seconds",
                "method" => method,
                "route" => route
            )
            .record(started.elapsed().as_secs_f64());

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}
