use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy)]
struct RouteStats {
    requests: u64,
    errors: u64,
    total_micros: u128,
}

/// Per-route request counters: `"<METHOD> <route pattern>"` → stats.
#[derive(Debug, Default)]
pub struct ApiMetrics {
    routes: DashMap<String, RouteStats>,
}

#[derive(Debug, Serialize)]
pub struct RouteReport {
    pub route: String,
    pub requests: u64,
    pub errors: u64,
    pub average_response_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub average_response_ms: f64,
    pub routes: Vec<RouteReport>,
}

fn average_ms(total_micros: u128, requests: u64) -> f64 {
    if requests == 0 {
        0.0
    } else {
        total_micros as f64 / requests as f64 / 1000.0
    }
}

impl ApiMetrics {
    pub fn record(&self, route: &str, status: StatusCode, elapsed: Duration) {
        let mut stats = self.routes.entry(route.to_string()).or_default();
        stats.requests += 1;
        if status.is_client_error() || status.is_server_error() {
            stats.errors += 1;
        }
        stats.total_micros += elapsed.as_micros();
    }

    pub fn report(&self) -> AnalyticsReport {
        let mut routes = Vec::new();
        let (mut requests, mut errors, mut micros) = (0u64, 0u64, 0u128);

        for entry in self.routes.iter() {
            let stats = *entry.value();
            requests += stats.requests;
            errors += stats.errors;
            micros += stats.total_micros;
            routes.push(RouteReport {
                route: entry.key().clone(),
                requests: stats.requests,
                errors: stats.errors,
                average_response_ms: average_ms(stats.total_micros, stats.requests),
            });
        }
        routes.sort_by(|a, b| a.route.cmp(&b.route));

        AnalyticsReport {
            total_requests: requests,
            total_errors: errors,
            error_rate: if requests == 0 {
                0.0
            } else {
                errors as f64 / requests as f64
            },
            average_response_ms: average_ms(micros, requests),
            routes,
        }
    }
}

/// Records and logs every request against its matched route pattern.
pub async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "<unmatched>".to_string());

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status();

    state
        .metrics
        .record(&format!("{method} {route}"), status, elapsed);
    info!(
        %method,
        %route,
        status = status.as_u16(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "request handled"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_per_route_and_overall() {
        let metrics = ApiMetrics::default();
        metrics.record("GET /api/v1/books", StatusCode::OK, Duration::from_millis(10));
        metrics.record("GET /api/v1/books", StatusCode::OK, Duration::from_millis(30));
        metrics.record(
            "GET /api/v1/books/{id}",
            StatusCode::NOT_FOUND,
            Duration::from_millis(20),
        );
        metrics.record(
            "POST /api/v1/scraping/trigger",
            StatusCode::INTERNAL_SERVER_ERROR,
            Duration::from_millis(40),
        );

        let report = metrics.report();
        assert_eq!(report.total_requests, 4);
        assert_eq!(report.total_errors, 2);
        assert_eq!(report.error_rate, 0.5);
        assert_eq!(report.average_response_ms, 25.0);

        assert_eq!(report.routes[0].route, "GET /api/v1/books");
        assert_eq!(report.routes[0].requests, 2);
        assert_eq!(report.routes[0].average_response_ms, 20.0);
    }

    #[test]
    fn empty_report_has_zero_rates() {
        let report = ApiMetrics::default().report();
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.error_rate, 0.0);
        assert!(report.routes.is_empty());
    }
}
