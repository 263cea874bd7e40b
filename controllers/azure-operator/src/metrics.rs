//! Prometheus metrics and the probe/metrics HTTP server.
//!
//! All collectors live in a registry owned by [`Metrics`]; handlers receive
//! it through the reconciler instead of touching process globals.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Collectors exported by the operator
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    stage_transitions: IntCounterVec,
    reconcile_errors: IntCounterVec,
    unhealthy_node_termination: GaugeVec,
}

impl Metrics {
    /// Create the collectors and register them in a fresh registry
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let stage_transitions = IntCounterVec::new(
            Opts::new(
                "azure_operator_stage_transitions_total",
                "Number of state machine stage transitions",
            ),
            &["controller", "from", "to"],
        )?;
        let reconcile_errors = IntCounterVec::new(
            Opts::new(
                "azure_operator_reconcile_errors_total",
                "Number of failed reconciliations",
            ),
            &["controller"],
        )?;
        let unhealthy_node_termination = GaugeVec::new(
            Opts::new(
                "azure_operator_unhealthy_node_termination",
                "Worker nodes terminated by the operator",
            ),
            &["cluster_id", "terminated_node", "terminated_instance_id"],
        )?;

        registry.register(Box::new(stage_transitions.clone()))?;
        registry.register(Box::new(reconcile_errors.clone()))?;
        registry.register(Box::new(unhealthy_node_termination.clone()))?;

        Ok(Self {
            registry,
            stage_transitions,
            reconcile_errors,
            unhealthy_node_termination,
        })
    }

    /// Count a stage change of one state machine
    pub fn record_transition(&self, controller: &str, from: &str, to: &str) {
        self.stage_transitions
            .with_label_values(&[controller, from, to])
            .inc();
    }

    /// Count a failed reconciliation
    pub fn record_error(&self, controller: &str) {
        self.reconcile_errors.with_label_values(&[controller]).inc();
    }

    /// Record that a worker node and its instance were removed
    pub fn report_node_termination(&self, cluster_id: &str, node: &str, instance_id: &str) {
        self.unhealthy_node_termination
            .with_label_values(&[cluster_id, node, instance_id])
            .set(1.0);
    }

    /// Prometheus text exposition of all collectors
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

async fn render_metrics(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Routes of the metrics server: `/metrics`, `/healthz` and `/readyz`
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .with_state(metrics)
        .layer(TraceLayer::new_for_http())
}

/// Serve [`router`] on `addr` until the listener fails
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to bind metrics server on {addr}: {e}")))?;
    info!("Serving metrics and probes on {}", addr);
    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| ControllerError::Watch(format!("metrics server failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_render_contains_recorded_values() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("masters", "Empty", "DeploymentUninitialized");
        metrics.report_node_termination("abc12", "nodepool-np1-000003", "3");

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"azure_operator_stage_transitions_total{controller="masters",from="Empty",to="DeploymentUninitialized"} 1"#
        ));
        assert!(text.contains(
            r#"azure_operator_unhealthy_node_termination{cluster_id="abc12",terminated_instance_id="3",terminated_node="nodepool-np1-000003"} 1"#
        ));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_error("nodepool");

        let response = router(metrics)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"azure_operator_reconcile_errors_total{controller="nodepool"} 1"#));
    }

    #[tokio::test]
    async fn test_probes() {
        let app = router(Arc::new(Metrics::new().unwrap()));
        for uri in ["/healthz", "/readyz"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
