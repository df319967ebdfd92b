//! # Prometheus Metrics
//!
//! Exposes the hosted vault's accounting and the node's operation counts.
//! Scraped by Prometheus at the `/metrics` HTTP endpoint on the configured
//! metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Gauge, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use aloc_contracts::LineOfCredit;
use aloc_protocol::{Assets, Shares};

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Liquidity plus debt minus unpaid fee, in asset base units.
    pub total_assets: Gauge,
    pub total_debt: Gauge,
    /// Deposited liquidity as of the last materialization.
    pub liquidity: Gauge,
    pub unpaid_fee: Gauge,
    pub share_supply: Gauge,
    pub utilization_bps: IntGauge,
    pub interest_rate_bps: IntGauge,
    /// Completed operations by name.
    pub operations_total: IntCounterVec,
    /// Rejected operations by name and error category.
    pub rejected_operations_total: IntCounterVec,
    /// Vault events by name.
    pub events_total: IntCounterVec,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let g = IntGauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, prometheus::Error> {
    let c = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("aloc".into()), None)?;
        Ok(Self {
            total_assets: gauge(&registry, "vault_total_assets", "Total assets in base units")?,
            total_debt: gauge(&registry, "vault_total_debt", "Principal plus interest in base units")?,
            liquidity: gauge(&registry, "vault_liquidity", "Deposited liquidity in base units")?,
            unpaid_fee: gauge(&registry, "vault_unpaid_fee", "Protocol fee owed in base units")?,
            share_supply: gauge(&registry, "vault_share_supply", "Outstanding shares")?,
            utilization_bps: int_gauge(
                &registry,
                "vault_utilization_bps",
                "Share of assets lent out, in basis points",
            )?,
            interest_rate_bps: int_gauge(
                &registry,
                "vault_interest_rate_bps",
                "Current annual borrow rate, in basis points",
            )?,
            operations_total: counter_vec(
                &registry,
                "operations_total",
                "Completed vault operations",
                &["op"],
            )?,
            rejected_operations_total: counter_vec(
                &registry,
                "rejected_operations_total",
                "Rejected vault operations",
                &["op", "category"],
            )?,
            events_total: counter_vec(&registry, "vault_events_total", "Vault events emitted", &["event"])?,
            registry,
        })
    }

    /// Refreshes the gauges from the vault's current views. A view that
    /// cannot be computed leaves its gauge at the previous value.
    pub fn observe(&self, vault: &LineOfCredit) {
        if let Ok(v) = vault.total_assets() {
            self.total_assets.set(assets_f64(v));
        }
        if let Ok(v) = vault.total_debt() {
            self.total_debt.set(assets_f64(v));
        }
        if let Ok(v) = vault.get_fee() {
            self.unpaid_fee.set(assets_f64(v));
        }
        if let Ok(v) = vault.utilization() {
            self.utilization_bps.set(i64::from(v.get()));
        }
        if let Ok(v) = vault.interest_rate() {
            self.interest_rate_bps.set(i64::from(v.get()));
        }
        self.liquidity
            .set(assets_f64(vault.ledger().deposited_liquidity));
        self.share_supply.set(shares_f64(vault.total_supply()));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// Gauges are f64; anything past 2^53 base units loses precision, which is
// acceptable for dashboards.
fn assets_f64(v: Assets) -> f64 {
    v.raw().low_u128() as f64
}

fn shares_f64(v: Shares) -> f64 {
    v.raw().low_u128() as f64
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
