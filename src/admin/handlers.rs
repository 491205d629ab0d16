use axum::{extract::State, Json};
use serde::Serialize;

use crate::edge::{CspVariant, HostPolicy, Phase};
use crate::http::server::{AppState, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FunctionAssociation {
    pub phase: Phase,
    pub function: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SiteSummary {
    pub domain_name: String,
    pub host_policy: HostPolicy,
    pub content_security_policy: CspVariant,
    pub functions: Vec<FunctionAssociation>,
    pub origin: String,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_site(State(state): State<AppState>) -> Json<SiteSummary> {
    let inner = state.inner.load_full();
    let functions = inner
        .functions
        .describe()
        .into_iter()
        .map(|(phase, function)| FunctionAssociation { phase, function })
        .collect();

    Json(SiteSummary {
        domain_name: inner.config.site.domain_name.clone(),
        host_policy: inner.config.site.host_policy.clone(),
        content_security_policy: inner.config.site.content_security_policy,
        functions,
        origin: inner.origin.base_url(),
    })
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
