use std::net::IpAddr;

use axum::{debug_handler, extract::State, Json};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanAddr {
    pub iface: String,
    pub ip: IpAddr,
}

#[derive(Debug, Serialize)]
pub struct Info {
    pub ips: Vec<LanAddr>,
    pub port: u16,
    pub uptime_s: u64,
    pub clients: usize,
}

#[debug_handler]
pub async fn health() -> AppResult<Json<Health>> {
    Ok(Json(Health {
        status: "ok",
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
    }))
}

#[debug_handler]
pub async fn info(State(state): State<AppState>) -> AppResult<Json<Info>> {
    let stats = state.hub.stats().await?;
    Ok(Json(Info {
        ips: lan_addrs()?,
        port: state.config.port,
        uptime_s: state.started.elapsed().as_secs(),
        clients: stats.connections,
    }))
}

/// Non-loopback IPv4 addresses, one per interface address.
pub fn lan_addrs() -> anyhow::Result<Vec<LanAddr>> {
    let interfaces = local_ip_address::list_afinet_netifas()?;
    Ok(external_v4(interfaces))
}

fn external_v4(interfaces: Vec<(String, IpAddr)>) -> Vec<LanAddr> {
    interfaces
        .into_iter()
        .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
        .map(|(iface, ip)| LanAddr { iface, ip })
        .collect()
}
