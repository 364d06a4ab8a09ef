//! Pool status, set, stop and restart commands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json, post_json_body};

pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetRequest {
    pub peers: u32,
    pub timeout: u32,
    pub burst: u32,
    pub wait: i32,
}

#[derive(Deserialize)]
struct SetResponse {
    peers: u32,
    timeout: u32,
}

#[derive(Deserialize)]
struct StatusResponse {
    state: String,
    peers: u32,
    timeout: u32,
    burst: u32,
    wait: i32,
    live: usize,
    connected: usize,
}

#[derive(Deserialize)]
struct StateResponse {
    state: String,
}

// ── Argument parsing ──────────────────────────────────────────────────────────

/// Parse `PEERS [--timeout MS] [--burst N] [--wait MS]`.
pub fn parse_set_args(args: &[&str]) -> Result<SetRequest> {
    let mut req = SetRequest {
        peers: 0,
        timeout: DEFAULT_TIMEOUT_MS,
        burst: 0,
        wait: 0,
    };
    let mut peers: Option<u32> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--timeout" | "--burst" | "--wait" => {
                let flag = args[i];
                i += 1;
                let value = args
                    .get(i)
                    .with_context(|| format!("{} requires a value", flag))?;
                match flag {
                    "--timeout" => {
                        req.timeout = value.parse().context("--timeout must be a number")?
                    }
                    "--burst" => req.burst = value.parse().context("--burst must be a number")?,
                    _ => req.wait = value.parse().context("--wait must be a number")?,
                }
            }
            other if peers.is_none() => {
                peers = Some(other.parse().context("PEERS must be a number")?);
            }
            other => anyhow::bail!("unexpected argument: {}", other),
        }
        i += 1;
    }

    req.peers = peers.context("set requires PEERS")?;
    Ok(req)
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/pool", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Surge Pool Status");
    println!("═══════════════════════════════════════");
    println!("  State      : {}", resp.state);
    println!("  Target     : {} peers", resp.peers);
    println!("  Timeout    : {} ms", resp.timeout);
    if resp.burst > 0 {
        println!("  Burst      : {} every {} ms", resp.burst, resp.wait.max(0));
    } else {
        println!("  Burst      : unlimited");
    }
    println!("  Live       : {}", resp.live);
    println!("  Connected  : {}", resp.connected);

    Ok(())
}

pub async fn cmd_set(port: u16, req: SetRequest) -> Result<()> {
    let resp: SetResponse = post_json_body(&format!("{}/pool", base_url(port)), &req).await?;
    println!(
        "Target set to {} peers for {} ms.",
        resp.peers, resp.timeout
    );
    Ok(())
}

pub async fn cmd_stop(port: u16) -> Result<()> {
    let resp: StateResponse = post_json(&format!("{}/pool/stop", base_url(port))).await?;
    println!("Pool {}.", resp.state);
    Ok(())
}

pub async fn cmd_restart(port: u16) -> Result<()> {
    let resp: StateResponse = post_json(&format!("{}/pool/restart", base_url(port))).await?;
    println!("Pool {}.", resp.state);
    Ok(())
}
