//! /pool handlers: set the desired amount, inspect, stop and restart.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use surge_core::DesiredAmount;

use super::ApiState;

// ── Validation ────────────────────────────────────────────────────────────────

/// Read a field as a 32-bit integer.
///
/// Accepts JSON numbers without a fractional part and strings holding a
/// decimal integer. Anything else, including a missing field, is rejected.
fn integer(value: Option<&Value>) -> Option<i32> {
    let n = match value? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    i32::try_from(n).ok()
}

fn invalid(field: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("invalid {field}"))
}

fn non_negative(body: &Value, field: &str) -> Result<u32, (StatusCode, String)> {
    integer(body.get(field))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| invalid(field))
}

/// Validate a control request body. Fields are checked in order and the
/// first failure wins.
///
/// `wait` is only checked for integrality; negative values pass through and
/// are treated as no pause by the pool.
pub fn parse_desired(body: &Value) -> Result<DesiredAmount, (StatusCode, String)> {
    let peers = non_negative(body, "peers")?;
    let timeout = non_negative(body, "timeout")?;
    let burst = non_negative(body, "burst")?;
    let wait = integer(body.get("wait")).ok_or_else(|| invalid("wait"))?;
    Ok(DesiredAmount::new(peers, timeout, burst, wait))
}

// ── /pool (POST) ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PoolSetResponse {
    pub peers: u32,
    pub timeout: u32,
}

pub async fn handle_pool_set(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<Json<PoolSetResponse>, (StatusCode, String)> {
    let amount = parse_desired(&body)?;
    state.pool.set_desired_amount(amount);

    tracing::info!(
        peers = amount.peers,
        timeout = amount.timeout,
        "running load test"
    );

    Ok(Json(PoolSetResponse {
        peers: amount.peers,
        timeout: amount.timeout,
    }))
}

// ── /pool (GET) ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PoolStatusResponse {
    pub state: String,
    pub peers: u32,
    pub timeout: u32,
    pub burst: u32,
    pub wait: i32,
    pub live: usize,
    pub connected: usize,
}

pub async fn handle_pool_status(State(state): State<ApiState>) -> Json<PoolStatusResponse> {
    let desired = state.pool.desired();
    Json(PoolStatusResponse {
        state: state.pool.state().to_string(),
        peers: desired.peers,
        timeout: desired.timeout,
        burst: desired.burst,
        wait: desired.wait,
        live: state.pool.sockets().len(),
        connected: state.pool.connected_sockets().len(),
    })
}

// ── /pool/stop, /pool/restart (POST) ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PoolStateResponse {
    pub state: String,
}

pub async fn handle_pool_stop(State(state): State<ApiState>) -> Json<PoolStateResponse> {
    state.pool.stop();
    Json(PoolStateResponse {
        state: state.pool.state().to_string(),
    })
}

pub async fn handle_pool_restart(
    State(state): State<ApiState>,
) -> Result<Json<PoolStateResponse>, (StatusCode, String)> {
    state.pool.restart().await.map_err(|e| {
        tracing::warn!(error = %e, "pool restart rejected");
        (StatusCode::CONFLICT, e.to_string())
    })?;
    tracing::info!("pool restarted via API");
    Ok(Json(PoolStateResponse {
        state: state.pool.state().to_string(),
    }))
}
