use std::sync::{Arc, Mutex, OnceLock};

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use sysinfo::System;
use tracing::info;

use crate::auth::{guards, Identity};
use crate::models::{DiagnosticsResponse, ErrorResponse, Rejection};
use crate::state::AppState;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Gateway counters and process resource usage
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    tag = "admin",
    responses(
        (status = 200, description = "Diagnostics snapshot", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse)
    )
)]
pub async fn diagnostics(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), Rejection> {
    let _ = guards::ensure_admin(&identity)?;

    let stats = state.hub.stats().await;
    let n_cached_tokens = state.verifier.cached_identities() as u32;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0),
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}, Online: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        stats.connections,
        stats.rooms,
        stats.online_users
    );

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn: stats.connections as u32,
            n_rooms: stats.rooms as u32,
            n_online_users: stats.online_users as u32,
            n_cached_tokens,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    ))
}
