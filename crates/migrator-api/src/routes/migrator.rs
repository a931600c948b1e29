//! 마이그레이션 제어 API 라우트
//!
//! phase 전환과 전체/증분 검증 시작·중지, 상태 조회를 제공합니다.
//! 모든 응답은 `{"code": 0, "msg": "OK"}` 형태이며, 잘못된 인자는
//! HTTP 400과 `code = 5`로 응답합니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use migrator_core::Phase;
use migrator_engine::{MigratorError, SchedulerStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

/// 성공 코드
pub const CODE_OK: i32 = 0;
/// 잘못된 인자 코드
pub const CODE_INVALID_ARGUMENT: i32 = 5;

// ==================== Request/Response 타입 ====================

/// 공통 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: String,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            code: CODE_OK,
            msg: "OK".to_string(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_INVALID_ARGUMENT,
            msg: msg.into(),
        }
    }
}

type ApiResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<ApiResponse>) {
    let msg = msg.into();
    warn!(msg = %msg, "잘못된 요청");
    (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid_argument(msg)))
}

/// 증분 검증 시작 요청
#[derive(Debug, Clone, Deserialize)]
pub struct IncrementalStartRequest {
    /// 수정 시각 하한 (epoch 밀리초, 0이면 전체)
    pub utime: i64,
    /// 스캔 간격 (밀리초, 0보다 커야 함)
    pub interval: i64,
}

/// 상태 조회 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub code: i32,
    pub msg: String,
    pub data: StatusData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    #[serde(flatten)]
    pub scheduler: SchedulerStatus,
    /// 아직 수정되지 않은 이벤트 수
    pub pending_events: u64,
    pub server_time: DateTime<Utc>,
}

// ==================== 핸들러 ====================

async fn switch_phase(state: &AppState, phase: Phase) -> Json<ApiResponse> {
    state.scheduler.switch_phase(phase).await;
    Json(ApiResponse::ok())
}

async fn src_only(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    switch_phase(&state, Phase::SrcOnly).await
}

async fn src_first(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    switch_phase(&state, Phase::SrcFirst).await
}

async fn dst_first(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    switch_phase(&state, Phase::DstFirst).await
}

async fn dst_only(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    switch_phase(&state, Phase::DstOnly).await
}

async fn start_full_validation(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.scheduler.start_full_validation().await;
    Json(ApiResponse::ok())
}

async fn stop_full_validation(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.scheduler.stop_full_validation().await;
    Json(ApiResponse::ok())
}

async fn start_incremental_validation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IncrementalStartRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;

    if req.interval <= 0 {
        return Err(bad_request(format!(
            "interval은 0보다 커야 함: {}",
            req.interval
        )));
    }
    if req.utime < 0 {
        return Err(bad_request(format!("utime은 음수일 수 없음: {}", req.utime)));
    }

    let interval = Duration::from_millis(req.interval as u64);
    match state
        .scheduler
        .start_incremental_validation(req.utime, interval)
        .await
    {
        Ok(()) => {
            info!(utime = req.utime, interval_ms = req.interval, "증분 검증 요청 처리");
            Ok(Json(ApiResponse::ok()))
        }
        Err(e @ MigratorError::InvalidArgument(_)) => Err(bad_request(e.to_string())),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse {
                code: -1,
                msg: e.to_string(),
            }),
        )),
    }
}

async fn stop_incremental_validation(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.scheduler.stop_incremental_validation().await;
    Json(ApiResponse::ok())
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let scheduler = state.scheduler.status().await;
    let pending_events = state.pending_events().await;

    Json(StatusResponse {
        code: CODE_OK,
        msg: "OK".to_string(),
        data: StatusData {
            scheduler,
            pending_events,
            server_time: Utc::now(),
        },
    })
}

// ==================== 라우터 ====================

/// 마이그레이션 제어 라우터 생성.
pub fn migrator_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/src-only", post(src_only))
        .route("/src-first", post(src_first))
        .route("/dst-first", post(dst_first))
        .route("/dst-only", post(dst_only))
        .route("/full/start", post(start_full_validation))
        .route("/full/stop", post(stop_full_validation))
        .route("/incr/start", post(start_incremental_validation))
        .route("/incr/stop", post(stop_incremental_validation))
        .route("/status", get(get_status))
}

// ==================== 테스트 ====================
