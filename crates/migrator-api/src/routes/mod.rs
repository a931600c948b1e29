//! API 라우트.

pub mod migrator;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub use migrator::{migrator_router, ApiResponse};

/// 헬스 체크
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/migrator", migrator_router())
}
