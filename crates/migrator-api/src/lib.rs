//! 라이브 테이블 마이그레이션 제어 서버.
//!
//! 이 crate는 다음을 제공합니다:
//! - 환경변수 기반 설정 (`MigratorConfig`)
//! - phase 전환 / 검증 제어 HTTP 라우터
//! - `migrator` CLI 바이너리 (`serve`, `validate`)

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{FixConfig, MigratorConfig, ServerConfig, ValidationConfig};
pub use error::{AppError, Result};
pub use routes::{create_api_router, ApiResponse};
pub use state::{AppState, FIX_CONSUMER_GROUP};
