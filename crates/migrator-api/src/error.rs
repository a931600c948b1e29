//! 에러 타입 정의.

use migrator_core::StoreError;
use migrator_engine::MigratorError;
use thiserror::Error;

/// 애플리케이션 에러
#[derive(Debug, Error)]
pub enum AppError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 마이그레이션 엔진 에러
    #[error(transparent)]
    Migrator(#[from] MigratorError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, AppError>;
