//! 에러 타입 정의.

use migrator_core::StoreError;
use thiserror::Error;

/// 이벤트 채널 에러.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// 채널이 닫힘
    #[error("채널 닫힘")]
    Closed,

    /// 직렬화 실패
    #[error("직렬화 실패: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 전송 계층 에러
    #[error("전송 에러: {0}")]
    Transport(String),
}

/// 마이그레이션 엔진 에러.
#[derive(Debug, Error)]
pub enum MigratorError {
    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 이벤트 채널 에러
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// 알 수 없는 권위 방향
    #[error("알 수 없는 방향: {0}")]
    UnknownDirection(String),

    /// 잘못된 인자
    #[error("잘못된 인자: {0}")]
    InvalidArgument(String),

    /// 이벤트 디코딩 실패
    #[error("이벤트 디코딩 실패: {0}")]
    Decode(#[from] serde_json::Error),
}

impl MigratorError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Channel(ChannelError::Transport(_)) => true,
            _ => false,
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, MigratorError>;
