//! 저장소 계층 에러 타입.

use thiserror::Error;

/// 저장소(Store) 에러.
///
/// "행 없음"은 에러가 아니라 `Option::None`으로 표현합니다.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 드라이버 에러
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    /// 지원하지 않는 연산 (예: 이중 쓰기 풀의 prepared statement)
    #[error("지원하지 않는 연산: {0}")]
    Unsupported(String),

    /// 알 수 없는 phase 값
    #[error("알 수 없는 phase: {0}")]
    UnknownPhase(u8),

    /// 행 디코딩 실패
    #[error("행 디코딩 실패: {0}")]
    Decode(String),

    /// 잘못된 식별자 (테이블/컬럼명)
    #[error("잘못된 식별자: {0}")]
    InvalidIdentifier(String),

    /// 저장소에 일시적으로 접근할 수 없음
    #[error("저장소 사용 불가: {0}")]
    Unavailable(String),

    /// 기타 에러
    #[error("저장소 에러: {0}")]
    Other(String),
}

impl StoreError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 연결 수준의 일시적인 에러만 재시도 대상입니다.
    /// 제약 조건 위반, 문법 오류 등 서버가 돌려준 에러는 제외.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::WorkerCrashed
            ),
            Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, StoreError>;
