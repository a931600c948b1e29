//! 환경변수 기반 설정 모듈.

use std::net::SocketAddr;
use std::time::Duration;

use migrator_core::{Dialect, Phase, TableSpec};
use migrator_data::DatabaseConfig;
use migrator_engine::{RetryConfig, SchedulerConfig};

use crate::error::{AppError, Result};

/// 마이그레이션 전체 설정
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// 소스 데이터베이스
    pub src: DatabaseConfig,
    /// 목적지 데이터베이스
    pub dst: DatabaseConfig,
    /// 대상 테이블
    pub table: TableSpec,
    /// SQL 방언
    pub dialect: Dialect,
    /// 시작 phase
    pub initial_phase: Phase,
    /// 검증 설정
    pub validation: ValidationConfig,
    /// 수정 설정
    pub fix: FixConfig,
    /// HTTP 서버 설정
    pub server: ServerConfig,
}

/// 검증 설정
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// 페이지 크기
    pub batch_size: usize,
    /// 고부하 시 페이지마다 쉬는 시간 (밀리초)
    pub high_load_pause_ms: u64,
}

/// 수정 설정
#[derive(Debug, Clone)]
pub struct FixConfig {
    /// 재시도 횟수
    pub max_retries: u32,
    /// 재시도 기본 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 재시도 소진 메시지 재처리 전 대기 (밀리초)
    pub redelivery_backoff_ms: u64,
}

/// HTTP 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl MigratorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} 환경변수가 설정되지 않았습니다", key)))
        };

        let max_connections = env_var_parse(&lookup, "DB_MAX_CONNECTIONS", 10u32);
        let src = DatabaseConfig::new(required("SRC_DATABASE_URL")?)
            .with_max_connections(max_connections);
        let dst = DatabaseConfig::new(required("DST_DATABASE_URL")?)
            .with_max_connections(max_connections);

        let table = TableSpec::with_columns(
            required("MIGRATOR_TABLE")?,
            lookup("MIGRATOR_ID_COLUMN").unwrap_or_else(|| "id".to_string()),
            lookup("MIGRATOR_UTIME_COLUMN").unwrap_or_else(|| "utime".to_string()),
        )?;

        // 미지정 시 소스 URL 스킴에서 추론
        let dialect = match lookup("MIGRATOR_DIALECT") {
            Some(raw) => raw.parse::<Dialect>().map_err(AppError::Config)?,
            None => src.dialect()?,
        };

        let initial_phase = match lookup("MIGRATOR_INITIAL_PHASE") {
            Some(raw) => raw.parse::<Phase>().map_err(AppError::Config)?,
            None => Phase::SrcOnly,
        };

        Ok(Self {
            src,
            dst,
            table,
            dialect,
            initial_phase,
            validation: ValidationConfig {
                batch_size: env_var_parse(&lookup, "VALIDATION_BATCH_SIZE", 100usize).max(1),
                high_load_pause_ms: env_var_parse(&lookup, "VALIDATION_HIGH_LOAD_PAUSE_MS", 500u64),
            },
            fix: FixConfig {
                max_retries: env_var_parse(&lookup, "FIX_MAX_RETRIES", 3u32),
                retry_delay_ms: env_var_parse(&lookup, "FIX_RETRY_DELAY_MS", 200u64),
                redelivery_backoff_ms: env_var_parse(&lookup, "FIX_REDELIVERY_BACKOFF_MS", 1000u64),
            },
            server: ServerConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: env_var_parse(&lookup, "API_PORT", 3000u16),
            },
        })
    }

    /// 스케줄러 설정
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            batch_size: self.validation.batch_size,
            high_load_pause: Duration::from_millis(self.validation.high_load_pause_ms),
        }
    }

    /// 수정 재시도 설정
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.fix.max_retries,
            Duration::from_millis(self.fix.retry_delay_ms),
        )
    }

    /// 수정 실패 메시지 재처리 대기
    pub fn redelivery_backoff(&self) -> Duration {
        Duration::from_millis(self.fix.redelivery_backoff_ms)
    }
}

/// 환경변수에서 값 파싱 (실패 시 기본값)
fn env_var_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
