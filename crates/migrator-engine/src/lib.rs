//! 라이브 테이블 마이그레이션 엔진.
//!
//! 이 crate는 다음을 제공합니다:
//! - 이중 쓰기 풀 (`DualWritePool`)
//! - 양방향 검증기 (`Validator`)
//! - 행 단위 수정기와 이벤트 소비자 (`Fixer`, `FixConsumer`)
//! - 불일치 이벤트 채널 (`EventProducer`, `EventConsumer`, `MemoryTopic`)
//! - phase 전환과 검증 작업을 관리하는 스케줄러 (`Scheduler`)
//!
//! # 예제
//!
//! ```rust,ignore
//! use migrator_engine::{DualWritePool, MemoryTopic, Scheduler};
//!
//! let pool = Arc::new(DualWritePool::new(src, dst, Phase::SrcOnly));
//! let topic = MemoryTopic::new("migrator");
//! let scheduler = Scheduler::<RowRecord>::new(pool, topic, table, Dialect::Postgres)?;
//! scheduler.switch_phase(Phase::SrcFirst).await;
//! scheduler.start_full_validation().await;
//! ```

pub mod channel;
pub mod consumer;
pub mod error;
pub mod fixer;
pub mod pool;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod validator;

pub use channel::{EventConsumer, EventProducer, MemoryConsumer, MemoryTopic, Message};
pub use consumer::{decode_event, FixConsumer};
pub use error::{ChannelError, MigratorError, Result};
pub use fixer::{FixOutcome, Fixer};
pub use pool::{DualWritePool, DualWriteTx};
pub use retry::{with_retry, RetryConfig};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStatus};
pub use stats::{FixStats, ValidationStats};
pub use validator::Validator;
