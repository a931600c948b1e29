//! 라이브 테이블 마이그레이션 핵심 타입.
//!
//! 이 crate는 다음을 제공합니다:
//! - 트래픽 라우팅 phase와 권위 방향
//! - 비교 가능한 엔티티 계약
//! - 불일치 이벤트
//! - 저장소 추상화 (Store / StoreTransaction / PreparedStatement)
//! - 방언별 SQL 생성기
//!
//! # 예제
//!
//! ```rust,ignore
//! use migrator_core::{Dialect, TableSpec};
//!
//! let table = TableSpec::new("interactives")?;
//! let stmt = table.select_by_id(Dialect::Postgres, 42);
//! let row = store.query_row(&stmt).await?;
//! ```

pub mod entity;
pub mod error;
pub mod event;
pub mod phase;
pub mod sql;
pub mod store;

// 주요 타입 재내보내기
pub use entity::{Entity, FromRow, RowRecord};
pub use error::{Result, StoreError};
pub use event::{EventType, InconsistencyEvent};
pub use phase::{Direction, Phase};
pub use sql::{validate_identifier, Cursor, Dialect, PageQuery, TableSpec};
pub use store::{ExecResult, PreparedStatement, Row, Statement, Store, StoreTransaction, Value};
