//! 저장소 어댑터.
//!
//! `sqlx::Any` 드라이버 위에 `migrator_core::Store`를 구현합니다.
//!
//! # 예제
//!
//! ```rust,ignore
//! use migrator_data::{connect_store, DatabaseConfig};
//!
//! let src = connect_store(&DatabaseConfig::new("postgres://app@src/db")).await?;
//! let dst = connect_store(&DatabaseConfig::new("mysql://app@dst/db")).await?;
//! ```

pub mod database;
pub mod store;

pub use database::{connect, connect_store, mask_database_url, DatabaseConfig};
pub use store::{SqlPrepared, SqlStore, SqlTransaction};
