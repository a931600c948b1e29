//! `sqlx::Any` 기반 저장소 어댑터.
//!
//! `migrator_core::Store` 계열 trait를 실제 연결 풀 위에 구현합니다.
//! 컬럼 값은 드라이버 중립 `Value`로 변환하므로 지원 타입은
//! 정수 / 실수 / 불리언 / 문자열 / 바이트열입니다.

use std::sync::Arc;

use async_trait::async_trait;
use migrator_core::{
    Dialect, ExecResult, PreparedStatement, Result, Row, Statement, Store, StoreError,
    StoreTransaction, Value,
};
use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{AnyPool, Column, Executor, Row as _, Transaction};
use tracing::debug;

/// 연결 풀 기반 저장소.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlStore {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// 내부 연결 풀
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// SQL 방언
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn exec(&self, stmt: &Statement) -> Result<ExecResult> {
        debug!(sql = %stmt.sql, "exec");
        let result = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let rows = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(&rows)
    }

    async fn query_row(&self, stmt: &Statement) -> Result<Option<Row>> {
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlTransaction { tx }))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        // 문법 검증 목적. 실제 준비 문장 캐시는 연결별로 sqlx가 관리
        (&self.pool).prepare(sql).await?;
        Ok(Box::new(SqlPrepared {
            pool: self.pool.clone(),
            sql: sql.to_string(),
        }))
    }

    async fn columns(&self, sql: &str) -> Result<Vec<String>> {
        let describe = (&self.pool).describe(sql).await?;
        Ok(describe
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }
}

/// `SqlStore` 트랜잭션.
pub struct SqlTransaction {
    tx: Transaction<'static, Any>,
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult> {
        let result = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .execute(&mut *self.tx)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
        let rows = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .fetch_all(&mut *self.tx)
            .await?;
        decode_rows(&rows)
    }

    async fn query_row(&mut self, stmt: &Statement) -> Result<Option<Row>> {
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.args)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// `SqlStore` 준비 문장.
pub struct SqlPrepared {
    pool: AnyPool,
    sql: String,
}

#[async_trait]
impl PreparedStatement for SqlPrepared {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn exec(&self, args: &[Value]) -> Result<ExecResult> {
        let result = bind_all(sqlx::query(&self.sql), args)
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&self, args: &[Value]) -> Result<Vec<Row>> {
        let rows = bind_all(sqlx::query(&self.sql), args)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(&rows)
    }
}

// =============================================================================
// 바인딩 / 디코딩
// =============================================================================

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Bytes(v) => query.bind(v.clone()),
        };
    }
    query
}

fn decode_rows(rows: &[AnyRow]) -> Result<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = column_names(first);
    rows.iter()
        .map(|row| Row::new(Arc::clone(&columns), decode_values(row)?))
        .collect()
}

fn decode_row(row: &AnyRow) -> Result<Row> {
    Row::new(column_names(row), decode_values(row)?)
}

fn column_names(row: &AnyRow) -> Arc<[String]> {
    row.columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into()
}

fn decode_values(row: &AnyRow) -> Result<Vec<Value>> {
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

/// 컬럼 하나를 `Value`로 변환.
///
/// Any 드라이버는 타입 호환성 검사 후 디코딩하므로 후보 타입을 순서대로 시도합니다.
/// NULL 값은 첫 시도에서 `None`으로 디코딩됩니다.
fn decode_value(row: &AnyRow, index: usize) -> Result<Value> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return Ok(v.map(i64::from).into());
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return Ok(v.map(i64::from).into());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return Ok(v.map(f64::from).into());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.into());
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(v.into());
    }

    let name = row
        .columns()
        .get(index)
        .map(|c| c.name().to_string())
        .unwrap_or_default();
    Err(StoreError::Decode(format!(
        "지원하지 않는 컬럼 타입: {}",
        name
    )))
}
