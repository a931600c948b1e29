//! 저장소 추상화.
//!
//! 데이터 접근 계층이 기대하는 능력(Exec / Query / QueryRow / BeginTx / Prepare)을
//! trait로 정의합니다. 실제 DB 어댑터와 이중 쓰기 풀이 모두 이 trait를 구현하므로
//! 호출자는 이중 쓰기 여부를 알 필요가 없습니다.
//!
//! # 구조
//!
//! ```text
//! Store ──begin()──> StoreTransaction
//!   └────prepare()─> PreparedStatement
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

// =============================================================================
// 값 / 행 / 문장
// =============================================================================

/// 드라이버 중립 컬럼 값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// NULL 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 정수 값으로 변환 (정수 또는 정수 문자열만 허용).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 문자열 참조
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// 조회 결과 한 행.
///
/// 컬럼 이름 목록은 같은 결과 집합의 행끼리 공유합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// 새 행 생성. 컬럼 수와 값 수가 다르면 에러.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(StoreError::Decode(format!(
                "컬럼 수({})와 값 수({})가 다름",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// 컬럼 이름 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 값 목록 (컬럼 순서)
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 컬럼 이름으로 값 조회 (대소문자 무시)
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// 정수 컬럼 조회.
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get(column)
            .ok_or_else(|| StoreError::Decode(format!("컬럼 없음: {}", column)))?
            .as_i64()
            .ok_or_else(|| StoreError::Decode(format!("정수 컬럼 아님: {}", column)))
    }

    /// 문자열 컬럼 조회 (NULL이면 None).
    pub fn get_string(&self, column: &str) -> Result<Option<String>> {
        match self.get(column) {
            None => Err(StoreError::Decode(format!("컬럼 없음: {}", column))),
            Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
        }
    }
}

/// 실행할 SQL 문장과 위치 인자.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    /// 인자 없는 문장 생성
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// 인자 추가
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, " [{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// Exec 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// 영향 받은 행 수
    pub rows_affected: u64,
}

// =============================================================================
// Trait
// =============================================================================

/// 저장소 trait.
///
/// 구현체 예시: `migrator_data::SqlStore`, `migrator_engine::DualWritePool`.
#[async_trait]
pub trait Store: Send + Sync {
    /// 쓰기 문장 실행
    async fn exec(&self, stmt: &Statement) -> Result<ExecResult>;

    /// 다중 행 조회
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>>;

    /// 단일 행 조회 (없으면 `None`)
    async fn query_row(&self, stmt: &Statement) -> Result<Option<Row>>;

    /// 트랜잭션 시작
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Prepared statement 생성
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// 조회 문장이 반환할 컬럼 이름 목록 (행이 없어도 동작)
    async fn columns(&self, sql: &str) -> Result<Vec<String>>;
}

/// 진행 중인 트랜잭션.
///
/// `commit`/`rollback` 없이 drop되면 롤백됩니다.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult>;

    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>>;

    async fn query_row(&mut self, stmt: &Statement) -> Result<Option<Row>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 준비된 문장 핸들.
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// 원본 SQL
    fn sql(&self) -> &str;

    async fn exec(&self, args: &[Value]) -> Result<ExecResult>;

    async fn query(&self, args: &[Value]) -> Result<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        Row::new(columns, vec![Value::Int(7), Value::Text("alice".into())]).unwrap()
    }

    #[test]
    fn test_row_lookup_ignores_case() {
        let row = sample_row();
        assert_eq!(row.get_i64("ID").unwrap(), 7);
        assert_eq!(row.get_string("name").unwrap(), Some("alice".to_string()));
        assert!(row.get("missing").is_none());
        assert!(row.get_i64("name").is_err());
    }

    #[test]
    fn test_row_rejects_mismatched_width() {
        let columns: Arc<[String]> = vec!["id".to_string()].into();
        assert!(Row::new(columns, vec![]).is_err());
    }

    #[test]
    fn test_statement_display() {
        let stmt = Statement::new("DELETE FROM t WHERE id = $1").bind(5i64);
        assert_eq!(stmt.to_string(), "DELETE FROM t WHERE id = $1 [5]");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
