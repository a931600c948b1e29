//! 비교 가능한 레코드 계약.
//!
//! Validator와 Fixer는 특정 스키마에 묶이지 않고 이 trait만으로 동작합니다.

use crate::error::Result;
use crate::store::Row;

/// 마이그레이션 대상 엔티티.
///
/// `equals`는 참조가 아닌 값 기반 구조 비교여야 합니다.
pub trait Entity: Send + Sync + 'static {
    /// 안정적인 숫자 식별자
    fn id(&self) -> i64;

    /// 다른 인스턴스와 값 비교
    fn equals(&self, other: &Self) -> bool;
}

/// 조회 결과 행에서 엔티티로 변환.
pub trait FromRow: Sized {
    /// `id_column`은 테이블의 식별자 컬럼 이름 (`TableSpec::id_column`)
    fn from_row(row: &Row, id_column: &str) -> Result<Self>;
}

/// 스키마 비의존 엔티티.
///
/// 행 전체를 보관하고 컬럼 이름 기준으로 비교합니다.
/// 두 저장소의 물리적 컬럼 순서가 달라도 같은 값이면 같은 행입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    id: i64,
    row: Row,
}

impl RowRecord {
    /// 원본 행
    pub fn row(&self) -> &Row {
        &self.row
    }
}

impl Entity for RowRecord {
    fn id(&self) -> i64 {
        self.id
    }

    fn equals(&self, other: &Self) -> bool {
        self.id == other.id
            && self.row.columns().len() == other.row.columns().len()
            && self
                .row
                .columns()
                .iter()
                .zip(self.row.values())
                .all(|(column, value)| other.row.get(column) == Some(value))
    }
}

impl FromRow for RowRecord {
    fn from_row(row: &Row, id_column: &str) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(id_column)?,
            row: row.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::Value;

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        Row::new(columns, values).unwrap()
    }

    fn record(values: Vec<Value>) -> RowRecord {
        RowRecord::from_row(&row(&["id", "title"], values), "id").unwrap()
    }

    #[test]
    fn test_row_record_equality_is_structural() {
        let a = record(vec![Value::Int(1), Value::Text("a".into())]);
        let b = record(vec![Value::Int(1), Value::Text("a".into())]);
        let c = record(vec![Value::Int(1), Value::Text("b".into())]);

        assert_eq!(a.id(), 1);
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }

    #[test]
    fn test_row_record_requires_id() {
        let row = row(&["title"], vec![Value::Text("x".into())]);
        assert!(RowRecord::from_row(&row, "id").is_err());
    }

    #[test]
    fn test_row_record_reads_configured_id_column() {
        let row = row(&["uid", "title"], vec![Value::Int(42), Value::Text("x".into())]);
        assert_eq!(RowRecord::from_row(&row, "uid").unwrap().id(), 42);
        assert!(RowRecord::from_row(&row, "id").is_err());
    }

    #[test]
    fn test_row_record_ignores_column_order() {
        let a = RowRecord::from_row(
            &row(
                &["id", "v", "utime"],
                vec![Value::Int(1), Value::Text("a".into()), Value::Int(10)],
            ),
            "id",
        )
        .unwrap();
        let b = RowRecord::from_row(
            &row(
                &["id", "utime", "v"],
                vec![Value::Int(1), Value::Int(10), Value::Text("a".into())],
            ),
            "id",
        )
        .unwrap();
        let c = RowRecord::from_row(
            &row(
                &["id", "utime", "v"],
                vec![Value::Int(1), Value::Int(10), Value::Text("b".into())],
            ),
            "id",
        )
        .unwrap();

        assert!(a.equals(&b));
        assert!(b.equals(&a));
        assert!(!a.equals(&c));
    }

    #[test]
    fn test_row_record_extra_column_is_not_equal() {
        let a = record(vec![Value::Int(1), Value::Text("a".into())]);
        let b = RowRecord::from_row(
            &row(
                &["id", "title", "note"],
                vec![Value::Int(1), Value::Text("a".into()), Value::Null],
            ),
            "id",
        )
        .unwrap();
        assert!(!a.equals(&b));
        assert!(!b.equals(&a));
    }
}
