//! 방언(dialect)별 SQL 생성기.
//!
//! Validator와 Fixer가 사용하는 조회/upsert/삭제 문장을 만듭니다.
//! 테이블/컬럼 이름은 생성 시점에 식별자 검증을 거치므로 문자열 결합이 안전합니다.
//!
//! # 페이지네이션
//!
//! 오프셋 대신 `(정렬키, id)` keyset 커서를 사용합니다. 스캔 도중 앞쪽 행이
//! 삭제·삽입되어도 행을 건너뛰거나 중복 방문하지 않습니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::store::{Row, Statement, Value};

/// SQL 방언.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// n번째(1부터) 위치 인자 placeholder.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MySql => "?".to_string(),
            Dialect::Sqlite => format!("?{}", n),
        }
    }

    /// 연결 URL 스킴으로 방언 추론
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(format!("Invalid dialect: {}", s)),
        }
    }
}

/// keyset 커서: 마지막으로 본 행의 (정렬키 값, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub sort: i64,
    pub id: i64,
}

/// 페이지 조회 조건.
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    /// 정렬 컬럼 (정수형)
    pub sort_column: &'a str,
    /// 수정 시각 하한 (0이면 조건 생략, 그 외 엄격한 `>`)
    pub utime_after: i64,
    /// 이어서 읽을 위치 (None이면 처음부터)
    pub cursor: Option<Cursor>,
    /// 최대 행 수
    pub limit: usize,
    /// id 컬럼만 조회할지 여부
    pub ids_only: bool,
}

/// 마이그레이션 대상 테이블 정의.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    id_column: String,
    utime_column: String,
}

impl TableSpec {
    /// 기본 컬럼(`id`, `utime`)으로 생성.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_columns(name, "id", "utime")
    }

    /// 컬럼 이름을 지정하여 생성.
    pub fn with_columns(
        name: impl Into<String>,
        id_column: impl Into<String>,
        utime_column: impl Into<String>,
    ) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            id_column: id_column.into(),
            utime_column: utime_column.into(),
        };
        validate_identifier(&spec.name)?;
        validate_identifier(&spec.id_column)?;
        validate_identifier(&spec.utime_column)?;
        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn utime_column(&self) -> &str {
        &self.utime_column
    }

    /// 컬럼 조회용 전체 선택 문장
    pub fn select_all_sql(&self) -> String {
        format!("SELECT * FROM {}", self.name)
    }

    /// id로 단일 행 조회
    pub fn select_by_id(&self, dialect: Dialect, id: i64) -> Statement {
        Statement::new(format!(
            "SELECT * FROM {} WHERE {} = {}",
            self.name,
            self.id_column,
            dialect.placeholder(1)
        ))
        .bind(id)
    }

    /// 여러 id 중 존재하는 id만 조회
    pub fn select_ids_in(&self, dialect: Dialect, ids: &[i64]) -> Statement {
        let placeholders: Vec<String> = (1..=ids.len()).map(|n| dialect.placeholder(n)).collect();
        let mut stmt = Statement::new(format!(
            "SELECT {id} FROM {t} WHERE {id} IN ({p})",
            id = self.id_column,
            t = self.name,
            p = placeholders.join(", ")
        ));
        for id in ids {
            stmt = stmt.bind(*id);
        }
        stmt
    }

    /// keyset 페이지 조회.
    ///
    /// 정렬 컬럼이 id 컬럼이면 `id > ?` 하나로, 아니면
    /// `(sort > ? OR (sort = ? AND id > ?))`로 커서를 표현합니다.
    /// id가 아닌 정렬 컬럼은 커서로 비교할 수 없는 NULL 행을 제외합니다.
    /// 그런 행은 id 순서의 전체 검증에서만 다뤄집니다.
    pub fn select_page(&self, dialect: Dialect, page: &PageQuery<'_>) -> Result<Statement> {
        validate_identifier(page.sort_column)?;

        let mut conditions: Vec<String> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        let next = |args: &mut Vec<Value>, value: i64| {
            args.push(Value::Int(value));
            dialect.placeholder(args.len())
        };

        if page.utime_after > 0 {
            let p = next(&mut args, page.utime_after);
            conditions.push(format!("{} > {}", self.utime_column, p));
        }

        let sort_is_id = page.sort_column.eq_ignore_ascii_case(&self.id_column);
        if !sort_is_id {
            conditions.push(format!("{} IS NOT NULL", page.sort_column));
        }
        if let Some(cursor) = page.cursor {
            if sort_is_id {
                let p = next(&mut args, cursor.id);
                conditions.push(format!("{} > {}", self.id_column, p));
            } else {
                let p1 = next(&mut args, cursor.sort);
                let p2 = next(&mut args, cursor.sort);
                let p3 = next(&mut args, cursor.id);
                conditions.push(format!(
                    "({s} > {p1} OR ({s} = {p2} AND {id} > {p3}))",
                    s = page.sort_column,
                    id = self.id_column,
                ));
            }
        }

        let projection = if page.ids_only {
            if sort_is_id {
                self.id_column.clone()
            } else {
                format!("{}, {}", self.id_column, page.sort_column)
            }
        } else {
            "*".to_string()
        };

        let mut sql = format!("SELECT {} FROM {}", projection, self.name);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if sort_is_id {
            sql.push_str(&format!(" ORDER BY {}", self.id_column));
        } else {
            sql.push_str(&format!(
                " ORDER BY {}, {}",
                page.sort_column, self.id_column
            ));
        }
        sql.push_str(&format!(" LIMIT {}", page.limit.max(1)));

        Ok(Statement { sql, args })
    }

    /// 행 전체 upsert (충돌 시 지정 컬럼 전부 덮어쓰기).
    pub fn upsert(&self, dialect: Dialect, row: &Row, columns: &[String]) -> Result<Statement> {
        if columns.is_empty() {
            return Err(StoreError::Other(format!(
                "{} 테이블의 컬럼 목록이 비어 있음",
                self.name
            )));
        }

        let mut args = Vec::with_capacity(columns.len());
        for column in columns {
            validate_identifier(column)?;
            let value = row
                .get(column)
                .cloned()
                .ok_or_else(|| StoreError::Decode(format!("컬럼 없음: {}", column)))?;
            args.push(value);
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|n| dialect.placeholder(n)).collect();
        let updates: Vec<&String> = columns
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case(&self.id_column))
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            columns.join(", "),
            placeholders.join(", ")
        );

        match dialect {
            Dialect::Postgres | Dialect::Sqlite => {
                if updates.is_empty() {
                    sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", self.id_column));
                } else {
                    let sets: Vec<String> = updates
                        .iter()
                        .map(|c| format!("{c} = excluded.{c}"))
                        .collect();
                    sql.push_str(&format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        self.id_column,
                        sets.join(", ")
                    ));
                }
            }
            Dialect::MySql => {
                // id만 있는 테이블은 id = id로 no-op 갱신
                let sets: Vec<String> = if updates.is_empty() {
                    vec![format!("{c} = {c}", c = self.id_column)]
                } else {
                    updates.iter().map(|c| format!("{c} = VALUES({c})")).collect()
                };
                sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", ")));
            }
        }

        Ok(Statement { sql, args })
    }

    /// id로 행 삭제
    pub fn delete_by_id(&self, dialect: Dialect, id: i64) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE {} = {}",
            self.name,
            self.id_column,
            dialect.placeholder(1)
        ))
        .bind(id)
    }
}

/// 식별자 검증 (영문/숫자/밑줄, 숫자로 시작 불가).
///
/// `schema.table` 형태의 점 구분은 허용합니다.
pub fn validate_identifier(ident: &str) -> Result<()> {
    let valid = !ident.is_empty()
        && ident.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(ident.to_string()))
    }
}
