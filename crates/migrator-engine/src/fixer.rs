//! 행 단위 수정기.
//!
//! 권위(base) 저장소의 현재 상태를 대상(target) 저장소에 그대로 반영합니다.
//! base에 행이 있으면 전체 컬럼 upsert, 없으면 대상에서 삭제합니다.
//! 같은 id를 여러 번 수정해도 결과가 같습니다.

use std::sync::Arc;

use migrator_core::{Dialect, Store, TableSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MigratorError, Result};

/// 수정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    /// 대상에 기준 행을 덮어씀
    Upserted,
    /// 대상에서 행을 삭제함
    Deleted,
}

/// 한 방향 수정기.
pub struct Fixer {
    base: Arc<dyn Store>,
    target: Arc<dyn Store>,
    table: TableSpec,
    dialect: Dialect,
    columns: Vec<String>,
}

impl Fixer {
    /// 수정기 생성. 기준 저장소에서 컬럼 목록을 한 번 조회하여 보관합니다.
    pub async fn new(
        base: Arc<dyn Store>,
        target: Arc<dyn Store>,
        table: TableSpec,
        dialect: Dialect,
    ) -> Result<Self> {
        let columns = base.columns(&table.select_all_sql()).await?;
        if columns.is_empty() {
            return Err(MigratorError::InvalidArgument(format!(
                "{} 테이블에 컬럼이 없음",
                table.name()
            )));
        }

        info!(table = %table.name(), columns = columns.len(), "수정기 초기화");
        Ok(Self {
            base,
            target,
            table,
            dialect,
            columns,
        })
    }

    /// 캐시된 컬럼 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// id 하나를 기준 저장소 상태로 맞춤.
    pub async fn fix(&self, id: i64) -> Result<FixOutcome> {
        let lookup = self.table.select_by_id(self.dialect, id);

        match self.base.query_row(&lookup).await? {
            Some(row) => {
                let stmt = self.table.upsert(self.dialect, &row, &self.columns)?;
                self.target.exec(&stmt).await?;
                debug!(table = %self.table.name(), id, "대상 행 upsert");
                Ok(FixOutcome::Upserted)
            }
            None => {
                let stmt = self.table.delete_by_id(self.dialect, id);
                let result = self.target.exec(&stmt).await?;
                debug!(
                    table = %self.table.name(),
                    id,
                    rows_affected = result.rows_affected,
                    "대상 행 삭제"
                );
                Ok(FixOutcome::Deleted)
            }
        }
    }
}
