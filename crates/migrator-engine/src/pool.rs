//! 이중 쓰기 풀.
//!
//! 두 저장소를 감싸 하나의 `Store`처럼 보이게 하는 decorator입니다.
//! 현재 phase에 따라 쓰기를 한쪽 또는 양쪽으로 보냅니다.
//!
//! # 라우팅
//!
//! ```text
//! phase        쓰기                          읽기
//! SRC_ONLY     src                           src
//! SRC_FIRST    src → dst (best-effort)       src
//! DST_FIRST    dst → src (best-effort)       dst
//! DST_ONLY     dst                           dst
//! ```
//!
//! 권위 저장소 에러는 호출자에게 그대로 전달되고, 보조 저장소 에러는
//! 로그만 남깁니다. 보조 쪽 누락은 Validator/Fixer 파이프라인이 보정합니다.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use migrator_core::{
    Direction, ExecResult, Phase, PreparedStatement, Result, Row, Statement, Store, StoreError,
    StoreTransaction,
};
use tracing::{debug, error, info};

/// 이중 쓰기 풀.
pub struct DualWritePool {
    src: Arc<dyn Store>,
    dst: Arc<dyn Store>,
    /// 매 문장마다 읽으므로 lock 없이 원자 변수로 보관
    phase: AtomicU8,
}

impl DualWritePool {
    /// 새 풀 생성
    pub fn new(src: Arc<dyn Store>, dst: Arc<dyn Store>, phase: Phase) -> Self {
        Self {
            src,
            dst,
            phase: AtomicU8::new(phase.as_u8()),
        }
    }

    /// 현재 phase.
    ///
    /// # Errors
    /// 원자 변수에 알 수 없는 값이 들어 있으면 `StoreError::UnknownPhase`.
    pub fn phase(&self) -> Result<Phase> {
        let raw = self.phase.load(Ordering::Acquire);
        Phase::from_u8(raw).ok_or(StoreError::UnknownPhase(raw))
    }

    /// phase 변경. 진행 중인 트랜잭션에는 영향이 없습니다.
    pub fn update_phase(&self, phase: Phase) {
        let prev = self.phase.swap(phase.as_u8(), Ordering::AcqRel);
        info!(
            from = ?Phase::from_u8(prev),
            to = %phase,
            "이중 쓰기 phase 변경"
        );
    }

    /// 소스 저장소
    pub fn src(&self) -> &Arc<dyn Store> {
        &self.src
    }

    /// 목적지 저장소
    pub fn dst(&self) -> &Arc<dyn Store> {
        &self.dst
    }

    /// (권위 저장소, 보조 저장소) 선택
    fn route(&self, phase: Phase) -> (&Arc<dyn Store>, Option<&Arc<dyn Store>>) {
        match phase {
            Phase::SrcOnly => (&self.src, None),
            Phase::SrcFirst => (&self.src, Some(&self.dst)),
            Phase::DstFirst => (&self.dst, Some(&self.src)),
            Phase::DstOnly => (&self.dst, None),
        }
    }
}

#[async_trait]
impl Store for DualWritePool {
    async fn exec(&self, stmt: &Statement) -> Result<ExecResult> {
        let phase = self.phase()?;
        let (primary, secondary) = self.route(phase);

        let result = primary.exec(stmt).await?;

        if let Some(secondary) = secondary {
            if let Err(e) = secondary.exec(stmt).await {
                error!(
                    phase = %phase,
                    sql = %stmt.sql,
                    error = %e,
                    "보조 저장소 쓰기 실패"
                );
            }
        }

        Ok(result)
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let phase = self.phase()?;
        self.route(phase).0.query(stmt).await
    }

    async fn query_row(&self, stmt: &Statement) -> Result<Option<Row>> {
        let phase = self.phase()?;
        self.route(phase).0.query_row(stmt).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let phase = self.phase()?;
        let (primary, secondary) = self.route(phase);

        let primary_tx = primary.begin().await?;

        let secondary_tx = match secondary {
            Some(secondary) => match secondary.begin().await {
                Ok(tx) => Some(tx),
                Err(e) => {
                    error!(
                        phase = %phase,
                        error = %e,
                        "보조 저장소 트랜잭션 시작 실패, 권위 저장소만 사용"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Box::new(DualWriteTx {
            phase,
            primary: primary_tx,
            secondary: secondary_tx,
        }))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        // 하나의 준비 문장 핸들로 두 저장소를 표현할 수 없음
        Err(StoreError::Unsupported(format!(
            "이중 쓰기 풀은 prepared statement를 지원하지 않음: {}",
            sql
        )))
    }

    async fn columns(&self, sql: &str) -> Result<Vec<String>> {
        let phase = self.phase()?;
        self.route(phase).0.columns(sql).await
    }
}

/// 이중 쓰기 트랜잭션.
///
/// 시작 시점의 phase를 고정하여 이후 전역 phase가 바뀌어도 같은 저장소 조합을 사용합니다.
pub struct DualWriteTx {
    phase: Phase,
    primary: Box<dyn StoreTransaction>,
    secondary: Option<Box<dyn StoreTransaction>>,
}

impl DualWriteTx {
    /// 시작 시점에 고정된 phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 권위 저장소 방향
    pub fn authoritative(&self) -> Direction {
        self.phase.authoritative()
    }

    /// 보조 트랜잭션이 열려 있는지 여부
    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

#[async_trait]
impl StoreTransaction for DualWriteTx {
    async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult> {
        let result = self.primary.exec(stmt).await?;

        if let Some(secondary) = self.secondary.as_mut() {
            if let Err(e) = secondary.exec(stmt).await {
                error!(
                    phase = %self.phase,
                    sql = %stmt.sql,
                    error = %e,
                    "보조 저장소 트랜잭션 쓰기 실패"
                );
            }
        }

        Ok(result)
    }

    async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
        self.primary.query(stmt).await
    }

    async fn query_row(&mut self, stmt: &Statement) -> Result<Option<Row>> {
        self.primary.query_row(stmt).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let DualWriteTx {
            phase,
            primary,
            secondary,
        } = *self;

        // 권위 쪽 커밋 실패 시 보조 트랜잭션은 drop되어 롤백됨
        primary.commit().await?;

        if let Some(secondary) = secondary {
            if let Err(e) = secondary.commit().await {
                error!(phase = %phase, error = %e, "보조 저장소 커밋 실패");
            }
        }

        debug!(phase = %phase, "이중 쓰기 트랜잭션 커밋");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let DualWriteTx {
            phase,
            primary,
            secondary,
        } = *self;

        primary.rollback().await?;

        if let Some(secondary) = secondary {
            if let Err(e) = secondary.rollback().await {
                error!(phase = %phase, error = %e, "보조 저장소 롤백 실패");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    use super::*;

    type OpLog = Arc<Mutex<Vec<String>>>;

    /// 호출 기록용 테스트 저장소
    struct RecordingStore {
        name: &'static str,
        log: OpLog,
        fail_exec: AtomicBool,
        fail_begin: AtomicBool,
    }

    impl RecordingStore {
        fn new(name: &'static str, log: OpLog) -> Arc<Self> {
            Arc::new(Self {
                name,
                log,
                fail_exec: AtomicBool::new(false),
                fail_begin: AtomicBool::new(false),
            })
        }

        fn record(&self, op: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, op));
        }
    }

    #[async_trait]
    impl Store for RecordingStore {
        async fn exec(&self, stmt: &Statement) -> Result<ExecResult> {
            if self.fail_exec.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(self.name.to_string()));
            }
            self.record(&format!("exec {}", stmt.sql));
            Ok(ExecResult { rows_affected: 1 })
        }

        async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
            self.record(&format!("query {}", stmt.sql));
            Ok(Vec::new())
        }

        async fn query_row(&self, stmt: &Statement) -> Result<Option<Row>> {
            self.record(&format!("query_row {}", stmt.sql));
            Ok(None)
        }

        async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
            if self.fail_begin.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(self.name.to_string()));
            }
            self.record("begin");
            Ok(Box::new(RecordingTx {
                name: self.name,
                log: Arc::clone(&self.log),
            }))
        }

        async fn prepare(&self, _sql: &str) -> Result<Box<dyn PreparedStatement>> {
            Err(StoreError::Unsupported("test".into()))
        }

        async fn columns(&self, _sql: &str) -> Result<Vec<String>> {
            self.record("columns");
            Ok(vec!["id".into()])
        }
    }

    struct RecordingTx {
        name: &'static str,
        log: OpLog,
    }

    impl RecordingTx {
        fn record(&self, op: &str) {
            self.log.lock().unwrap().push(format!("{}:tx:{}", self.name, op));
        }
    }

    #[async_trait]
    impl StoreTransaction for RecordingTx {
        async fn exec(&mut self, stmt: &Statement) -> Result<ExecResult> {
            self.record(&format!("exec {}", stmt.sql));
            Ok(ExecResult { rows_affected: 1 })
        }

        async fn query(&mut self, stmt: &Statement) -> Result<Vec<Row>> {
            self.record(&format!("query {}", stmt.sql));
            Ok(Vec::new())
        }

        async fn query_row(&mut self, stmt: &Statement) -> Result<Option<Row>> {
            self.record(&format!("query_row {}", stmt.sql));
            Ok(None)
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            self.record("commit");
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.record("rollback");
            Ok(())
        }
    }

    fn setup(phase: Phase) -> (DualWritePool, Arc<RecordingStore>, Arc<RecordingStore>, OpLog) {
        let log: OpLog = Arc::new(Mutex::new(Vec::new()));
        let src = RecordingStore::new("src", Arc::clone(&log));
        let dst = RecordingStore::new("dst", Arc::clone(&log));
        let pool = DualWritePool::new(src.clone(), dst.clone(), phase);
        (pool, src, dst, log)
    }

    fn take(log: &OpLog) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[tokio::test]
    async fn test_routing_per_phase() {
        let write = Statement::new("W");
        let read = Statement::new("R");
        let cases = [
            (Phase::SrcOnly, vec!["src:exec W"], "src:query R"),
            (Phase::SrcFirst, vec!["src:exec W", "dst:exec W"], "src:query R"),
            (Phase::DstFirst, vec!["dst:exec W", "src:exec W"], "dst:query R"),
            (Phase::DstOnly, vec!["dst:exec W"], "dst:query R"),
        ];

        for (phase, writes, read_op) in cases {
            let (pool, _src, _dst, log) = setup(phase);
            pool.exec(&write).await.unwrap();
            assert_eq!(take(&log), writes, "phase {}", phase);

            pool.query(&read).await.unwrap();
            pool.query_row(&read).await.unwrap();
            assert_eq!(
                take(&log),
                vec![read_op.to_string(), read_op.replace("query", "query_row")],
                "phase {}",
                phase
            );
        }
    }

    #[tokio::test]
    async fn test_authoritative_failure_skips_secondary() {
        let (pool, src, _dst, log) = setup(Phase::SrcFirst);
        src.fail_exec.store(true, Ordering::SeqCst);

        let result = pool.exec(&Statement::new("W")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(take(&log).is_empty());
    }

    #[tokio::test]
    async fn test_secondary_failure_is_swallowed() {
        let (pool, _src, dst, log) = setup(Phase::SrcFirst);
        dst.fail_exec.store(true, Ordering::SeqCst);

        let result = pool.exec(&Statement::new("W")).await.unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(take(&log), vec!["src:exec W"]);

        // DST_FIRST에서 소스 실패도 동일
        let (pool, src, _dst, log) = setup(Phase::DstFirst);
        src.fail_exec.store(true, Ordering::SeqCst);
        pool.exec(&Statement::new("W")).await.unwrap();
        assert_eq!(take(&log), vec!["dst:exec W"]);
    }

    #[tokio::test]
    async fn test_transaction_phase_is_frozen() {
        let (pool, _src, _dst, log) = setup(Phase::SrcFirst);

        let mut tx = pool.begin().await.unwrap();
        pool.update_phase(Phase::DstOnly);

        tx.exec(&Statement::new("W")).await.unwrap();
        tx.query(&Statement::new("R")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            take(&log),
            vec![
                "src:begin",
                "dst:begin",
                "src:tx:exec W",
                "dst:tx:exec W",
                "src:tx:query R",
                "src:tx:commit",
                "dst:tx:commit",
            ]
        );

        // 새 트랜잭션은 새 phase를 따름
        let tx = pool.begin().await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(take(&log), vec!["dst:begin", "dst:tx:rollback"]);
    }

    #[tokio::test]
    async fn test_secondary_begin_failure_commits_authoritative_only() {
        let (pool, _src, dst, log) = setup(Phase::SrcFirst);
        dst.fail_begin.store(true, Ordering::SeqCst);

        let mut tx = pool.begin().await.unwrap();
        tx.exec(&Statement::new("W")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            take(&log),
            vec!["src:begin", "src:tx:exec W", "src:tx:commit"]
        );
    }

    #[tokio::test]
    async fn test_authoritative_begin_failure_propagates() {
        let (pool, _src, dst, log) = setup(Phase::DstFirst);
        dst.fail_begin.store(true, Ordering::SeqCst);

        assert!(pool.begin().await.is_err());
        assert!(take(&log).is_empty());
    }

    #[tokio::test]
    async fn test_prepare_is_unsupported() {
        let (pool, _src, _dst, _log) = setup(Phase::SrcOnly);
        let result = pool.prepare("SELECT 1").await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_unknown_phase_is_reported() {
        let (pool, _src, _dst, log) = setup(Phase::SrcOnly);
        pool.phase.store(9, Ordering::SeqCst);

        let result = pool.exec(&Statement::new("W")).await;
        assert!(matches!(result, Err(StoreError::UnknownPhase(9))));
        assert!(take(&log).is_empty());
    }
}
