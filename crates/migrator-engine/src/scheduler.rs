//! 마이그레이션 스케줄러.
//!
//! 운영자 명령으로 phase를 전환하고 검증 작업을 시작/중지합니다.
//! 전체 검증과 증분 검증은 종류별로 동시에 최대 하나만 실행됩니다.
//! 새로 시작하면 이전 작업의 취소 토큰을 취소하고 교체합니다.

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use migrator_core::{Dialect, Direction, Entity, FromRow, Phase, TableSpec};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::channel::EventProducer;
use crate::error::{MigratorError, Result};
use crate::pool::DualWritePool;
use crate::validator::{Validator, DEFAULT_BATCH_SIZE, DEFAULT_HIGH_LOAD_PAUSE};

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 검증 페이지 크기
    pub batch_size: usize,
    /// 고부하 시 페이지마다 쉬는 시간
    pub high_load_pause: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            high_load_pause: DEFAULT_HIGH_LOAD_PAUSE,
        }
    }
}

/// 스케줄러 상태 조회 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub phase: Phase,
    pub full_running: bool,
    pub incremental_running: bool,
}

/// 실행 중인 검증 작업 핸들
struct ValidationRun {
    cancel: CancellationToken,
    /// 작업 종료 시 취소됨
    done: CancellationToken,
}

impl ValidationRun {
    fn is_running(&self) -> bool {
        !self.done.is_cancelled()
    }
}

struct SchedulerState {
    phase: Phase,
    full: Option<ValidationRun>,
    incremental: Option<ValidationRun>,
}

/// 마이그레이션 스케줄러.
pub struct Scheduler<E> {
    pool: Arc<DualWritePool>,
    producer: Arc<dyn EventProducer>,
    table: TableSpec,
    dialect: Dialect,
    config: SchedulerConfig,
    high_load: Arc<AtomicBool>,
    state: Mutex<SchedulerState>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Scheduler<E>
where
    E: Entity + FromRow,
{
    /// 스케줄러 생성. 초기 phase는 풀의 현재 phase를 따릅니다.
    pub fn new(
        pool: Arc<DualWritePool>,
        producer: Arc<dyn EventProducer>,
        table: TableSpec,
        dialect: Dialect,
    ) -> Result<Self> {
        let phase = pool.phase()?;
        Ok(Self {
            pool,
            producer,
            table,
            dialect,
            config: SchedulerConfig::default(),
            high_load: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(SchedulerState {
                phase,
                full: None,
                incremental: None,
            }),
            _entity: PhantomData,
        })
    }

    /// 설정 변경
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// 검증기들이 공유하는 고부하 플래그
    pub fn high_load(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.high_load)
    }

    /// 이중 쓰기 풀
    pub fn pool(&self) -> &Arc<DualWritePool> {
        &self.pool
    }

    /// 현재 phase
    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    /// phase 전환. 상태와 풀 라우팅을 같은 lock 안에서 변경합니다.
    pub async fn switch_phase(&self, phase: Phase) {
        let mut state = self.state.lock().await;
        let prev = state.phase;
        state.phase = phase;
        self.pool.update_phase(phase);
        info!(from = %prev, to = %phase, "phase 전환");
    }

    /// 전체 검증 시작. 실행 중인 전체 검증은 취소됩니다.
    pub async fn start_full_validation(&self) {
        let mut state = self.state.lock().await;
        let validator = self.validator(state.phase).with_order_by(self.table.id_column());

        if let Some(prev) = state.full.take() {
            prev.cancel.cancel();
        }
        state.full = Some(self.spawn_run("full", validator));
        info!(phase = %state.phase, "전체 검증 시작");
    }

    /// 전체 검증 중지
    pub async fn stop_full_validation(&self) {
        let state = self.state.lock().await;
        if let Some(run) = &state.full {
            run.cancel.cancel();
            info!("전체 검증 중지 요청");
        }
    }

    /// 증분 검증 시작.
    ///
    /// `utime` 이후 수정된 행을 `interval` 간격으로 계속 검증합니다.
    /// 실행 중인 증분 검증은 취소됩니다.
    pub async fn start_incremental_validation(&self, utime: i64, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(MigratorError::InvalidArgument(
                "증분 검증 간격은 0보다 커야 함".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let validator = self
            .validator(state.phase)
            .with_utime(utime)
            .with_sleep_interval(interval)
            .with_order_by(self.table.utime_column());

        if let Some(prev) = state.incremental.take() {
            prev.cancel.cancel();
        }
        state.incremental = Some(self.spawn_run("incremental", validator));
        info!(
            phase = %state.phase,
            utime,
            interval_ms = interval.as_millis() as u64,
            "증분 검증 시작"
        );
        Ok(())
    }

    /// 증분 검증 중지
    pub async fn stop_incremental_validation(&self) {
        let state = self.state.lock().await;
        if let Some(run) = &state.incremental {
            run.cancel.cancel();
            info!("증분 검증 중지 요청");
        }
    }

    /// 상태 조회
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        SchedulerStatus {
            phase: state.phase,
            full_running: state.full.as_ref().is_some_and(ValidationRun::is_running),
            incremental_running: state
                .incremental
                .as_ref()
                .is_some_and(ValidationRun::is_running),
        }
    }

    /// 현재 전체 검증이 끝날 때까지 대기. 실행 중인 작업이 없으면 즉시 반환.
    pub async fn wait_full_validation(&self) {
        let done = {
            let state = self.state.lock().await;
            state.full.as_ref().map(|run| run.done.clone())
        };
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// 실행 중인 모든 검증 취소
    pub async fn shutdown(&self) {
        let state = self.state.lock().await;
        for run in [&state.full, &state.incremental].into_iter().flatten() {
            run.cancel.cancel();
        }
    }

    /// phase의 권위 저장소를 base로 하는 검증기
    fn validator(&self, phase: Phase) -> Validator<E> {
        let direction = phase.authoritative();
        let (base, target) = match direction {
            Direction::Src => (self.pool.src(), self.pool.dst()),
            Direction::Dst => (self.pool.dst(), self.pool.src()),
        };

        Validator::new(
            Arc::clone(base),
            Arc::clone(target),
            direction,
            self.table.clone(),
            self.dialect,
            Arc::clone(&self.producer),
        )
        .with_batch_size(self.config.batch_size)
        .with_high_load(Arc::clone(&self.high_load), self.config.high_load_pause)
    }

    fn spawn_run(&self, kind: &'static str, validator: Validator<E>) -> ValidationRun {
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let token = cancel.clone();
        let guard = done.clone().drop_guard();
        tokio::spawn(async move {
            let _guard = guard;
            match validator.validate(&token).await {
                Ok(stats) => info!(
                    kind,
                    scanned = stats.scanned,
                    inconsistencies = stats.inconsistencies(),
                    cancelled = token.is_cancelled(),
                    "검증 작업 종료"
                ),
                Err(e) => error!(kind, error = %e, "검증 작업 실패"),
            }
        });

        ValidationRun { cancel, done }
    }
}
