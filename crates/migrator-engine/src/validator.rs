//! 양방향 데이터 검증기.
//!
//! 기준(base) 저장소와 대상(target) 저장소를 비교하여 행 단위 불일치를
//! 이벤트로 발행합니다. 두 방향이 동시에 실행됩니다.
//!
//! - base → target: base 행마다 target에서 같은 id를 조회하여
//!   없으면 `TargetMissing`, 값이 다르면 `NotEqual`
//! - target → base: target id 묶음을 base에서 일괄 조회하여
//!   없는 id마다 `BaseMissing`
//!
//! `sleep_interval`이 0이면 전체(full) 모드로 끝까지 한 번 스캔하고 종료하며,
//! 0보다 크면 증분(incremental) 모드로 데이터 끝에서 대기 후 같은 커서부터
//! 취소될 때까지 계속 스캔합니다.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use migrator_core::{
    Cursor, Dialect, Direction, Entity, EventType, FromRow, InconsistencyEvent, PageQuery, Row,
    Store, TableSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::EventProducer;
use crate::error::Result;
use crate::stats::ValidationStats;

/// 기본 페이지 크기
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// 고부하 플래그가 켜져 있을 때 기본 대기 시간
pub const DEFAULT_HIGH_LOAD_PAUSE: Duration = Duration::from_millis(500);

/// 양방향 검증기.
pub struct Validator<E> {
    base: Arc<dyn Store>,
    target: Arc<dyn Store>,
    direction: Direction,
    table: TableSpec,
    dialect: Dialect,
    producer: Arc<dyn EventProducer>,
    batch_size: usize,
    utime: i64,
    sleep_interval: Duration,
    order_by: Option<String>,
    high_load: Option<Arc<AtomicBool>>,
    high_load_pause: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Validator<E>
where
    E: Entity + FromRow,
{
    /// 검증기 생성.
    ///
    /// `direction`은 발행하는 모든 이벤트에 실리는 권위 저장소 방향입니다.
    pub fn new(
        base: Arc<dyn Store>,
        target: Arc<dyn Store>,
        direction: Direction,
        table: TableSpec,
        dialect: Dialect,
        producer: Arc<dyn EventProducer>,
    ) -> Self {
        Self {
            base,
            target,
            direction,
            table,
            dialect,
            producer,
            batch_size: DEFAULT_BATCH_SIZE,
            utime: 0,
            sleep_interval: Duration::ZERO,
            order_by: None,
            high_load: None,
            high_load_pause: DEFAULT_HIGH_LOAD_PAUSE,
            _entity: PhantomData,
        }
    }

    /// 페이지 크기 설정
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// 수정 시각 하한 설정 (0이면 조건 없음)
    pub fn with_utime(mut self, utime: i64) -> Self {
        self.utime = utime;
        self
    }

    /// 증분 모드 대기 간격 설정 (0이면 전체 모드)
    pub fn with_sleep_interval(mut self, interval: Duration) -> Self {
        self.sleep_interval = interval;
        self
    }

    /// 정렬 컬럼 설정 (기본: id 컬럼)
    pub fn with_order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// 고부하 플래그 연결. 플래그가 켜져 있으면 페이지마다 `pause`만큼 쉽니다.
    pub fn with_high_load(mut self, flag: Arc<AtomicBool>, pause: Duration) -> Self {
        self.high_load = Some(flag);
        self.high_load_pause = pause;
        self
    }

    /// 전체 모드 여부
    pub fn is_full(&self) -> bool {
        self.sleep_interval.is_zero()
    }

    fn sort_column(&self) -> &str {
        self.order_by
            .as_deref()
            .unwrap_or_else(|| self.table.id_column())
    }

    fn mode(&self) -> &'static str {
        if self.is_full() {
            "full_validation"
        } else {
            "incremental_validation"
        }
    }

    /// 검증 실행.
    ///
    /// 전체 모드는 양방향 스캔이 끝나면, 증분 모드는 취소되면 반환합니다.
    /// 취소 시에도 그때까지의 통계를 `Ok`로 돌려줍니다.
    pub async fn validate(&self, cancel: &CancellationToken) -> Result<ValidationStats> {
        let started = Instant::now();
        info!(
            table = %self.table.name(),
            direction = %self.direction,
            mode = self.mode(),
            utime = self.utime,
            sort = %self.sort_column(),
            batch_size = self.batch_size,
            "검증 시작"
        );

        let (forward, backward) = tokio::try_join!(
            self.validate_base_to_target(cancel),
            self.validate_target_to_base(cancel)
        )?;

        let mut stats = forward;
        stats.merge(&backward);
        stats.elapsed = started.elapsed();
        stats.log_summary(self.mode());
        Ok(stats)
    }

    // =========================================================================
    // base → target
    // =========================================================================

    async fn validate_base_to_target(&self, cancel: &CancellationToken) -> Result<ValidationStats> {
        let mut stats = ValidationStats::new();
        let mut cursor: Option<Cursor> = None;

        'scan: loop {
            if cancel.is_cancelled() || !self.throttle(cancel).await {
                break;
            }

            let stmt = self.table.select_page(
                self.dialect,
                &PageQuery {
                    sort_column: self.sort_column(),
                    utime_after: self.utime,
                    cursor,
                    limit: self.batch_size,
                    ids_only: false,
                },
            )?;

            let rows = match guarded(cancel, self.base.query(&stmt)).await {
                None => break,
                Some(Ok(rows)) => rows,
                Some(Err(e)) => {
                    stats.errors += 1;
                    if self.is_full() {
                        error!(table = %self.table.name(), error = %e, "기준 페이지 조회 실패");
                        return Err(e.into());
                    }
                    warn!(table = %self.table.name(), error = %e, "기준 페이지 조회 실패, 대기 후 재시도");
                    if !self.idle(cancel).await {
                        break;
                    }
                    continue;
                }
            };

            debug!(rows = rows.len(), cursor = ?cursor, "기준 페이지 조회");

            for row in &rows {
                if cancel.is_cancelled() {
                    break 'scan;
                }
                cursor = Some(self.cursor_of(row)?);
                stats.scanned += 1;
                self.check_row(row, cancel, &mut stats).await;
            }

            if rows.len() < self.batch_size && !self.end_of_data(cancel).await {
                break;
            }
        }

        Ok(stats)
    }

    /// 기준 행 하나를 대상과 비교
    async fn check_row(&self, row: &Row, cancel: &CancellationToken, stats: &mut ValidationStats) {
        let base = match E::from_row(row, self.table.id_column()) {
            Ok(entity) => entity,
            Err(e) => {
                stats.errors += 1;
                warn!(table = %self.table.name(), error = %e, "기준 행 디코딩 실패, 건너뜀");
                return;
            }
        };
        let id = base.id();

        let lookup = self.table.select_by_id(self.dialect, id);
        let target_row = match guarded(cancel, self.target.query_row(&lookup)).await {
            None => return,
            Some(Ok(row)) => row,
            Some(Err(e)) => {
                stats.errors += 1;
                warn!(id, error = %e, "대상 행 조회 실패, 건너뜀");
                return;
            }
        };

        let event_type = match target_row {
            None => EventType::TargetMissing,
            Some(target_row) => match E::from_row(&target_row, self.table.id_column()) {
                Ok(target) if base.equals(&target) => return,
                Ok(_) => EventType::NotEqual,
                Err(e) => {
                    stats.errors += 1;
                    warn!(id, error = %e, "대상 행 디코딩 실패, 건너뜀");
                    return;
                }
            },
        };

        self.emit(id, event_type, cancel, stats).await;
    }

    // =========================================================================
    // target → base
    // =========================================================================

    async fn validate_target_to_base(&self, cancel: &CancellationToken) -> Result<ValidationStats> {
        let mut stats = ValidationStats::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            if cancel.is_cancelled() || !self.throttle(cancel).await {
                break;
            }

            let stmt = self.table.select_page(
                self.dialect,
                &PageQuery {
                    sort_column: self.sort_column(),
                    utime_after: self.utime,
                    cursor,
                    limit: self.batch_size,
                    ids_only: true,
                },
            )?;

            let rows = match guarded(cancel, self.target.query(&stmt)).await {
                None => break,
                Some(Ok(rows)) => rows,
                Some(Err(e)) => {
                    stats.errors += 1;
                    if self.is_full() {
                        error!(table = %self.table.name(), error = %e, "대상 페이지 조회 실패");
                        return Err(e.into());
                    }
                    warn!(table = %self.table.name(), error = %e, "대상 페이지 조회 실패, 대기 후 재시도");
                    if !self.idle(cancel).await {
                        break;
                    }
                    continue;
                }
            };

            if !rows.is_empty() {
                let mut ids = Vec::with_capacity(rows.len());
                let mut next_cursor = cursor;
                for row in &rows {
                    let c = self.cursor_of(row)?;
                    ids.push(c.id);
                    next_cursor = Some(c);
                }

                let lookup = self.table.select_ids_in(self.dialect, &ids);
                let present = match guarded(cancel, self.base.query(&lookup)).await {
                    None => break,
                    Some(Ok(found)) => found,
                    Some(Err(e)) => {
                        stats.errors += 1;
                        if self.is_full() {
                            error!(table = %self.table.name(), error = %e, "기준 id 일괄 조회 실패");
                            return Err(e.into());
                        }
                        // 커서를 옮기지 않고 같은 페이지를 다시 시도
                        warn!(table = %self.table.name(), error = %e, "기준 id 일괄 조회 실패, 대기 후 재시도");
                        if !self.idle(cancel).await {
                            break;
                        }
                        continue;
                    }
                };

                let present: HashSet<i64> = present
                    .iter()
                    .filter_map(|row| row.get_i64(self.table.id_column()).ok())
                    .collect();

                debug!(rows = rows.len(), present = present.len(), "대상 페이지 비교");

                for id in ids {
                    if cancel.is_cancelled() {
                        return Ok(stats);
                    }
                    stats.scanned += 1;
                    if !present.contains(&id) {
                        self.emit(id, EventType::BaseMissing, cancel, &mut stats)
                            .await;
                    }
                }
                cursor = next_cursor;
            }

            if rows.len() < self.batch_size && !self.end_of_data(cancel).await {
                break;
            }
        }

        Ok(stats)
    }

    // =========================================================================
    // 공통
    // =========================================================================

    fn cursor_of(&self, row: &Row) -> migrator_core::Result<Cursor> {
        let id = row.get_i64(self.table.id_column())?;
        // 페이지 조회가 NULL 정렬값을 제외하므로 정수가 아니면 디코딩 에러
        let sort = row.get_i64(self.sort_column())?;
        Ok(Cursor { sort, id })
    }

    async fn emit(
        &self,
        id: i64,
        event_type: EventType,
        cancel: &CancellationToken,
        stats: &mut ValidationStats,
    ) {
        let event = InconsistencyEvent::new(id, event_type, self.direction);
        match guarded(cancel, self.producer.produce(&event)).await {
            None => return,
            Some(Ok(())) => {}
            Some(Err(e)) => {
                stats.errors += 1;
                error!(id, event_type = %event_type, error = %e, "불일치 이벤트 발행 실패");
                return;
            }
        }

        match event_type {
            EventType::TargetMissing => stats.target_missing += 1,
            EventType::BaseMissing => stats.base_missing += 1,
            EventType::NotEqual => stats.not_equal += 1,
        }
        debug!(id, event_type = %event_type, direction = %self.direction, "불일치 발견");
    }

    /// 데이터 끝 처리. 계속 스캔해야 하면 true.
    async fn end_of_data(&self, cancel: &CancellationToken) -> bool {
        if self.is_full() {
            return false;
        }
        self.idle(cancel).await
    }

    /// 증분 대기. 취소되면 false.
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        sleep_or_cancel(cancel, self.sleep_interval).await
    }

    /// 고부하 시 잠시 쉼. 취소되면 false.
    async fn throttle(&self, cancel: &CancellationToken) -> bool {
        match &self.high_load {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                debug!(pause_ms = self.high_load_pause.as_millis() as u64, "고부하 감지, 스캔 지연");
                sleep_or_cancel(cancel, self.high_load_pause).await
            }
            _ => true,
        }
    }
}

/// 취소와 경합. 취소되면 None.
async fn guarded<F, T>(cancel: &CancellationToken, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = fut => Some(result),
    }
}

/// 취소 가능한 sleep. 끝까지 잤으면 true.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    guarded(cancel, tokio::time::sleep(duration)).await.is_some()
}
