//! 불일치 이벤트 소비자.
//!
//! 이벤트 채널에서 메시지를 읽어 방향에 맞는 수정기로 보냅니다.
//! 수정이 성공한 메시지만 커밋하므로 최소 한 번 처리됩니다.
//!
//! # 메시지 처리 규칙
//!
//! - 디코딩 실패 / 알 수 없는 방향: 로그 후 커밋 (다시 받아도 처리 불가)
//! - 재시도 가능한 저장소 에러: `RetryConfig`에 따라 재시도
//! - 재시도 소진 / 재시도 불가 에러: 커밋하지 않고 그 메시지로 되감은 뒤
//!   `redelivery_backoff`만큼 쉬고 다시 처리. 성공하거나 종료 신호를 받을
//!   때까지 뒤 메시지로 넘어가지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use migrator_core::{Direction, EventType, InconsistencyEvent};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{EventConsumer, Message};
use crate::error::{ChannelError, MigratorError, Result};
use crate::fixer::{FixOutcome, Fixer};
use crate::retry::{with_retry, RetryConfig};
use crate::stats::FixStats;

/// 전송 에러 후 재폴링 대기
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// 수정 실패 메시지 재처리 전 기본 대기
pub const DEFAULT_REDELIVERY_BACKOFF: Duration = Duration::from_secs(1);

/// 방향 문자열을 그대로 받는 와이어 포맷
#[derive(Debug, Deserialize)]
struct WireEvent {
    id: i64,
    #[serde(rename = "type")]
    event_type: EventType,
    direction: String,
}

/// 페이로드를 이벤트로 디코딩.
///
/// JSON 오류는 `MigratorError::Decode`, 방향 값 오류는
/// `MigratorError::UnknownDirection`으로 구분합니다.
pub fn decode_event(payload: &[u8]) -> Result<InconsistencyEvent> {
    let wire: WireEvent = serde_json::from_slice(payload)?;
    let direction = wire
        .direction
        .parse::<Direction>()
        .map_err(|_| MigratorError::UnknownDirection(wire.direction.clone()))?;
    Ok(InconsistencyEvent::new(wire.id, wire.event_type, direction))
}

/// 수정 소비자.
pub struct FixConsumer {
    consumer: Arc<dyn EventConsumer>,
    /// 소스 권위: src → dst
    src_fixer: Arc<Fixer>,
    /// 목적지 권위: dst → src
    dst_fixer: Arc<Fixer>,
    retry: RetryConfig,
    redelivery_backoff: Duration,
    stats: FixStats,
}

impl FixConsumer {
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        src_fixer: Arc<Fixer>,
        dst_fixer: Arc<Fixer>,
    ) -> Self {
        Self {
            consumer,
            src_fixer,
            dst_fixer,
            retry: RetryConfig::default(),
            redelivery_backoff: DEFAULT_REDELIVERY_BACKOFF,
            stats: FixStats::default(),
        }
    }

    /// 재시도 설정 변경
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 실패 메시지 재처리 대기 변경
    pub fn with_redelivery_backoff(mut self, backoff: Duration) -> Self {
        self.redelivery_backoff = backoff;
        self
    }

    /// 지금까지의 처리 통계
    pub fn stats(&self) -> &FixStats {
        &self.stats
    }

    fn fixer_for(&self, direction: Direction) -> &Fixer {
        match direction {
            Direction::Src => &self.src_fixer,
            Direction::Dst => &self.dst_fixer,
        }
    }

    /// 메시지 하나 처리 (커밋 제외).
    pub async fn handle(&self, message: &Message) -> Result<FixOutcome> {
        let event = decode_event(&message.payload)?;
        let fixer = self.fixer_for(event.direction);
        with_retry(&self.retry, || fixer.fix(event.id)).await
    }

    /// 종료 신호 또는 채널 닫힘까지 소비 루프 실행.
    pub async fn run(mut self, shutdown: CancellationToken) -> FixStats {
        info!("수정 소비자 시작");

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("종료 신호 수신, 수정 소비자 중지");
                    break;
                }
                polled = self.consumer.poll() => polled,
            };

            match polled {
                Ok(message) => {
                    if !self.process(&message).await {
                        self.redeliver(&message).await;
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("종료 신호 수신, 수정 소비자 중지");
                                break;
                            }
                            _ = tokio::time::sleep(self.redelivery_backoff) => {}
                        }
                    }
                }
                Err(ChannelError::Closed) => {
                    info!("이벤트 채널 닫힘, 수정 소비자 중지");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "이벤트 폴링 실패");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        self.stats.log_summary("fix_consumer");
        self.stats
    }

    /// 메시지 처리. 다시 받아야 하면 `false`.
    async fn process(&mut self, message: &Message) -> bool {
        match self.handle(message).await {
            Ok(outcome) => {
                match outcome {
                    FixOutcome::Upserted => self.stats.upserted += 1,
                    FixOutcome::Deleted => self.stats.deleted += 1,
                }
                debug!(offset = message.offset, outcome = ?outcome, "이벤트 처리 완료");
                self.commit(message).await;
                true
            }
            Err(e @ (MigratorError::Decode(_) | MigratorError::UnknownDirection(_))) => {
                self.stats.skipped += 1;
                error!(offset = message.offset, error = %e, "처리할 수 없는 이벤트, 건너뜀");
                self.commit(message).await;
                true
            }
            Err(e) => {
                self.stats.failed += 1;
                error!(
                    offset = message.offset,
                    error = %e,
                    backoff_ms = self.redelivery_backoff.as_millis() as u64,
                    "이벤트 수정 실패, 커밋하지 않고 재처리 대기"
                );
                false
            }
        }
    }

    async fn redeliver(&self, message: &Message) {
        if let Err(e) = self.consumer.seek(message.offset).await {
            warn!(offset = message.offset, error = %e, "오프셋 되감기 실패");
        }
    }

    async fn commit(&self, message: &Message) {
        if let Err(e) = self.consumer.commit(message).await {
            warn!(offset = message.offset, error = %e, "오프셋 커밋 실패");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_event() {
        let event = decode_event(br#"{"id":3,"type":"not_equal","direction":"DST"}"#).unwrap();
        assert_eq!(event.id, 3);
        assert_eq!(event.event_type, EventType::NotEqual);
        assert_eq!(event.direction, Direction::Dst);
    }

    #[test]
    fn test_decode_errors_are_distinct() {
        assert!(matches!(
            decode_event(br#"{"id":3,"type":"not_equal","direction":"BOTH"}"#),
            Err(MigratorError::UnknownDirection(d)) if d == "BOTH"
        ));
        assert!(matches!(
            decode_event(b"not json"),
            Err(MigratorError::Decode(_))
        ));
    }
}
