//! 불일치 이벤트 채널.
//!
//! 토픽 기반 pub/sub 추상화입니다. 소비자는 수동 커밋을 사용하며
//! 최소 한 번(at-least-once) 전달을 보장합니다. 외부 브로커 어댑터는
//! `EventProducer` / `EventConsumer`를 구현하면 됩니다.
//!
//! 기본 구현인 [`MemoryTopic`]은 프로세스 내부 append-only 로그와
//! 소비자 그룹별 커밋 오프셋을 보관합니다. 커밋 오프셋은 빈틈없이 커밋된
//! 구간 끝까지만 전진하므로, 처리에 실패한 메시지가 있으면 그 뒤 메시지가
//! 커밋되어도 그룹은 실패한 메시지에서 다시 시작합니다.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use migrator_core::InconsistencyEvent;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::ChannelError;

/// 채널 결과 타입
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// 이벤트 발행자.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// 이벤트 하나 발행
    async fn produce(&self, event: &InconsistencyEvent) -> ChannelResult<()>;
}

/// 소비한 메시지.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// 토픽 내 위치
    pub offset: u64,
    /// JSON 페이로드
    pub payload: Vec<u8>,
}

/// 이벤트 소비자.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// 다음 메시지 대기. 채널이 닫히고 남은 메시지가 없으면 `ChannelError::Closed`.
    async fn poll(&self) -> ChannelResult<Message>;

    /// 메시지 처리 완료 커밋
    async fn commit(&self, message: &Message) -> ChannelResult<()>;

    /// 다음 `poll`이 `offset`부터 다시 읽도록 위치 이동
    async fn seek(&self, offset: u64) -> ChannelResult<()>;
}

// =============================================================================
// 메모리 토픽
// =============================================================================

/// 소비자 그룹 커밋 상태
#[derive(Debug, Default)]
struct GroupOffsets {
    /// 이 위치 앞의 메시지는 모두 커밋됨
    committed: u64,
    /// `committed` 이후 먼저 커밋된 오프셋
    ahead: BTreeSet<u64>,
}

impl GroupOffsets {
    fn commit(&mut self, offset: u64) {
        if offset < self.committed {
            return;
        }
        self.ahead.insert(offset);
        while self.ahead.remove(&self.committed) {
            self.committed += 1;
        }
    }
}

#[derive(Default)]
struct TopicState {
    log: Vec<Vec<u8>>,
    groups: HashMap<String, GroupOffsets>,
    closed: bool,
}

impl TopicState {
    fn committed(&self, group: &str) -> u64 {
        self.groups.get(group).map(|g| g.committed).unwrap_or(0)
    }
}

/// 프로세스 내부 토픽.
pub struct MemoryTopic {
    name: String,
    state: Mutex<TopicState>,
    notify: Notify,
}

impl MemoryTopic {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(TopicState::default()),
            notify: Notify::new(),
        })
    }

    /// 토픽 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 원시 페이로드 발행. 발행된 오프셋 반환.
    pub async fn publish(&self, payload: Vec<u8>) -> ChannelResult<u64> {
        let offset = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ChannelError::Closed);
            }
            state.log.push(payload);
            (state.log.len() - 1) as u64
        };
        self.notify.notify_waiters();
        Ok(offset)
    }

    /// 새 발행을 막고 대기 중인 소비자를 깨움
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// 발행된 메시지 수
    pub async fn len(&self) -> usize {
        self.state.lock().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 그룹의 커밋 오프셋 (재구독 시 읽기 시작 위치)
    pub async fn committed(&self, group: &str) -> u64 {
        self.state.lock().await.committed(group)
    }

    /// 그룹의 커밋 오프셋 이후 메시지 수
    pub async fn lag(&self, group: &str) -> u64 {
        let state = self.state.lock().await;
        (state.log.len() as u64).saturating_sub(state.committed(group))
    }

    /// 지금까지 발행된 이벤트 디코딩 (관찰용)
    pub async fn events(&self) -> ChannelResult<Vec<InconsistencyEvent>> {
        let state = self.state.lock().await;
        state
            .log
            .iter()
            .map(|payload| InconsistencyEvent::from_bytes(payload).map_err(ChannelError::from))
            .collect()
    }

    /// 소비자 생성. 그룹의 마지막 커밋 위치부터 읽습니다.
    pub async fn subscribe(self: &Arc<Self>, group: impl Into<String>) -> MemoryConsumer {
        let group = group.into();
        let start = self.committed(&group).await;
        debug!(topic = %self.name, group = %group, offset = start, "토픽 구독");
        MemoryConsumer {
            topic: Arc::clone(self),
            group,
            position: AtomicU64::new(start),
        }
    }
}

#[async_trait]
impl EventProducer for MemoryTopic {
    async fn produce(&self, event: &InconsistencyEvent) -> ChannelResult<()> {
        let payload = event.to_bytes()?;
        self.publish(payload).await?;
        Ok(())
    }
}

/// 메모리 토픽 소비자.
pub struct MemoryConsumer {
    topic: Arc<MemoryTopic>,
    group: String,
    position: AtomicU64,
}

impl MemoryConsumer {
    /// 소비자 그룹 이름
    pub fn group(&self) -> &str {
        &self.group
    }
}

#[async_trait]
impl EventConsumer for MemoryConsumer {
    async fn poll(&self) -> ChannelResult<Message> {
        loop {
            // 확인 전에 대기 future를 만들어 두어야 그 사이 발행을 놓치지 않음
            let notified = self.topic.notify.notified();
            {
                let state = self.topic.state.lock().await;
                let offset = self.position.load(Ordering::Acquire);
                if let Some(payload) = state.log.get(offset as usize) {
                    self.position.store(offset + 1, Ordering::Release);
                    return Ok(Message {
                        offset,
                        payload: payload.clone(),
                    });
                }
                if state.closed {
                    return Err(ChannelError::Closed);
                }
            }
            notified.await;
        }
    }

    async fn commit(&self, message: &Message) -> ChannelResult<()> {
        let mut state = self.topic.state.lock().await;
        state
            .groups
            .entry(self.group.clone())
            .or_default()
            .commit(message.offset);
        Ok(())
    }

    async fn seek(&self, offset: u64) -> ChannelResult<()> {
        self.position.store(offset, Ordering::Release);
        Ok(())
    }
}
