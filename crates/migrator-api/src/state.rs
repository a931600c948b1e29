//! 라우터 공유 상태.

use std::sync::Arc;

use migrator_core::RowRecord;
use migrator_engine::{MemoryTopic, Scheduler};

/// 수정 소비자 그룹 이름
pub const FIX_CONSUMER_GROUP: &str = "fixer";

/// API 공유 상태
pub struct AppState {
    /// 마이그레이션 스케줄러
    pub scheduler: Arc<Scheduler<RowRecord>>,
    /// 불일치 이벤트 토픽
    pub topic: Arc<MemoryTopic>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler<RowRecord>>, topic: Arc<MemoryTopic>) -> Self {
        Self { scheduler, topic }
    }

    /// 수정 소비자가 아직 커밋하지 않은 이벤트 수
    pub async fn pending_events(&self) -> u64 {
        self.topic.lag(FIX_CONSUMER_GROUP).await
    }
}
