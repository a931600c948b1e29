//! 불일치 이벤트.
//!
//! Validator가 생성하고 이벤트 채널을 거쳐 Fixer가 소비합니다.
//! 전송 계층 밖에서는 영속화하지 않습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::Direction;

/// 불일치 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// 대상에는 있고 기준(base)에는 없음
    BaseMissing,
    /// 기준에는 있고 대상(target)에는 없음
    TargetMissing,
    /// 양쪽에 있으나 값이 다름
    NotEqual,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::BaseMissing => write!(f, "base_missing"),
            EventType::TargetMissing => write!(f, "target_missing"),
            EventType::NotEqual => write!(f, "not_equal"),
        }
    }
}

/// 행 단위 불일치 이벤트.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InconsistencyEvent {
    /// 행 식별자
    pub id: i64,
    /// 불일치 유형
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// 이번 수리에서 권위 있는 저장소
    pub direction: Direction,
}

impl InconsistencyEvent {
    pub fn new(id: i64, event_type: EventType, direction: Direction) -> Self {
        Self {
            id,
            event_type,
            direction,
        }
    }

    /// JSON 직렬화
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// JSON 역직렬화
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
