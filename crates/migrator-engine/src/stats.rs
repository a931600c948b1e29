//! 검증/수정 통계 구조체.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 검증 작업 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    /// 스캔한 행 수
    pub scanned: usize,
    /// 대상에 없는 행 (TargetMissing)
    pub target_missing: usize,
    /// 기준에 없는 행 (BaseMissing)
    pub base_missing: usize,
    /// 값이 다른 행 (NotEqual)
    pub not_equal: usize,
    /// 조회/디코딩/발행 에러 횟수
    pub errors: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ValidationStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 발견한 불일치 총계
    pub fn inconsistencies(&self) -> usize {
        self.target_missing + self.base_missing + self.not_equal
    }

    /// 다른 방향의 통계 합산
    pub fn merge(&mut self, other: &ValidationStats) {
        self.scanned += other.scanned;
        self.target_missing += other.target_missing;
        self.base_missing += other.base_missing;
        self.not_equal += other.not_equal;
        self.errors += other.errors;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            scanned = self.scanned,
            target_missing = self.target_missing,
            base_missing = self.base_missing,
            not_equal = self.not_equal,
            errors = self.errors,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "검증 완료"
        );
    }
}

/// 수정 소비자 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixStats {
    /// upsert로 복구한 행 수
    pub upserted: usize,
    /// 삭제로 복구한 행 수
    pub deleted: usize,
    /// 디코딩 실패 등으로 건너뛴 메시지 수
    pub skipped: usize,
    /// 재시도 소진 후 실패한 메시지 수
    pub failed: usize,
}

impl FixStats {
    /// 처리한 메시지 총계
    pub fn total(&self) -> usize {
        self.upserted + self.deleted + self.skipped + self.failed
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total(),
            upserted = self.upserted,
            deleted = self.deleted,
            skipped = self.skipped,
            failed = self.failed,
            "수정 처리 요약"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_directions() {
        let mut forward = ValidationStats {
            scanned: 3,
            target_missing: 1,
            not_equal: 1,
            elapsed: Duration::from_millis(20),
            ..Default::default()
        };
        let backward = ValidationStats {
            scanned: 2,
            base_missing: 1,
            errors: 1,
            elapsed: Duration::from_millis(50),
            ..Default::default()
        };

        forward.merge(&backward);
        assert_eq!(forward.scanned, 5);
        assert_eq!(forward.inconsistencies(), 3);
        assert_eq!(forward.errors, 1);
        assert_eq!(forward.elapsed, Duration::from_millis(50));
    }
}
