//! 트래픽 라우팅 phase와 권위(authoritative) 방향.
//!
//! 운영자는 `SRC_ONLY → SRC_FIRST → DST_FIRST → DST_ONLY` 순서로 phase를
//! 전환합니다. 자동 전환은 없습니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 트래픽 라우팅 phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Phase {
    /// 소스만 읽기/쓰기
    SrcOnly = 0,
    /// 소스 우선 쓰기, 목적지 best-effort 복제
    SrcFirst = 1,
    /// 목적지 우선 쓰기, 소스 best-effort 복제
    DstFirst = 2,
    /// 목적지만 읽기/쓰기
    DstOnly = 3,
}

impl Phase {
    /// 원자 변수 저장용 바이트 값.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 바이트 값에서 phase 복원.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SrcOnly),
            1 => Some(Self::SrcFirst),
            2 => Some(Self::DstFirst),
            3 => Some(Self::DstOnly),
            _ => None,
        }
    }

    /// 이 phase에서 권위 있는 저장소.
    pub fn authoritative(self) -> Direction {
        match self {
            Self::SrcOnly | Self::SrcFirst => Direction::Src,
            Self::DstFirst | Self::DstOnly => Direction::Dst,
        }
    }

    /// 쓰기를 보조 저장소에도 복제하는지 여부.
    pub fn is_double_write(self) -> bool {
        matches!(self, Self::SrcFirst | Self::DstFirst)
    }

    /// 문자열 표현 (`SRC_ONLY` 등).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SrcOnly => "SRC_ONLY",
            Self::SrcFirst => "SRC_FIRST",
            Self::DstFirst => "DST_FIRST",
            Self::DstOnly => "DST_ONLY",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SRC_ONLY" => Ok(Self::SrcOnly),
            "SRC_FIRST" => Ok(Self::SrcFirst),
            "DST_FIRST" => Ok(Self::DstFirst),
            "DST_ONLY" => Ok(Self::DstOnly),
            _ => Err(format!("Invalid phase: {}", s)),
        }
    }
}

/// 권위 있는 저장소 방향.
///
/// 불일치 이벤트에서는 "어느 쪽 값이 이기는지"를 나타냅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 소스가 권위
    #[serde(rename = "SRC")]
    Src,
    /// 목적지가 권위
    #[serde(rename = "DST")]
    Dst,
}

impl Direction {
    /// 문자열 표현.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Src => "SRC",
            Self::Dst => "DST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SRC" => Ok(Self::Src),
            "DST" => Ok(Self::Dst),
            _ => Err(format!("Invalid direction: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_byte_roundtrip_rejects_unknown() {
        for phase in [
            Phase::SrcOnly,
            Phase::SrcFirst,
            Phase::DstFirst,
            Phase::DstOnly,
        ] {
            assert_eq!(Phase::from_u8(phase.as_u8()), Some(phase));
        }
        assert_eq!(Phase::from_u8(4), None);
    }

    #[test]
    fn test_phase_authority() {
        assert_eq!(Phase::SrcOnly.authoritative(), Direction::Src);
        assert_eq!(Phase::SrcFirst.authoritative(), Direction::Src);
        assert_eq!(Phase::DstFirst.authoritative(), Direction::Dst);
        assert_eq!(Phase::DstOnly.authoritative(), Direction::Dst);
        assert!(Phase::SrcFirst.is_double_write());
        assert!(!Phase::DstOnly.is_double_write());
    }

    #[test]
    fn test_phase_parse() {
        assert_eq!("src-first".parse::<Phase>().unwrap(), Phase::SrcFirst);
        assert_eq!("DST_ONLY".parse::<Phase>().unwrap(), Phase::DstOnly);
        assert!("both".parse::<Phase>().is_err());
        assert_eq!(
            serde_json::to_string(&Phase::DstFirst).unwrap(),
            "\"DST_FIRST\""
        );
    }
}
