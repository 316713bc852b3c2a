//! 스트리머 설정

use std::time::Duration;

use crate::chunk::chunk_count;
use crate::event::CharacteristicHandle;
use crate::{
    Error, Result, DEFAULT_CHARACTERISTIC, DEFAULT_MAX_CONSECUTIVE_FAILURES,
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TOTAL_LENGTH, MAX_PACKET_SIZE,
    MAX_TOTAL_LENGTH,
};

/// NotiStream 설정
///
/// 모든 값은 프로세스 수명 동안 고정되며 런타임에 재협상하지 않는다.
#[derive(Debug, Clone)]
pub struct Config {
    /// 소스 버퍼 전체 길이 (바이트)
    pub total_length: usize,

    /// 알림 한 번에 실을 수 있는 최대 페이로드 (바이트)
    pub max_packet_size: usize,

    /// 틱 주기 (밀리초)
    pub tick_interval_ms: u64,

    /// 연속 전송 실패 진단 임계값
    /// 이 횟수만큼 연속 실패하면 error 로그를 남긴다 (중단하지는 않음)
    pub max_consecutive_failures: u32,

    /// 구독을 감시할 characteristic 핸들
    pub characteristic: CharacteristicHandle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_length: DEFAULT_TOTAL_LENGTH,         // 510 bytes
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,   // 244 bytes
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS, // 1초
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            characteristic: DEFAULT_CHARACTERISTIC,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 빠른 데모/테스트용 설정 (20ms 틱)
    pub fn low_latency() -> Self {
        Self {
            tick_interval_ms: 20,
            max_consecutive_failures: 50,
            ..Self::default()
        }
    }

    /// 버퍼 전체가 한 패킷에 들어가는 설정
    pub fn single_packet() -> Self {
        Self {
            total_length: DEFAULT_MAX_PACKET_SIZE,
            ..Self::default()
        }
    }

    /// 틱 주기
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// 전체 버퍼 전송에 필요한 패킷 수 (올림)
    pub fn packets_per_stream(&self) -> usize {
        chunk_count(self.total_length, self.max_packet_size)
    }

    /// 마지막 패킷 크기
    pub fn last_packet_size(&self) -> usize {
        if self.max_packet_size == 0 || self.total_length == 0 {
            return 0;
        }
        match self.total_length % self.max_packet_size {
            0 => self.max_packet_size,
            rest => rest,
        }
    }

    /// 설정 검증
    ///
    /// 틱이 예약되기 전에 호출되어야 하며, 실패는 시작 단계에서 치명적이다.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_size == 0 {
            return Err(Error::Configuration(
                "max_packet_size는 0보다 커야 함".into(),
            ));
        }
        if self.max_packet_size > MAX_PACKET_SIZE {
            return Err(Error::Configuration(format!(
                "max_packet_size {} 가 최대값 {} 초과",
                self.max_packet_size, MAX_PACKET_SIZE
            )));
        }
        if self.total_length == 0 {
            return Err(Error::Configuration("total_length가 초기화되지 않음".into()));
        }
        if self.total_length > MAX_TOTAL_LENGTH {
            return Err(Error::Configuration(format!(
                "total_length {} 가 최대값 {} 초과",
                self.total_length, MAX_TOTAL_LENGTH
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Configuration(
                "tick_interval_ms는 0보다 커야 함".into(),
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::Configuration(
                "max_consecutive_failures는 0보다 커야 함".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.total_length, 510);
        assert_eq!(config.max_packet_size, 244);
        assert_eq!(config.tick_interval(), Duration::from_millis(1000));
        assert!(config.validate().is_ok());

        let fast = Config::low_latency();
        assert_eq!(fast.tick_interval(), Duration::from_millis(20));
        assert!(fast.validate().is_ok());
    }

    #[test]
    fn test_packet_math() {
        let config = Config::default();
        assert_eq!(config.packets_per_stream(), 3);
        assert_eq!(config.last_packet_size(), 22);

        let single = Config::single_packet();
        assert_eq!(single.packets_per_stream(), 1);
        assert_eq!(single.last_packet_size(), 244);

        let exact = Config {
            total_length: 488,
            ..Config::default()
        };
        assert_eq!(exact.packets_per_stream(), 2);
        assert_eq!(exact.last_packet_size(), 244);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_packet = Config {
            max_packet_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_packet.validate(),
            Err(Error::Configuration(_))
        ));

        let empty = Config {
            total_length: 0,
            ..Config::default()
        };
        assert!(matches!(empty.validate(), Err(Error::Configuration(_))));

        let too_large = Config {
            total_length: MAX_TOTAL_LENGTH + 1,
            ..Config::default()
        };
        assert!(matches!(too_large.validate(), Err(Error::Configuration(_))));

        let oversized_packet = Config {
            max_packet_size: 70_000,
            ..Config::default()
        };
        assert!(matches!(
            oversized_packet.validate(),
            Err(Error::Configuration(_))
        ));

        let widest_packet = Config {
            max_packet_size: MAX_PACKET_SIZE,
            ..Config::default()
        };
        assert!(widest_packet.validate().is_ok());

        let no_tick = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(no_tick.validate(), Err(Error::Configuration(_))));
    }
}
