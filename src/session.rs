//! 스트림 세션 상태
//!
//! 구독 기간 하나의 전송 진행 상황. 구독 활성화 시 생성/리셋되고
//! 틱 처리에 명시적으로 전달된다.

/// 스트림 세션
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSession {
    /// 전송 완료된 바이트 수
    bytes_sent: usize,

    /// 전송 완료된 패킷 수
    packets_sent: u32,

    /// 전송 허가 여부 (구독 활성 + 티커 동작)
    active: bool,

    /// 연속 전송 실패 횟수
    consecutive_failures: u32,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 세션 시작: 진행 상황을 0으로 되돌리고 활성화
    pub fn start(&mut self) {
        *self = Self {
            active: true,
            ..Self::default()
        };
    }

    /// 세션 종료: 비활성화하고 진행 상황 폐기
    ///
    /// 재구독은 항상 버퍼 처음부터 다시 시작한다.
    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// 남은 바이트 수
    pub fn remaining(&self, total_length: usize) -> usize {
        total_length.saturating_sub(self.bytes_sent)
    }

    /// 전송 완료 여부
    pub fn is_complete(&self, total_length: usize) -> bool {
        self.bytes_sent >= total_length
    }

    /// 전송 성공 기록
    pub(crate) fn record_sent(&mut self, len: usize) {
        self.bytes_sent += len;
        self.packets_sent += 1;
        self.consecutive_failures = 0;
    }

    /// 전송 실패 기록, 누적 연속 실패 횟수 반환
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_resets_progress() {
        let mut session = StreamSession::new();
        session.start();
        session.record_sent(244);
        session.record_failure();

        session.start();
        assert!(session.is_active());
        assert_eq!(session.bytes_sent(), 0);
        assert_eq!(session.packets_sent(), 0);
        assert_eq!(session.consecutive_failures(), 0);
    }

    #[test]
    fn test_stop_clears_session() {
        let mut session = StreamSession::new();
        session.start();
        session.record_sent(244);
        session.stop();

        assert!(!session.is_active());
        assert_eq!(session.bytes_sent(), 0);
        assert_eq!(session.packets_sent(), 0);
    }

    #[test]
    fn test_failure_counter_resets_on_success() {
        let mut session = StreamSession::new();
        session.start();
        assert_eq!(session.record_failure(), 1);
        assert_eq!(session.record_failure(), 2);
        session.record_sent(10);
        assert_eq!(session.consecutive_failures(), 0);
        assert_eq!(session.remaining(30), 20);
        assert!(!session.is_complete(30));
    }
}
