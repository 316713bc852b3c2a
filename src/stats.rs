//! 스트리밍 통계

use std::time::{Duration, Instant};

use crate::emitter::TickOutcome;

/// 전체 스트리밍 통계
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 시작된 세션 수
    pub sessions_started: u64,

    /// 끝까지 전송된 세션 수
    pub sessions_completed: u64,

    /// 중간에 해제된 세션 수
    pub sessions_aborted: u64,

    /// 전송된 알림 수
    pub notifications_sent: u64,

    /// 전송된 바이트 수
    pub bytes_sent: u64,

    /// 거부된 전송 수
    pub rejected_sends: u64,

    /// 연속 실패 임계값 도달 횟수
    pub failure_alerts: u64,

    /// 피어가 없어 건너뛴 틱 수
    pub skipped_ticks: u64,

    /// 할 일이 없던 틱 수
    pub idle_ticks: u64,

    /// 마지막 전송 시간
    pub last_send_time: Option<Instant>,
}

impl StreamStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            sessions_started: 0,
            sessions_completed: 0,
            sessions_aborted: 0,
            notifications_sent: 0,
            bytes_sent: 0,
            rejected_sends: 0,
            failure_alerts: 0,
            skipped_ticks: 0,
            idle_ticks: 0,
            last_send_time: None,
        }
    }

    /// 틱 결과 반영
    pub fn record_tick(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Sent { len, complete, .. } => {
                self.notifications_sent += 1;
                self.bytes_sent += *len as u64;
                self.last_send_time = Some(Instant::now());
                if *complete {
                    self.sessions_completed += 1;
                }
            }
            TickOutcome::Rejected {
                threshold_reached, ..
            } => {
                self.rejected_sends += 1;
                if *threshold_reached {
                    self.failure_alerts += 1;
                }
            }
            TickOutcome::Skipped => self.skipped_ticks += 1,
            TickOutcome::Idle => self.idle_ticks += 1,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 거부율
    pub fn rejection_rate(&self) -> f64 {
        let total = self.notifications_sent + self.rejected_sends;
        if total == 0 {
            return 0.0;
        }
        self.rejected_sends as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sessions: {}/{} (aborted {}) | Notifications: {} | Bytes: {} | Rejected: {:.1}% (alerts {}) | Skipped ticks: {}",
            self.elapsed().as_secs_f64(),
            self.sessions_completed,
            self.sessions_started,
            self.sessions_aborted,
            self.notifications_sent,
            self.bytes_sent,
            self.rejection_rate() * 100.0,
            self.failure_alerts,
            self.skipped_ticks,
        )
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}
