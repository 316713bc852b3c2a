//! 재시작 가능한 주기 트리거
//!
//! 이벤트 루프의 `select!` 안에서 `tick().await` 로 사용한다.
//! 정지 상태에서는 영원히 대기하므로 다른 분기만 진행된다.
//! 한 루프에서만 폴링되므로 틱 처리는 서로 겹치지 않는다.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Default)]
pub struct Ticker {
    interval: Option<Interval>,
    period: Option<Duration>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시작 (이미 동작 중이면 스케줄 교체)
    ///
    /// 첫 틱은 `period` 후에 발생한다. `period` 는 0이 아니어야 한다.
    pub fn start(&mut self, period: Duration) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        // 처리 지연 시 몰아서 쏘지 않음
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.period = Some(period);
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.period = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// 다음 틱까지 대기
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_period() {
        let mut ticker = Ticker::new();
        let start = Instant::now();
        ticker.start(Duration::from_millis(1000));

        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));

        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_never_fires() {
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(10));
        ticker.stop();
        assert!(!ticker.is_running());

        let fired = time::timeout(Duration::from_secs(5), ticker.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_schedule() {
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(100));
        ticker.start(Duration::from_millis(500));
        assert_eq!(ticker.period(), Some(Duration::from_millis(500)));

        let start = Instant::now();
        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
