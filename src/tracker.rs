//! 구독 추적기
//!
//! 피어가 감시 대상 characteristic 의 알림을 켰는지 기록하고,
//! 그에 따라 세션을 리셋/종료하며 티커를 시작/정지한다.
//! 티커의 수명은 이 모듈만 다룬다.

use std::time::Duration;

use tracing::{debug, info};

use crate::event::{CharacteristicHandle, StatusFlags};
use crate::session::StreamSession;
use crate::ticker::Ticker;

/// 구독 상태 전이 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// false → true: 새 세션 시작
    Activated,

    /// true → false: 세션 종료
    Deactivated,

    /// 변화 없음 또는 무시된 이벤트
    Unchanged,
}

/// 구독 추적기
#[derive(Debug)]
pub struct SubscriptionTracker {
    characteristic: CharacteristicHandle,
    period: Duration,
    enabled: bool,
    ticker: Ticker,
}

impl SubscriptionTracker {
    pub fn new(characteristic: CharacteristicHandle, period: Duration) -> Self {
        Self {
            characteristic,
            period,
            enabled: false,
            ticker: Ticker::new(),
        }
    }

    pub fn characteristic(&self) -> CharacteristicHandle {
        self.characteristic
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// 이벤트 루프에서 폴링할 티커
    pub fn ticker_mut(&mut self) -> &mut Ticker {
        &mut self.ticker
    }

    /// characteristic 상태 이벤트 처리
    ///
    /// 감시 대상 characteristic 의 CCCD 변경만 반영한다.
    /// 0이 아닌 CCCD 값(notify/indicate)은 모두 활성으로 본다.
    pub fn on_characteristic_status(
        &mut self,
        characteristic: CharacteristicHandle,
        status_flags: StatusFlags,
        client_config_flags: u16,
        session: &mut StreamSession,
    ) -> SubscriptionChange {
        if characteristic != self.characteristic {
            debug!("다른 characteristic 이벤트 무시: 0x{:04X}", characteristic);
            return SubscriptionChange::Unchanged;
        }
        if status_flags != StatusFlags::ClientConfig {
            return SubscriptionChange::Unchanged;
        }

        self.on_subscription_changed(client_config_flags != 0, session)
    }

    /// 구독 상태 변경
    pub fn on_subscription_changed(
        &mut self,
        enabled: bool,
        session: &mut StreamSession,
    ) -> SubscriptionChange {
        match (self.enabled, enabled) {
            (false, true) => {
                self.enabled = true;
                session.start();
                self.ticker.start(self.period);
                info!(
                    "구독 활성화: 세션 시작, 티커 {}ms",
                    self.period.as_millis()
                );
                SubscriptionChange::Activated
            }
            (true, false) => {
                self.deactivate(session);
                info!("구독 해제: 티커 정지");
                SubscriptionChange::Deactivated
            }
            _ => SubscriptionChange::Unchanged,
        }
    }

    /// 피어 연결 종료 (`enabled=false` 와 동일)
    pub fn on_disconnect(&mut self, session: &mut StreamSession) -> SubscriptionChange {
        if !self.enabled {
            session.stop();
            return SubscriptionChange::Unchanged;
        }
        self.deactivate(session);
        info!("연결 종료로 구독 해제: 티커 정지");
        SubscriptionChange::Deactivated
    }

    /// 전송 완료 후 티커만 정지 (구독은 유지)
    pub fn finish(&mut self) {
        if self.ticker.is_running() {
            self.ticker.stop();
            debug!("스트림 완료: 티커 정지");
        }
    }

    fn deactivate(&mut self, session: &mut StreamSession) {
        self.enabled = false;
        self.ticker.stop();
        session.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::client_config;

    const CHAR: CharacteristicHandle = 0x0017;

    fn tracker() -> SubscriptionTracker {
        SubscriptionTracker::new(CHAR, Duration::from_millis(1000))
    }

    #[tokio::test]
    async fn test_activation_starts_ticker_and_resets_session() {
        let mut tracker = tracker();
        let mut session = StreamSession::new();

        let change = tracker.on_subscription_changed(true, &mut session);
        assert_eq!(change, SubscriptionChange::Activated);
        assert!(tracker.is_enabled());
        assert!(tracker.is_ticking());
        assert!(session.is_active());
        assert_eq!(session.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_enable_is_unchanged() {
        let mut tracker = tracker();
        let mut session = StreamSession::new();

        tracker.on_subscription_changed(true, &mut session);
        session.record_sent(244);

        let change = tracker.on_subscription_changed(true, &mut session);
        assert_eq!(change, SubscriptionChange::Unchanged);
        assert_eq!(session.bytes_sent(), 244);
    }

    #[tokio::test]
    async fn test_deactivation_and_disconnect() {
        let mut tracker = tracker();
        let mut session = StreamSession::new();

        tracker.on_subscription_changed(true, &mut session);
        assert_eq!(
            tracker.on_subscription_changed(false, &mut session),
            SubscriptionChange::Deactivated
        );
        assert!(!tracker.is_ticking());
        assert!(!session.is_active());

        tracker.on_subscription_changed(true, &mut session);
        assert_eq!(
            tracker.on_disconnect(&mut session),
            SubscriptionChange::Deactivated
        );
        assert!(!tracker.is_enabled());
        assert!(!tracker.is_ticking());
    }

    #[tokio::test]
    async fn test_characteristic_status_filtering() {
        let mut tracker = tracker();
        let mut session = StreamSession::new();

        // 다른 characteristic
        assert_eq!(
            tracker.on_characteristic_status(
                0x0020,
                StatusFlags::ClientConfig,
                client_config::NOTIFICATION,
                &mut session
            ),
            SubscriptionChange::Unchanged
        );

        // indication 확인 이벤트는 구독 변경이 아님
        assert_eq!(
            tracker.on_characteristic_status(
                CHAR,
                StatusFlags::Confirmation,
                client_config::NOTIFICATION,
                &mut session
            ),
            SubscriptionChange::Unchanged
        );

        assert_eq!(
            tracker.on_characteristic_status(
                CHAR,
                StatusFlags::ClientConfig,
                client_config::INDICATION,
                &mut session
            ),
            SubscriptionChange::Activated
        );
    }

    #[tokio::test]
    async fn test_finish_keeps_subscription() {
        let mut tracker = tracker();
        let mut session = StreamSession::new();

        tracker.on_subscription_changed(true, &mut session);
        tracker.finish();
        assert!(tracker.is_enabled());
        assert!(!tracker.is_ticking());
    }
}
