//! 알림 스트리머 (서버측)
//!
//! - 피어 이벤트 → 구독 추적기 → 티커 시작/정지
//! - 틱 → 청크 이미터 → 전송 싱크
//! - 단일 피어, 단일 태스크에서 모든 상태 변경

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::buffer::SourceBuffer;
use crate::emitter::{ChunkEmitter, TickOutcome};
use crate::event::{ConnectionHandle, PeerEvent};
use crate::session::StreamSession;
use crate::sink::TransportSink;
use crate::stats::StreamStats;
use crate::tracker::{SubscriptionChange, SubscriptionTracker};
use crate::{Config, Error, Result};

/// 알림 스트리머
pub struct Notifier<S> {
    /// 설정
    config: Config,

    /// 청크 이미터 (소스 버퍼 참조)
    emitter: ChunkEmitter,

    /// 구독 추적기 (티커 소유)
    tracker: SubscriptionTracker,

    /// 현재 세션
    session: StreamSession,

    /// 연결된 피어
    peer: Option<ConnectionHandle>,

    /// 전송 싱크
    sink: S,

    /// 통계 (관찰자와 공유)
    stats: Arc<RwLock<StreamStats>>,
}

impl<S: TransportSink> Notifier<S> {
    /// 새 스트리머 생성
    ///
    /// 설정 오류는 여기서 실패하며, 어떤 틱도 예약되지 않는다.
    pub fn new(config: Config, buffer: SourceBuffer, sink: S) -> Result<Self> {
        config.validate()?;
        if buffer.len() != config.total_length {
            return Err(Error::Configuration(format!(
                "소스 버퍼 길이 {} 가 설정된 total_length {} 와 다름",
                buffer.len(),
                config.total_length
            )));
        }

        info!(
            "Notifier 준비: {} bytes, packet {} bytes, {} packets, tick {}ms",
            config.total_length,
            config.max_packet_size,
            config.packets_per_stream(),
            config.tick_interval_ms
        );

        Ok(Self {
            emitter: ChunkEmitter::new(
                buffer,
                config.max_packet_size,
                config.max_consecutive_failures,
            ),
            tracker: SubscriptionTracker::new(config.characteristic, config.tick_interval()),
            session: StreamSession::new(),
            peer: None,
            sink,
            stats: Arc::new(RwLock::new(StreamStats::new())),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn peer(&self) -> Option<ConnectionHandle> {
        self.peer
    }

    pub fn is_subscribed(&self) -> bool {
        self.tracker.is_enabled()
    }

    pub fn is_ticking(&self) -> bool {
        self.tracker.is_ticking()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// 통계 핸들
    pub fn stats(&self) -> Arc<RwLock<StreamStats>> {
        self.stats.clone()
    }

    /// 피어 이벤트 처리
    pub fn handle_event(&mut self, event: PeerEvent) -> SubscriptionChange {
        match event {
            PeerEvent::ConnectionOpened { connection } => {
                match self.peer {
                    Some(current) if current != connection => {
                        warn!("이미 {} 연결됨: {} 무시", current, connection);
                    }
                    _ => {
                        info!("connection opened: {}", connection);
                        self.peer = Some(connection);
                    }
                }
                SubscriptionChange::Unchanged
            }

            PeerEvent::ConnectionClosed { connection, reason } => {
                if self.peer != Some(connection) {
                    debug!("알 수 없는 연결 종료 무시: {}", connection);
                    return SubscriptionChange::Unchanged;
                }
                info!("connection closed: {}, reason: 0x{:02x}", connection, reason);
                self.peer = None;
                let change = self.tracker.on_disconnect(&mut self.session);
                self.record_change(change);
                change
            }

            PeerEvent::CharacteristicStatus {
                connection,
                characteristic,
                status_flags,
                client_config_flags,
            } => {
                if self.peer != Some(connection) {
                    debug!("연결되지 않은 피어의 상태 이벤트 무시: {}", connection);
                    return SubscriptionChange::Unchanged;
                }
                let change = self.tracker.on_characteristic_status(
                    characteristic,
                    status_flags,
                    client_config_flags,
                    &mut self.session,
                );
                self.record_change(change);
                change
            }
        }
    }

    /// 구독 상태 직접 변경 (이벤트 피드를 거치지 않는 경우)
    pub fn on_subscription_changed(&mut self, enabled: bool) -> SubscriptionChange {
        let change = self
            .tracker
            .on_subscription_changed(enabled, &mut self.session);
        self.record_change(change);
        change
    }

    /// 틱 처리
    pub fn on_tick(&mut self) -> TickOutcome {
        let outcome = self
            .emitter
            .on_tick(&mut self.session, self.peer, &mut self.sink);

        if let TickOutcome::Sent { complete: true, .. } = outcome {
            self.tracker.finish();
        }

        self.stats.write().record_tick(&outcome);
        outcome
    }

    /// 이벤트 루프 실행
    ///
    /// 이벤트 채널이 닫히면 종료한다.
    pub async fn run(mut self, mut events: mpsc::Receiver<PeerEvent>) -> Result<StreamStats> {
        info!("Notifier 이벤트 루프 시작");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle_event(event);
                        }
                        None => {
                            info!("이벤트 채널 종료, Notifier 종료");
                            break;
                        }
                    }
                }
                _ = self.tracker.ticker_mut().tick() => {
                    self.on_tick();
                }
            }
        }

        let stats = self.stats.read().clone();
        info!("{}", stats.summary());
        Ok(stats)
    }

    fn record_change(&self, change: SubscriptionChange) {
        let mut stats = self.stats.write();
        match change {
            SubscriptionChange::Activated => stats.sessions_started += 1,
            SubscriptionChange::Deactivated => {
                // 완료 후 해제는 중단이 아님
                if stats.sessions_started > stats.sessions_completed + stats.sessions_aborted {
                    stats.sessions_aborted += 1;
                }
            }
            SubscriptionChange::Unchanged => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::event::{client_config, StatusFlags};
    use crate::sink::{ChannelSink, Notification};

    const PEER: ConnectionHandle = ConnectionHandle(1);

    fn notifier(config: Config) -> (Notifier<ChannelSink>, mpsc::Receiver<Notification>) {
        let buffer = SourceBuffer::test_pattern(config.total_length).unwrap();
        let (sink, rx) = ChannelSink::channel(16);
        (Notifier::new(config, buffer, sink).unwrap(), rx)
    }

    fn subscribe(notifier: &mut Notifier<ChannelSink>, enabled: bool) -> SubscriptionChange {
        let characteristic = notifier.config().characteristic;
        notifier.handle_event(PeerEvent::subscription(PEER, characteristic, enabled))
    }

    fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n.data);
        }
        out
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = Config {
            max_packet_size: 0,
            ..Config::default()
        };
        let buffer = SourceBuffer::test_pattern(510).unwrap();
        let (sink, _rx) = ChannelSink::channel(1);
        assert!(matches!(
            Notifier::new(config, buffer, sink),
            Err(Error::Configuration(_))
        ));

        let buffer = SourceBuffer::test_pattern(100).unwrap();
        let (sink, _rx) = ChannelSink::channel(1);
        assert!(matches!(
            Notifier::new(Config::default(), buffer, sink),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_full_stream_stops_ticker() {
        let (mut notifier, mut rx) = notifier(Config::default());
        notifier.handle_event(PeerEvent::ConnectionOpened { connection: PEER });
        assert_eq!(subscribe(&mut notifier, true), SubscriptionChange::Activated);
        assert!(notifier.is_ticking());

        for _ in 0..3 {
            notifier.on_tick();
        }
        assert!(!notifier.is_ticking());
        assert!(notifier.is_subscribed());
        assert_eq!(notifier.session().packets_sent(), 3);

        let chunks = drain(&mut rx);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![244, 244, 22]);

        let stats = notifier.stats();
        assert_eq!(stats.read().sessions_completed, 1);
        assert_eq!(stats.read().bytes_sent, 510);
    }

    #[tokio::test]
    async fn test_resubscribe_restarts_from_beginning() {
        let (mut notifier, mut rx) = notifier(Config::default());
        notifier.handle_event(PeerEvent::ConnectionOpened { connection: PEER });
        subscribe(&mut notifier, true);

        notifier.on_tick();
        notifier.on_tick();
        assert_eq!(notifier.session().bytes_sent(), 488);

        assert_eq!(subscribe(&mut notifier, false), SubscriptionChange::Deactivated);
        assert_eq!(notifier.session().bytes_sent(), 0);
        assert_eq!(notifier.on_tick(), TickOutcome::Idle);

        subscribe(&mut notifier, true);
        assert_eq!(notifier.session().bytes_sent(), 0);
        assert_eq!(notifier.session().packets_sent(), 0);

        for _ in 0..3 {
            notifier.on_tick();
        }

        let chunks = drain(&mut rx);
        assert_eq!(chunks.len(), 5);
        let second_run: Vec<u8> = chunks[2..].iter().flat_map(|c| c.iter().copied()).collect();
        let buffer = SourceBuffer::test_pattern(510).unwrap();
        assert_eq!(second_run.as_slice(), buffer.as_bytes().as_ref());
        assert_eq!(notifier.stats().read().sessions_aborted, 1);
    }

    #[tokio::test]
    async fn test_disconnect_invalidates_peer() {
        let (mut notifier, mut rx) = notifier(Config::default());
        notifier.handle_event(PeerEvent::ConnectionOpened { connection: PEER });
        subscribe(&mut notifier, true);
        notifier.on_tick();

        let change = notifier.handle_event(PeerEvent::ConnectionClosed {
            connection: PEER,
            reason: 0x13,
        });
        assert_eq!(change, SubscriptionChange::Deactivated);
        assert!(notifier.peer().is_none());
        assert!(!notifier.is_ticking());
        assert_eq!(notifier.session().bytes_sent(), 0);

        assert_eq!(notifier.on_tick(), TickOutcome::Idle);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_foreign_connections() {
        let (mut notifier, _rx) = notifier(Config::default());
        notifier.handle_event(PeerEvent::ConnectionOpened { connection: PEER });
        notifier.handle_event(PeerEvent::ConnectionOpened {
            connection: ConnectionHandle(2),
        });
        assert_eq!(notifier.peer(), Some(PEER));

        let change = notifier.handle_event(PeerEvent::CharacteristicStatus {
            connection: ConnectionHandle(2),
            characteristic: notifier.config().characteristic,
            status_flags: StatusFlags::ClientConfig,
            client_config_flags: client_config::NOTIFICATION,
        });
        assert_eq!(change, SubscriptionChange::Unchanged);
        assert!(!notifier.is_subscribed());
    }

    #[tokio::test]
    async fn test_subscription_without_peer_skips_ticks() {
        let (mut notifier, mut rx) = notifier(Config::default());
        notifier.on_subscription_changed(true);

        assert_eq!(notifier.on_tick(), TickOutcome::Skipped);
        assert_eq!(notifier.session().bytes_sent(), 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(notifier.stats().read().skipped_ticks, 1);
    }

    #[tokio::test]
    async fn test_full_queue_retries_same_chunk() {
        let config = Config::default();
        let buffer = SourceBuffer::test_pattern(510).unwrap();
        let (sink, mut rx) = ChannelSink::channel(1);
        let mut notifier = Notifier::new(config, buffer.clone(), sink).unwrap();

        notifier.handle_event(PeerEvent::ConnectionOpened { connection: PEER });
        notifier.on_subscription_changed(true);

        assert!(matches!(notifier.on_tick(), TickOutcome::Sent { .. }));
        assert!(matches!(
            notifier.on_tick(),
            TickOutcome::Rejected {
                consecutive_failures: 1,
                threshold_reached: false,
            }
        ));
        assert_eq!(notifier.session().bytes_sent(), 244);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.data.as_ref(), &buffer.as_bytes()[..244]);

        assert!(matches!(
            notifier.on_tick(),
            TickOutcome::Sent { seq: 1, .. }
        ));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.data.as_ref(), &buffer.as_bytes()[244..488]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_paces_by_ticker() {
        let config = Config::default();
        let buffer = SourceBuffer::test_pattern(510).unwrap();
        let (sink, mut rx) = ChannelSink::channel(16);
        let notifier = Notifier::new(config.clone(), buffer.clone(), sink).unwrap();
        let stats = notifier.stats();

        let (event_tx, event_rx) = mpsc::channel(8);
        let handle = tokio::spawn(notifier.run(event_rx));

        event_tx
            .send(PeerEvent::ConnectionOpened { connection: PEER })
            .await
            .unwrap();
        event_tx
            .send(PeerEvent::subscription(PEER, config.characteristic, true))
            .await
            .unwrap();

        let start = tokio::time::Instant::now();
        let mut received = Vec::new();
        for _ in 0..3 {
            let n = rx.recv().await.unwrap();
            assert_eq!(n.peer, PEER);
            received.extend_from_slice(&n.data);
        }
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(received.as_slice(), buffer.as_bytes().as_ref());

        // 완료 후 더 이상 알림 없음
        let extra = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(extra.is_err());

        drop(event_tx);
        let final_stats = handle.await.unwrap().unwrap();
        assert_eq!(final_stats.notifications_sent, 3);
        assert_eq!(stats.read().sessions_completed, 1);
    }
}
