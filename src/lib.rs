//! # NotiStream
//!
//! 구독 기반 주기적 청크 알림 스트리머
//!
//! ## 핵심 특징
//! - **청크 분할**: 최대 페이로드보다 큰 버퍼를 고정 크기 청크로 나눠 전송
//! - **구독 게이트**: 피어가 알림을 켠 동안에만 전송, 켤 때마다 처음부터
//! - **주기 전송**: 재시작 가능한 티커로 틱당 최대 한 청크
//! - **실패 내성**: 거부된 청크는 다음 틱에 재시도, 연속 실패는 진단 로그
//! - **단일 태스크**: 세션 상태는 잠금 없이 한 루프에서만 변경

pub mod buffer;
pub mod chunk;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod message;
pub mod notifier;
pub mod receiver;
pub mod session;
pub mod sink;
pub mod stats;
pub mod ticker;
pub mod tracker;

pub use buffer::SourceBuffer;
pub use chunk::{Chunk, ChunkSeq};
pub use config::Config;
pub use emitter::{ChunkEmitter, TickOutcome};
pub use error::{Error, Result};
pub use event::{CharacteristicHandle, ConnectionHandle, PeerEvent, StatusFlags};
pub use message::Message;
pub use notifier::Notifier;
pub use receiver::{CollectState, NotificationCollector};
pub use session::StreamSession;
pub use sink::{ChannelSink, TransportSink, UdpSink};
pub use stats::StreamStats;
pub use ticker::Ticker;
pub use tracker::{SubscriptionChange, SubscriptionTracker};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 기본 소스 버퍼 길이 (바이트)
pub const DEFAULT_TOTAL_LENGTH: usize = 510;

/// 기본 최대 패킷 크기 (바이트)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 244;

/// 기본 틱 주기 (밀리초)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// 기본 연속 실패 진단 임계값
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// 기본 감시 characteristic 핸들
pub const DEFAULT_CHARACTERISTIC: CharacteristicHandle = 0x0017;

/// 소스 버퍼 최대 길이 (16비트 오프셋)
pub const MAX_TOTAL_LENGTH: usize = u16::MAX as usize;

/// 최대 패킷 크기 상한 (연결 수락 메시지의 16비트 필드)
pub const MAX_PACKET_SIZE: usize = u16::MAX as usize;

/// 매직 넘버 (패킷 식별용)
pub const MAGIC_NUMBER: u32 = 0x4E535452; // "NSTR"
