//! 에러 타입 정의

use thiserror::Error;

/// NotiStream 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    /// 연결된 피어 없음 (틱을 건너뜀)
    #[error("전송 불가: 연결된 피어 없음")]
    TransportUnavailable,

    /// 전송 계층이 알림을 거부함 (버퍼 가득 참, 링크 혼잡 등)
    #[error("전송 거부: {reason}")]
    SendRejected { reason: String },

    /// 시작 시점에 발견되는 설정 오류 (치명적)
    #[error("설정 오류: {0}")]
    Configuration(String),

    #[error("유효하지 않은 매직 넘버: expected {expected:08X}, got {got:08X}")]
    InvalidMagicNumber { expected: u32, got: u32 },

    #[error("유효하지 않은 프로토콜 버전: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("메시지 타입 불일치: expected {expected}, got {got}")]
    MessageTypeMismatch { expected: String, got: String },

    #[error("메시지 길이 부족: need {need}, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("청크 오버플로우: 예상 크기 {expected} 초과 ({got})")]
    ChunkOverflow { expected: usize, got: usize },

    #[error("예상하지 못한 청크 길이: expected {expected}, got {got}")]
    UnexpectedChunkLength { expected: usize, got: usize },

    #[error("채널 에러")]
    ChannelError,

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    /// 다음 틱에서 재시도 가능한 에러인지 여부
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportUnavailable | Error::SendRejected { .. })
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
