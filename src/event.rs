//! 피어 이벤트 정의
//!
//! 주변 스택(무선 링크, GATT 서버)이 코어로 전달하는 이벤트들.
//! 코어는 이 이벤트만 보고 구독 상태와 피어 핸들을 관리한다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// GATT characteristic 핸들
pub type CharacteristicHandle = u16;

/// 연결 핸들 (연결된 동안만 유효)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle(pub u8);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// characteristic 상태 이벤트의 status flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusFlags {
    /// 클라이언트 설정(CCCD) 변경
    ClientConfig = 1,

    /// indication 확인 수신
    Confirmation = 2,
}

/// 클라이언트 설정(CCCD) 값
pub mod client_config {
    /// 알림/표시 비활성화
    pub const DISABLED: u16 = 0x0000;

    /// 알림 활성화
    pub const NOTIFICATION: u16 = 0x0001;

    /// 표시(indication) 활성화
    pub const INDICATION: u16 = 0x0002;
}

/// 주변 스택에서 들어오는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// 새 연결 수립
    ConnectionOpened { connection: ConnectionHandle },

    /// 연결 종료 (구독 해제와 동일하게 취급)
    ConnectionClosed {
        connection: ConnectionHandle,
        reason: u8,
    },

    /// characteristic 상태 변경
    CharacteristicStatus {
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        status_flags: StatusFlags,
        client_config_flags: u16,
    },
}

impl PeerEvent {
    /// 구독 변경 이벤트 생성 헬퍼
    pub fn subscription(
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        enabled: bool,
    ) -> Self {
        PeerEvent::CharacteristicStatus {
            connection,
            characteristic,
            status_flags: StatusFlags::ClientConfig,
            client_config_flags: if enabled {
                client_config::NOTIFICATION
            } else {
                client_config::DISABLED
            },
        }
    }

    /// 이벤트가 속한 연결
    pub fn connection(&self) -> ConnectionHandle {
        match self {
            PeerEvent::ConnectionOpened { connection }
            | PeerEvent::ConnectionClosed { connection, .. }
            | PeerEvent::CharacteristicStatus { connection, .. } => *connection,
        }
    }
}
