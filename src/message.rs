//! 루프백 와이어 메시지 정의
//!
//! 무선 스택 대신 UDP 위에서 피어를 흉내내기 위한 최소 메시지 집합.
//! 헤더와 제어 메시지는 bincode, 알림 페이로드는 원본 청크 바이트 그대로.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::event::{CharacteristicHandle, ConnectionHandle};
use crate::{Error, Result, MAGIC_NUMBER, PROTOCOL_VERSION};

/// 알림 메시지 고정 필드 크기: connection(1) + characteristic(2)
const NOTIFICATION_PREFIX_LEN: usize = 3;

/// UDP 데이터그램 최대 페이로드 (IPv4: 65535 - IP 헤더 20 - UDP 헤더 8)
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// 연결 요청 (클라이언트 → 서버)
    Connect = 1,

    /// 연결 수락 (서버 → 클라이언트)
    ConnectAck = 2,

    /// CCCD 쓰기 (구독/해제)
    WriteClientConfig = 3,

    /// 청크 알림 (서버 → 클라이언트)
    Notification = 4,

    /// 연결 종료 (양방향)
    Disconnect = 5,
}

/// 메시지 헤더
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// 매직 넘버
    pub magic: u32,

    /// 프로토콜 버전
    pub version: u8,

    /// 메시지 타입
    pub msg_type: MessageType,

    /// 메시지 길이 (헤더 제외)
    pub payload_len: u32,
}

impl MessageHeader {
    pub fn new(msg_type: MessageType, payload_len: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            msg_type,
            payload_len,
        }
    }

    /// 헤더 파싱 + 검증, (헤더, 헤더 크기) 반환
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        let header: MessageHeader = bincode::deserialize(bytes)?;

        if header.magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagicNumber {
                expected: MAGIC_NUMBER,
                got: header.magic,
            });
        }
        if header.version != PROTOCOL_VERSION {
            return Err(Error::InvalidVersion {
                expected: PROTOCOL_VERSION,
                got: header.version,
            });
        }

        let header_size = bincode::serialized_size(&header)? as usize;
        let need = header_size + header.payload_len as usize;
        if bytes.len() < need {
            return Err(Error::Truncated {
                need,
                got: bytes.len(),
            });
        }

        Ok((header, header_size))
    }
}

/// 연결 수락 메시지
///
/// 스트림 파라미터를 함께 알려 클라이언트가 수신 검증에 사용한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectAckMessage {
    pub connection: ConnectionHandle,
    pub characteristic: CharacteristicHandle,
    pub total_length: u32,
    pub max_packet_size: u16,
    /// 소스 버퍼 CRC32
    pub checksum: u32,
}

/// CCCD 쓰기 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteClientConfigMessage {
    pub connection: ConnectionHandle,
    pub characteristic: CharacteristicHandle,
    pub flags: u16,
}

/// 알림 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub connection: ConnectionHandle,
    pub characteristic: CharacteristicHandle,
    pub payload: Bytes,
}

/// 연결 종료 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectMessage {
    pub connection: ConnectionHandle,
    pub reason: u8,
}

/// 와이어 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Connect,
    ConnectAck(ConnectAckMessage),
    WriteClientConfig(WriteClientConfigMessage),
    Notification(NotificationMessage),
    Disconnect(DisconnectMessage),
}

impl Message {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Connect => MessageType::Connect,
            Message::ConnectAck(_) => MessageType::ConnectAck,
            Message::WriteClientConfig(_) => MessageType::WriteClientConfig,
            Message::Notification(_) => MessageType::Notification,
            Message::Disconnect(_) => MessageType::Disconnect,
        }
    }

    /// 청크 `chunk_len` 바이트를 담은 알림 프레임의 전체 크기
    pub fn notification_frame_len(chunk_len: usize) -> Result<usize> {
        let header = MessageHeader::new(MessageType::Notification, 0);
        let header_size = bincode::serialized_size(&header)? as usize;
        Ok(header_size + NOTIFICATION_PREFIX_LEN + chunk_len)
    }

    /// 바이트로 직렬화 (헤더 + 페이로드)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Connect => Vec::new(),
            Message::ConnectAck(msg) => bincode::serialize(msg)?,
            Message::WriteClientConfig(msg) => bincode::serialize(msg)?,
            Message::Disconnect(msg) => bincode::serialize(msg)?,
            Message::Notification(msg) => {
                let mut buf = Vec::with_capacity(NOTIFICATION_PREFIX_LEN + msg.payload.len());
                buf.push(msg.connection.0);
                buf.extend_from_slice(&msg.characteristic.to_le_bytes());
                buf.extend_from_slice(&msg.payload);
                buf
            }
        };

        let header = MessageHeader::new(self.msg_type(), payload.len() as u32);
        let header_bytes = bincode::serialize(&header)?;

        let mut buf = Vec::with_capacity(header_bytes.len() + payload.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// 바이트에서 역직렬화
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, header_size) = MessageHeader::parse(bytes)?;
        let payload = &bytes[header_size..header_size + header.payload_len as usize];

        let message = match header.msg_type {
            MessageType::Connect => Message::Connect,
            MessageType::ConnectAck => Message::ConnectAck(bincode::deserialize(payload)?),
            MessageType::WriteClientConfig => {
                Message::WriteClientConfig(bincode::deserialize(payload)?)
            }
            MessageType::Disconnect => Message::Disconnect(bincode::deserialize(payload)?),
            MessageType::Notification => {
                if payload.len() < NOTIFICATION_PREFIX_LEN {
                    return Err(Error::Truncated {
                        need: NOTIFICATION_PREFIX_LEN,
                        got: payload.len(),
                    });
                }
                Message::Notification(NotificationMessage {
                    connection: ConnectionHandle(payload[0]),
                    characteristic: u16::from_le_bytes([payload[1], payload[2]]),
                    payload: Bytes::copy_from_slice(&payload[NOTIFICATION_PREFIX_LEN..]),
                })
            }
        };

        Ok(message)
    }
}
