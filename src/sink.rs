//! 전송 싱크
//!
//! 코어가 의존하는 유일한 "피어로 보내기" 연산. 결과는 동기적으로
//! 성공/실패만 돌려주며 재전송/분할은 하지 않는다.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::event::{CharacteristicHandle, ConnectionHandle};
use crate::message::{Message, NotificationMessage, MAX_DATAGRAM_SIZE};
use crate::{Error, Result};

/// 전송 싱크
///
/// 에러 규약:
/// - 피어가 없거나 핸들이 무효: [`Error::TransportUnavailable`]
/// - 전송 계층 거부 (버퍼 가득 참, 혼잡 등): [`Error::SendRejected`]
pub trait TransportSink {
    fn send(&mut self, peer: ConnectionHandle, chunk: Bytes) -> Result<()>;
}

impl<T: TransportSink + ?Sized> TransportSink for Box<T> {
    fn send(&mut self, peer: ConnectionHandle, chunk: Bytes) -> Result<()> {
        (**self).send(peer, chunk)
    }
}

/// 프로세스 내부 알림 (채널 싱크 출력)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub peer: ConnectionHandle,
    pub data: Bytes,
}

/// 제한 용량 mpsc 채널 기반 싱크
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    /// 싱크와 수신측 채널 생성
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl TransportSink for ChannelSink {
    fn send(&mut self, peer: ConnectionHandle, chunk: Bytes) -> Result<()> {
        self.tx
            .try_send(Notification { peer, data: chunk })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::SendRejected {
                    reason: "notification queue full".into(),
                },
                mpsc::error::TrySendError::Closed(_) => Error::TransportUnavailable,
            })
    }
}

/// 연결 핸들 → 데이터그램 주소 테이블 (제어 루프와 공유)
pub type PeerTable = Arc<DashMap<ConnectionHandle, SocketAddr>>;

/// UDP 데이터그램 싱크
///
/// 각 청크를 [`Message::Notification`] 으로 감싸 논블로킹 전송한다.
pub struct UdpSink {
    socket: Arc<UdpSocket>,
    peers: PeerTable,
    characteristic: CharacteristicHandle,
}

impl UdpSink {
    pub fn new(socket: Arc<UdpSocket>, peers: PeerTable, characteristic: CharacteristicHandle) -> Self {
        Self {
            socket,
            peers,
            characteristic,
        }
    }

    /// 최대 크기 청크의 알림 프레임이 데이터그램 하나에 들어가는지 확인
    ///
    /// 들어가지 않으면 모든 전송이 거부되므로 시작 단계에서 설정 오류로 처리한다.
    pub fn check_packet_size(max_packet_size: usize) -> Result<()> {
        let frame_len = Message::notification_frame_len(max_packet_size)?;
        if frame_len > MAX_DATAGRAM_SIZE {
            return Err(Error::Configuration(format!(
                "max_packet_size {} 의 알림 프레임 {} bytes 가 UDP 최대 {} bytes 초과",
                max_packet_size, frame_len, MAX_DATAGRAM_SIZE
            )));
        }
        Ok(())
    }
}

impl TransportSink for UdpSink {
    fn send(&mut self, peer: ConnectionHandle, chunk: Bytes) -> Result<()> {
        let addr = match self.peers.get(&peer) {
            Some(entry) => *entry.value(),
            None => return Err(Error::TransportUnavailable),
        };

        let frame = Message::Notification(NotificationMessage {
            connection: peer,
            characteristic: self.characteristic,
            payload: chunk,
        })
        .to_bytes()?;

        match self.socket.try_send_to(&frame, addr) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(Error::SendRejected {
                reason: "socket send buffer full".into(),
            }),
            Err(e) => Err(Error::SendRejected {
                reason: e.to_string(),
            }),
        }
    }
}
