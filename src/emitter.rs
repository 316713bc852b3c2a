//! 청크 이미터
//!
//! 틱마다 세션 진행 상황으로 다음 청크의 오프셋/길이를 계산하고
//! 전송 싱크로 한 번 보낸다. 성공해야만 진행 상황이 전진한다.

use tracing::{debug, error, info, warn};

use crate::buffer::SourceBuffer;
use crate::chunk::{next_chunk_len, Chunk};
use crate::event::ConnectionHandle;
use crate::session::StreamSession;
use crate::sink::TransportSink;
use crate::Error;

/// 틱 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 청크 전송 성공
    Sent {
        seq: u32,
        len: usize,
        bytes_sent: usize,
        complete: bool,
    },

    /// 세션 비활성 또는 이미 완료 (아무것도 하지 않음)
    Idle,

    /// 피어 없음 (상태 변경 없이 건너뜀)
    Skipped,

    /// 전송 거부 (다음 틱에 같은 청크 재시도)
    ///
    /// `threshold_reached` 는 연속 실패가 임계값에 막 도달해 error 진단을
    /// 남긴 틱에서만 참이다.
    Rejected {
        consecutive_failures: u32,
        threshold_reached: bool,
    },
}

/// 청크 이미터
#[derive(Debug, Clone)]
pub struct ChunkEmitter {
    buffer: SourceBuffer,
    max_packet_size: usize,
    max_consecutive_failures: u32,
}

impl ChunkEmitter {
    pub fn new(buffer: SourceBuffer, max_packet_size: usize, max_consecutive_failures: u32) -> Self {
        Self {
            buffer,
            max_packet_size,
            max_consecutive_failures,
        }
    }

    pub fn total_length(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    /// 현재 세션 기준 다음 청크 (완료/비활성이면 `None`)
    pub fn next_chunk(&self, session: &StreamSession) -> Option<Chunk> {
        if !session.is_active() {
            return None;
        }

        let offset = session.bytes_sent();
        let len = next_chunk_len(offset, self.total_length(), self.max_packet_size);
        if len == 0 {
            return None;
        }

        let data = self.buffer.slice(offset, len)?;
        Some(Chunk {
            seq: session.packets_sent(),
            offset,
            data,
        })
    }

    /// 틱 처리 (최대 한 번 전송)
    pub fn on_tick<S: TransportSink + ?Sized>(
        &self,
        session: &mut StreamSession,
        peer: Option<ConnectionHandle>,
        sink: &mut S,
    ) -> TickOutcome {
        let chunk = match self.next_chunk(session) {
            Some(chunk) => chunk,
            None => return TickOutcome::Idle,
        };

        let peer = match peer {
            Some(peer) => peer,
            None => {
                debug!("연결된 피어 없음: 틱 건너뜀");
                return TickOutcome::Skipped;
            }
        };

        let len = chunk.len();
        debug!("Packet size to be sent now: {}", len);

        match sink.send(peer, chunk.data) {
            Ok(()) => {
                session.record_sent(len);
                let bytes_sent = session.bytes_sent();
                let complete = session.is_complete(self.total_length());

                debug!("Sent bytes = {}", bytes_sent);
                if complete {
                    info!(
                        "{} 전송 완료: {} bytes, {} packets",
                        peer,
                        bytes_sent,
                        session.packets_sent()
                    );
                }

                TickOutcome::Sent {
                    seq: chunk.seq,
                    len,
                    bytes_sent,
                    complete,
                }
            }
            Err(Error::TransportUnavailable) => {
                debug!("{} 전송 불가: 틱 건너뜀", peer);
                TickOutcome::Skipped
            }
            Err(e) => {
                let failures = session.record_failure();
                let threshold_reached = failures == self.max_consecutive_failures;
                if threshold_reached {
                    error!(
                        "{} 청크 #{} (offset {}) 연속 {}회 전송 실패, 계속 재시도: {}",
                        peer, chunk.seq, chunk.offset, failures, e
                    );
                } else {
                    warn!(
                        "{} 청크 #{} 전송 실패 ({}회째): {}",
                        peer, chunk.seq, failures, e
                    );
                }
                TickOutcome::Rejected {
                    consecutive_failures: failures,
                    threshold_reached,
                }
            }
        }
    }
}
