//! 수신자 (피어측)
//!
//! - 알림을 도착 순서대로 이어 붙여 소스 버퍼 복원
//! - 청크 길이 규칙 검증: 마지막을 제외한 모든 청크는 최대 패킷 크기
//! - 재구독 시 리셋

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::{Error, Result};

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectState {
    /// 더 받을 청크가 있음
    InProgress { received: usize, remaining: usize },

    /// 전체 수신 완료
    Complete,
}

/// 알림 수집기
#[derive(Debug)]
pub struct NotificationCollector {
    /// 예상 전체 길이
    expected_len: usize,

    /// 최대 패킷 크기
    max_packet_size: usize,

    /// 수신 데이터
    data: BytesMut,

    /// 수신한 청크 수
    chunks: u32,
}

impl NotificationCollector {
    pub fn new(expected_len: usize, max_packet_size: usize) -> Self {
        Self {
            expected_len,
            max_packet_size,
            data: BytesMut::with_capacity(expected_len),
            chunks: 0,
        }
    }

    /// 청크 추가
    pub fn push(&mut self, chunk: &[u8]) -> Result<CollectState> {
        let remaining = self.remaining();

        // 완료 후 도착한 청크는 길이와 상관없이 초과
        if self.is_complete() || chunk.len() > remaining {
            return Err(Error::ChunkOverflow {
                expected: self.expected_len,
                got: self.data.len() + chunk.len(),
            });
        }

        let expected_chunk = remaining.min(self.max_packet_size);
        if chunk.len() != expected_chunk {
            return Err(Error::UnexpectedChunkLength {
                expected: expected_chunk,
                got: chunk.len(),
            });
        }

        self.data.extend_from_slice(chunk);
        self.chunks += 1;
        debug!(
            "청크 #{} 수신: {} bytes, 누적 {}/{}",
            self.chunks,
            chunk.len(),
            self.data.len(),
            self.expected_len
        );

        Ok(self.state())
    }

    pub fn state(&self) -> CollectState {
        if self.is_complete() {
            CollectState::Complete
        } else {
            CollectState::InProgress {
                received: self.data.len(),
                remaining: self.remaining(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.expected_len
    }

    pub fn remaining(&self) -> usize {
        self.expected_len.saturating_sub(self.data.len())
    }

    pub fn chunks_received(&self) -> u32 {
        self.chunks
    }

    pub fn received(&self) -> &[u8] {
        &self.data
    }

    /// 수신 데이터 CRC32
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.data)
    }

    /// 새 구독을 위해 초기화
    pub fn reset(&mut self) {
        self.data.clear();
        self.chunks = 0;
    }

    /// 수신 데이터 추출
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}
