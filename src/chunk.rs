//! 청크 정의
//!
//! - Chunk: 알림 한 번에 전달되는 소스 버퍼의 연속 구간
//! - 길이 계산은 항상 "남은 바이트"를 기준으로 한다

use bytes::Bytes;

/// 청크 순번 (세션 내 0부터)
pub type ChunkSeq = u32;

/// 청크 (알림 전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 세션 내 순번
    pub seq: ChunkSeq,

    /// 소스 버퍼 내 오프셋
    pub offset: usize,

    /// 실제 데이터 (소스 버퍼를 참조)
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 이 청크 다음의 오프셋
    pub fn end(&self) -> usize {
        self.offset + self.data.len()
    }
}

/// 다음 청크 길이 계산
///
/// 남은 바이트가 `max_packet_size` 이상이면 정확히 `max_packet_size`,
/// 아니면 남은 바이트 전부(마지막 청크). 전송 완료 시 0.
pub fn next_chunk_len(bytes_sent: usize, total_length: usize, max_packet_size: usize) -> usize {
    let remaining = total_length.saturating_sub(bytes_sent);
    if remaining >= max_packet_size {
        max_packet_size
    } else {
        remaining
    }
}

/// 전체 전송에 필요한 청크 수 (올림)
pub fn chunk_count(total_length: usize, max_packet_size: usize) -> usize {
    if max_packet_size == 0 {
        return 0;
    }
    (total_length + max_packet_size - 1) / max_packet_size
}

/// 전체 청크 배치 `(offset, len)` 목록
///
/// 이미터가 틱마다 밟게 될 순서와 동일하다.
pub fn chunk_layout(total_length: usize, max_packet_size: usize) -> Vec<(usize, usize)> {
    let mut layout = Vec::with_capacity(chunk_count(total_length, max_packet_size));
    if max_packet_size == 0 {
        return layout;
    }

    let mut offset = 0;
    while offset < total_length {
        let len = next_chunk_len(offset, total_length, max_packet_size);
        layout.push((offset, len));
        offset += len;
    }
    layout
}
