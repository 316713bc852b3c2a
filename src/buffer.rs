//! 소스 버퍼
//!
//! 시작 시 한 번 생성되고 이후 변경되지 않는 바이트 시퀀스.
//! `Bytes` 기반이라 이미터는 복사 없이 참조 카운트로 공유한다.

use std::path::Path;

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, info};

use crate::{Error, Result, MAX_TOTAL_LENGTH};

/// 불변 소스 버퍼
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    content: Bytes,
}

impl SourceBuffer {
    /// 바이트에서 생성
    pub fn from_bytes(content: impl Into<Bytes>) -> Result<Self> {
        let content = content.into();
        if content.is_empty() {
            return Err(Error::Configuration("소스 버퍼가 비어 있음".into()));
        }
        if content.len() > MAX_TOTAL_LENGTH {
            return Err(Error::Configuration(format!(
                "소스 버퍼 {} bytes 가 최대값 {} 초과",
                content.len(),
                MAX_TOTAL_LENGTH
            )));
        }

        let buffer = Self { content };
        buffer.log_contents();
        Ok(buffer)
    }

    /// 테스트 패턴 생성
    ///
    /// 앞 절반은 0부터 증가, 뒤 절반은 절반 값부터 1까지 감소한다.
    /// 510 bytes 기준: `0..=254` 다음 `255..=1`.
    pub fn test_pattern(len: usize) -> Result<Self> {
        let half = len / 2;
        let content: Vec<u8> = (0..len)
            .map(|idx| {
                if idx < half {
                    idx as u8
                } else {
                    (len - idx) as u8
                }
            })
            .collect();

        Self::from_bytes(content)
    }

    /// 난수 버퍼 생성
    pub fn random(len: usize) -> Result<Self> {
        let mut content = vec![0u8; len];
        rand::thread_rng().fill(&mut content[..]);
        Self::from_bytes(content)
    }

    /// 파일에서 로드
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        Self::from_bytes(content)
    }

    /// 전체 길이
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// `[offset, offset + len)` 구간 (복사 없음)
    ///
    /// 범위를 벗어나면 `None`.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Bytes> {
        let end = offset.checked_add(len)?;
        if end > self.content.len() {
            return None;
        }
        Some(self.content.slice(offset..end))
    }

    /// 전체 내용
    pub fn as_bytes(&self) -> &Bytes {
        &self.content
    }

    /// CRC32 체크섬
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.content)
    }

    fn log_contents(&self) {
        info!(
            "Total data size: {} bytes (crc32={:08X})",
            self.content.len(),
            self.checksum()
        );
        debug!("Data collection: {:?}", self.content.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pattern_matches_reference_layout() {
        let buffer = SourceBuffer::test_pattern(510).unwrap();
        let data = buffer.as_bytes();

        assert_eq!(data.len(), 510);
        assert_eq!(data[0], 0);
        assert_eq!(data[254], 254);
        assert_eq!(data[255], 255);
        assert_eq!(data[256], 254);
        assert_eq!(data[509], 1);
    }

    #[test]
    fn test_slice_is_bounded() {
        let buffer = SourceBuffer::test_pattern(510).unwrap();

        let tail = buffer.slice(488, 22).unwrap();
        assert_eq!(tail.len(), 22);
        assert_eq!(tail.as_ref(), &buffer.as_bytes()[488..510]);

        assert!(buffer.slice(500, 11).is_none());
        assert!(buffer.slice(usize::MAX, 2).is_none());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(matches!(
            SourceBuffer::from_bytes(Vec::new()),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            SourceBuffer::from_bytes(vec![0u8; MAX_TOTAL_LENGTH + 1]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 300]).unwrap();
        file.flush().unwrap();

        let buffer = SourceBuffer::from_file(file.path()).unwrap();
        assert_eq!(buffer.len(), 300);
        assert_eq!(buffer.checksum(), crc32fast::hash(&[7u8; 300]));
    }

    #[test]
    fn test_random_length() {
        let buffer = SourceBuffer::random(1000).unwrap();
        assert_eq!(buffer.len(), 1000);
    }
}
