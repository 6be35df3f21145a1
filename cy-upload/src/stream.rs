use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;

use crate::{UploadError, UploadResult};

/// Lazily produced upload body: zero-filled chunks followed by a trailing block.
///
/// The concatenated output is exactly `total_size` bytes and ends with the
/// trailer. A single zero chunk is allocated up front and handed out by
/// reference count, so memory stays at one chunk whatever the total size.
/// The stream is single-use; build a new one for every transfer.
#[derive(Debug)]
pub struct PayloadStream {
    zero_chunk: Bytes,
    zero_remaining: u64,
    trailer: Option<Bytes>,
    total_size: u64,
    emitted: u64,
}

impl PayloadStream {
    /// Fails before producing anything when the trailer does not fit.
    pub fn new(total_size: u64, trailer: Bytes, chunk_size: usize) -> UploadResult<Self> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidChunkSize);
        }
        let trailer_len = trailer.len() as u64;
        if trailer_len > total_size {
            return Err(UploadError::malformed(format!(
                "trailer of {} bytes exceeds total size {}",
                trailer_len, total_size
            )));
        }

        let zero_remaining = total_size - trailer_len;
        let resident = zero_remaining.min(chunk_size as u64) as usize;

        Ok(Self {
            zero_chunk: Bytes::from(vec![0u8; resident]),
            zero_remaining,
            trailer: (!trailer.is_empty()).then_some(trailer),
            total_size,
            emitted: 0,
        })
    }

    /// Produce the next chunk, or None once the payload is exhausted.
    pub fn next_chunk(&mut self) -> Option<Bytes> {
        let chunk = if self.zero_remaining > 0 {
            let len = self.zero_remaining.min(self.zero_chunk.len() as u64) as usize;
            self.zero_remaining -= len as u64;
            self.zero_chunk.slice(..len)
        } else {
            self.trailer.take()?
        };
        self.emitted += chunk.len() as u64;
        Some(chunk)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes handed out so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Bytes still to be handed out
    pub fn remaining(&self) -> u64 {
        self.total_size - self.emitted
    }

    pub fn is_exhausted(&self) -> bool {
        self.zero_remaining == 0 && self.trailer.is_none()
    }

    /// Zero bytes held in memory by this stream
    pub fn resident_zero_bytes(&self) -> usize {
        self.zero_chunk.len()
    }
}

impl Stream for PayloadStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().next_chunk().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunk = self.zero_chunk.len().max(1) as u64;
        let zero_chunks = self.zero_remaining.div_ceil(chunk) as usize;
        let left = zero_chunks + usize::from(self.trailer.is_some());
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(mut stream: PayloadStream) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next_chunk() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_zero_chunks_then_trailer() {
        let stream = PayloadStream::new(16 + 4, Bytes::from_static(b"TAIL"), 8).unwrap();
        let chunks = drain(stream);

        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![8, 8, 4]);
        assert!(chunks[0].iter().all(|b| *b == 0));
        assert_eq!(chunks[2], Bytes::from_static(b"TAIL"));
    }

    #[test]
    fn test_partial_last_zero_chunk() {
        let stream = PayloadStream::new(10 + 3, Bytes::from_static(b"abc"), 4).unwrap();
        let lens: Vec<usize> = drain(stream).iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![4, 4, 2, 3]);
    }

    #[test]
    fn test_trailer_only_and_empty() {
        let only = drain(PayloadStream::new(3, Bytes::from_static(b"xyz"), 4).unwrap());
        assert_eq!(only, vec![Bytes::from_static(b"xyz")]);

        let empty = PayloadStream::new(0, Bytes::new(), 4).unwrap();
        assert!(empty.is_exhausted());
        assert!(drain(empty).is_empty());
    }

    #[test]
    fn test_trailer_larger_than_total_fails_fast() {
        let err = PayloadStream::new(3, Bytes::from_static(b"toolong"), 4).unwrap_err();
        assert!(matches!(err, UploadError::MalformedStream { .. }));
        assert!(err.to_string().contains("trailer of 7 bytes exceeds total size 3"));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            PayloadStream::new(3, Bytes::new(), 0),
            Err(UploadError::InvalidChunkSize)
        ));
    }

    #[test]
    fn test_memory_bounded_by_one_chunk() {
        // Every zero chunk is a view of the same buffer, never a new allocation.
        let mut stream = PayloadStream::new(512 * 1024 * 1024, Bytes::from_static(b"T"), 64 * 1024).unwrap();
        let first = stream.next_chunk().unwrap();
        assert_eq!(first.len(), 64 * 1024);

        for _ in 0..100 {
            let chunk = stream.next_chunk().unwrap();
            assert_eq!(chunk.len(), 64 * 1024);
            assert_eq!(chunk.as_ptr(), first.as_ptr());
        }
        assert_eq!(stream.emitted(), 101 * 64 * 1024);
    }

    #[test]
    fn test_short_last_zero_chunk_shares_the_buffer() {
        let mut stream = PayloadStream::new(10 + 1, Bytes::from_static(b"T"), 4).unwrap();
        let first = stream.next_chunk().unwrap();
        stream.next_chunk().unwrap();
        let short = stream.next_chunk().unwrap();
        assert_eq!(short.len(), 2);
        assert_eq!(short.as_ptr(), first.as_ptr());
        assert_eq!(stream.remaining(), 1);
    }

    #[test]
    fn test_small_zero_prefix_allocates_only_what_it_needs() {
        let stream = PayloadStream::new(10, Bytes::from_static(b"abcdefgh"), 64 * 1024).unwrap();
        assert_eq!(stream.resident_zero_bytes(), 2);
    }

    #[test]
    fn test_size_hint_counts_remaining_chunks() {
        let mut stream = PayloadStream::new(20, Bytes::from_static(b"TAIL"), 8).unwrap();
        assert_eq!(Stream::size_hint(&stream), (3, Some(3)));
        stream.next_chunk();
        assert_eq!(Stream::size_hint(&stream), (2, Some(2)));
    }

    #[tokio::test]
    async fn test_polls_as_stream() {
        use futures_util::StreamExt;

        let stream = PayloadStream::new(9, Bytes::from_static(b"!"), 4).unwrap();
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 9);
        assert_eq!(chunks.last().unwrap(), &Bytes::from_static(b"!"));
    }

    proptest! {
        #[test]
        fn prop_output_is_exact_and_ends_with_trailer(
            zero_len in 0u64..20_000,
            trailer in proptest::collection::vec(any::<u8>(), 0..64),
            chunk_size in 1usize..4096,
        ) {
            let total = zero_len + trailer.len() as u64;
            let stream = PayloadStream::new(total, Bytes::from(trailer.clone()), chunk_size).unwrap();
            let bytes: Vec<u8> = drain(stream).into_iter().flat_map(|c| c.to_vec()).collect();

            prop_assert_eq!(bytes.len() as u64, total);
            prop_assert!(bytes[..zero_len as usize].iter().all(|b| *b == 0));
            prop_assert_eq!(&bytes[zero_len as usize..], trailer.as_slice());
        }
    }
}
