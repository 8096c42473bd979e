//! # Resynchronizing Stream Framer
//!
//! Turns an unbounded incoming byte stream (serial reads or UDP payloads)
//! into a sequence of validated CRSF frames, discarding corruption.
//!
//! Radio links are lossy: bytes get dropped and flipped mid-frame. The
//! framer recovers by scanning forward one byte at a time after a failed
//! decode, so a corrupted frame never costs more than its own bytes.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use tracing::warn;

use super::codec;
use super::protocol::CrsfFrame;
use crate::error::FrameError;

/// Default cap on the retained buffer before a forced resync
pub const DEFAULT_MAX_BUFFER: usize = 1024;

/// Counters kept by a [`StreamFramer`] across its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FramerStats {
    /// Valid frames emitted
    pub frames: u64,
    /// Bytes consumed by valid frames
    pub frame_bytes: u64,
    /// Frames rejected by the CRC check
    pub crc_errors: u64,
    /// Garbage bytes skipped while scanning for sync
    pub skipped_bytes: u64,
    /// Times the buffer overflowed and was cleared
    pub resync_overflows: u64,
}

/// Stateful reader that frames one live byte stream.
///
/// The buffer is owned exclusively by this instance and is never shared;
/// restarting the stream means discarding the framer and creating a new
/// one.
#[derive(Debug)]
pub struct StreamFramer {
    buffer: BytesMut,
    /// Frames salvaged while handling an over-cap buffer, handed out by
    /// [`next_frame`] before any new extraction
    ///
    /// [`next_frame`]: StreamFramer::next_frame
    pending: VecDeque<CrsfFrame>,
    max_buffer: usize,
    stats: FramerStats,
}

impl StreamFramer {
    /// Framer with the default buffer cap
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    /// Framer with a custom buffer cap.
    ///
    /// The cap is the bounded-backpressure limit: if it is exceeded
    /// without a decodable frame, the whole buffer is dropped and the
    /// stream continues from the next byte that arrives.
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_buffer.min(4096)),
            pending: VecDeque::new(),
            max_buffer,
            stats: FramerStats::default(),
        }
    }

    /// Append a chunk of received bytes to the buffer.
    ///
    /// If the buffer grows past the cap, complete frames are extracted
    /// on the spot and queued for [`next_frame`]; a large burst of valid
    /// frames never loses data. Only when the buffer still exceeds the
    /// cap afterwards, with no decodable frame in it, is the window
    /// discarded: a non-fatal resync-overflow, counted and logged, after
    /// which the stream continues.
    ///
    /// [`next_frame`]: StreamFramer::next_frame
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() <= self.max_buffer {
            return;
        }

        // Salvage everything decodable before considering a clear
        while let Some(frame) = self.extract() {
            self.pending.push_back(frame);
        }

        if self.buffer.len() > self.max_buffer {
            warn!(
                buffered = self.buffer.len(),
                cap = self.max_buffer,
                "framer buffer overflow without a valid frame, resyncing"
            );
            self.stats.skipped_bytes += self.buffer.len() as u64;
            self.buffer.clear();
            self.stats.resync_overflows += 1;
        }
    }

    /// Try to produce the next validated frame.
    ///
    /// Frames salvaged during an overflow drain come first, then the
    /// buffer is decoded at offset 0 in a loop:
    /// - success: emit the frame and advance past it
    /// - `Incomplete`: return `None`, wait for more bytes
    /// - any corruption: advance one byte and retry (resynchronization)
    ///
    /// `None` means "no complete frame buffered right now", never
    /// end-of-stream.
    pub fn next_frame(&mut self) -> Option<CrsfFrame> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(frame);
        }
        self.extract()
    }

    /// Scan the buffer for the next decodable frame
    fn extract(&mut self) -> Option<CrsfFrame> {
        loop {
            match codec::decode(&self.buffer) {
                Ok((frame, consumed)) => {
                    self.buffer.advance(consumed);
                    self.stats.frames += 1;
                    self.stats.frame_bytes += consumed as u64;
                    return Some(frame);
                }
                Err(FrameError::Incomplete) => return None,
                Err(FrameError::CrcMismatch { .. }) => {
                    self.stats.crc_errors += 1;
                    self.stats.skipped_bytes += 1;
                    self.buffer.advance(1);
                }
                Err(_) => {
                    // Bad sync or bad length byte: scan forward
                    self.stats.skipped_bytes += 1;
                    self.buffer.advance(1);
                }
            }
        }
    }

    /// Bytes currently buffered and not yet consumed
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Lifetime counters
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Reset the counters, e.g. after logging a stats interval
    pub fn reset_stats(&mut self) {
        self.stats = FramerStats::default();
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::channels::ChannelSet;
    use crate::crsf::protocol::{CrsfFrame, FrameType};

    fn wire_frame() -> Vec<u8> {
        codec::encode(&ChannelSet::centered().to_frame()).unwrap()
    }

    #[test]
    fn test_empty_framer_yields_nothing() {
        let mut framer = StreamFramer::new();
        assert_eq!(framer.next_frame(), None);
    }

    #[test]
    fn test_clean_stream() {
        let mut framer = StreamFramer::new();
        framer.extend(&wire_frame());

        let frame = framer.next_frame().expect("one frame buffered");
        assert_eq!(frame.frame_type, FrameType::RcChannelsPacked);
        assert_eq!(framer.next_frame(), None);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_then_complete() {
        let wire = wire_frame();
        let mut framer = StreamFramer::new();

        framer.extend(&wire[..5]);
        assert_eq!(framer.next_frame(), None);

        framer.extend(&wire[5..]);
        assert!(framer.next_frame().is_some());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut framer = StreamFramer::new();
        let mut stream = wire_frame();
        stream.extend_from_slice(&wire_frame());
        stream.extend_from_slice(&wire_frame());
        framer.extend(&stream);

        let mut count = 0;
        while framer.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(framer.stats().frames, 3);
    }

    #[test]
    fn test_resync_after_garbage() {
        // N garbage bytes followed by one valid frame must yield exactly
        // one frame, with the buffer advanced past all of it.
        let garbage = [0x01u8, 0x02, 0x55, 0xAA, 0x00, 0x13, 0x37];
        let wire = wire_frame();

        let mut framer = StreamFramer::new();
        framer.extend(&garbage);
        framer.extend(&wire);

        let frame = framer.next_frame().expect("valid frame after garbage");
        assert_eq!(frame.frame_type, FrameType::RcChannelsPacked);
        assert_eq!(framer.next_frame(), None);
        assert_eq!(framer.buffered_len(), 0);
        assert_eq!(framer.stats().skipped_bytes, garbage.len() as u64);
    }

    #[test]
    fn test_resync_after_corrupt_frame() {
        // A bit-flipped frame is skipped, the following frame survives
        let mut corrupted = wire_frame();
        corrupted[10] ^= 0x40;

        let mut framer = StreamFramer::new();
        framer.extend(&corrupted);
        framer.extend(&wire_frame());

        let frame = framer.next_frame().expect("second frame survives");
        assert_eq!(frame.frame_type, FrameType::RcChannelsPacked);
        assert!(framer.stats().crc_errors >= 1);
    }

    #[test]
    fn test_sync_byte_inside_garbage() {
        // A stray 0xC8 followed by junk must not swallow the real frame
        let mut framer = StreamFramer::new();
        framer.extend(&[0xC8, 0x18, 0x16, 0x00, 0x00]);
        framer.extend(&wire_frame());

        let frame = framer.next_frame().expect("real frame found");
        assert_eq!(frame.frame_type, FrameType::RcChannelsPacked);
        assert_eq!(
            frame.payload,
            ChannelSet::centered().pack().to_vec(),
            "payload must come from the valid frame, not the decoy header"
        );
    }

    #[test]
    fn test_large_valid_burst_not_discarded() {
        // A single chunk of back-to-back valid frames far beyond the cap
        // must come through intact; the cap only drops undecodable data.
        let mut stream = Vec::new();
        for _ in 0..50 {
            stream.extend_from_slice(&wire_frame());
        }
        assert!(stream.len() > DEFAULT_MAX_BUFFER);

        let mut framer = StreamFramer::new();
        framer.extend(&stream);

        let mut count = 0;
        while framer.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 50, "all valid frames recovered");
        assert_eq!(framer.stats().resync_overflows, 0);
        assert_eq!(framer.stats().skipped_bytes, 0);
    }

    #[test]
    fn test_garbage_flood_drained_not_cleared() {
        // Undecodable bytes past the cap are skipped by the scan, not
        // counted as an overflow clear
        let mut framer = StreamFramer::with_max_buffer(64);
        framer.extend(&[0x00; 96]);

        // 95 bytes skipped by the scan, one byte too short to judge
        assert_eq!(framer.stats().resync_overflows, 0);
        assert_eq!(framer.stats().skipped_bytes, 95);
        assert_eq!(framer.buffered_len(), 1);
        assert_eq!(framer.next_frame(), None);

        framer.extend(&wire_frame());
        assert!(framer.next_frame().is_some());
    }

    #[test]
    fn test_buffer_overflow_clears_and_counts() {
        // A header claiming a maximum-length frame that never completes
        // holds bytes in the buffer; past the cap that window is dropped
        let mut framer = StreamFramer::with_max_buffer(32);

        framer.extend(&[0xC8, 0x3E]);
        assert_eq!(framer.stats().resync_overflows, 0);
        framer.extend(&[0x00; 40]);

        assert_eq!(framer.stats().resync_overflows, 1);
        assert_eq!(framer.buffered_len(), 0);
        assert_eq!(framer.next_frame(), None);

        // Stream keeps working after the overflow
        framer.extend(&wire_frame());
        assert!(framer.next_frame().is_some());
    }

    #[test]
    fn test_unknown_frame_types_pass_through() {
        let frame = CrsfFrame::new(FrameType::Unknown(0x42), vec![9, 8, 7]).unwrap();
        let mut framer = StreamFramer::new();
        framer.extend(&codec::encode(&frame).unwrap());

        assert_eq!(framer.next_frame(), Some(frame));
    }
}
