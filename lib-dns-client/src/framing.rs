//! Framing of DNS messages in a stream transport.
//!
//! A DNS TCP message is slightly different to a DNS UDP message: it
//! has a big-endian u16 prefix giving the total length of the
//! message.  Datagram transports carry exactly one message per
//! datagram and do not need this module.

use bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FrameState {
    /// Waiting for the two length-prefix octets.
    AwaitingLength,

    /// Waiting for the declared number of payload octets.
    AwaitingPayload(usize),
}

/// Extracts complete DNS messages from an arbitrary chunking of the
/// inbound byte stream.  Push octets in as they arrive, then drain
/// frames with `next_frame` until it returns `None`: several frames
/// may become available from a single push, and a frame may need
/// several pushes.
#[derive(Debug)]
pub struct StreamFramer {
    state: FrameState,
    buffer: BytesMut,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            state: FrameState::AwaitingLength,
            buffer: BytesMut::with_capacity(512),
        }
    }

    pub fn push(&mut self, octets: &[u8]) {
        self.buffer.extend_from_slice(octets);
    }

    /// The next complete message, if enough octets are buffered.
    /// Consumed octets are never re-examined; unconsumed octets are
    /// kept for later.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.state == FrameState::AwaitingLength {
            if self.buffer.len() < 2 {
                return None;
            }
            let length = usize::from(self.buffer.get_u16());
            self.state = FrameState::AwaitingPayload(length);
        }

        if let FrameState::AwaitingPayload(length) = self.state {
            if self.buffer.len() < length {
                return None;
            }
            self.state = FrameState::AwaitingLength;
            return Some(self.buffer.split_to(length).freeze());
        }

        None
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

    #[test]
    fn frame_arriving_byte_by_byte() {
        let mut framer = StreamFramer::new();
        let wire = [0, 3, 0xaa, 0xbb, 0xcc];

        let mut frames = Vec::new();
        for octet in wire {
            framer.push(&[octet]);
            while let Some(frame) = framer.next_frame() {
                frames.push(frame);
            }
        }

        assert_eq!(vec![Bytes::from_static(&[0xaa, 0xbb, 0xcc])], frames);
    }

    #[test]
    fn two_frames_in_one_push() {
        let mut framer = StreamFramer::new();
        framer.push(&[0, 1, 0xaa, 0, 2, 0xbb, 0xcc]);

        assert_eq!(Some(Bytes::from_static(&[0xaa])), framer.next_frame());
        assert_eq!(Some(Bytes::from_static(&[0xbb, 0xcc])), framer.next_frame());
        assert_eq!(None, framer.next_frame());
    }

    #[test]
    fn partial_payload_resumes_without_loss() {
        let mut framer = StreamFramer::new();

        framer.push(&[0, 4, 1, 2]);
        assert_eq!(None, framer.next_frame());

        framer.push(&[3, 4]);
        assert_eq!(
            Some(Bytes::from_static(&[1, 2, 3, 4])),
            framer.next_frame()
        );
    }

    #[test]
    fn split_length_prefix() {
        let mut framer = StreamFramer::new();

        framer.push(&[0]);
        assert_eq!(None, framer.next_frame());

        framer.push(&[2, 9, 8]);
        assert_eq!(Some(Bytes::from_static(&[9, 8])), framer.next_frame());
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let wire = [0, 2, 1, 2, 0, 3, 3, 4, 5, 0, 1, 6];
        let expected = vec![
            Bytes::from_static(&[1, 2]),
            Bytes::from_static(&[3, 4, 5]),
            Bytes::from_static(&[6]),
        ];

        for chunk_size in 1..=wire.len() {
            let mut framer = StreamFramer::new();
            let mut frames = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                framer.push(chunk);
                while let Some(frame) = framer.next_frame() {
                    frames.push(frame);
                }
            }
            assert_eq!(expected, frames, "chunk size {chunk_size}");
        }
    }
}
