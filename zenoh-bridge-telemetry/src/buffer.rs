//! Reassembly of fixed-size frames from arbitrary stream reads.

/// Accumulates bytes from a stream and yields complete `frame_len`-byte frames.
///
/// A read may carry part of a frame, exactly one, or several plus a
/// fragment; the remainder is kept for the next read.
#[derive(Debug)]
pub struct FrameBuffer {
    frame_len: usize,
    data: Vec<u8>,
    head: usize,
}

impl FrameBuffer {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            data: Vec::with_capacity(frame_len * 64),
            head: 0,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.head > 0 {
            self.data.drain(..self.head);
            self.head = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Next complete frame, if enough bytes are buffered.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        if self.pending() < self.frame_len {
            return None;
        }
        let start = self.head;
        self.head += self.frame_len;
        Some(&self.data[start..self.head])
    }

    /// Bytes of an incomplete frame still waiting for the rest.
    pub fn pending(&self) -> usize {
        self.data.len() - self.head
    }

    /// Forget any buffered bytes, e.g. after the connection drops.
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}
