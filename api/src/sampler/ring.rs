use crate::batch::{BatchError, FrameWindow};

/// Fixed-capacity rolling buffer of frames backed by a single preallocated arena.
///
/// Slots are addressed through a head cursor; pushing into a full buffer is
/// not allowed, the caller evicts the oldest frame first.
pub struct WindowBuffer {
    arena: Vec<f32>,
    frame_len: usize,
    capacity: usize,
    head: usize,
    len: usize,
}

impl WindowBuffer {
    pub fn new(capacity: usize, frame_len: usize) -> Self {
        Self {
            arena: vec![0.0; capacity * frame_len],
            frame_len,
            capacity,
            head: 0,
            len: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Append a frame, letting `fill` write it directly into the next free slot.
    pub fn push_with<E>(&mut self, fill: impl FnOnce(&mut [f32]) -> Result<(), E>) -> Result<(), E> {
        debug_assert!(!self.is_full(), "push into full window buffer");
        let slot = (self.head + self.len) % self.capacity;
        let start = slot * self.frame_len;
        fill(&mut self.arena[start..start + self.frame_len])?;
        self.len += 1;
        Ok(())
    }

    pub fn evict_oldest(&mut self) {
        if self.len == 0 {
            return;
        }
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
    }

    /// Copy the buffered frames, oldest first, into a window.
    pub fn snapshot(&self, height: usize, width: usize, channels: usize) -> Result<FrameWindow, BatchError> {
        let mut data = Vec::with_capacity(self.len * self.frame_len);
        for i in 0..self.len {
            let slot = (self.head + i) % self.capacity;
            let start = slot * self.frame_len;
            data.extend_from_slice(&self.arena[start..start + self.frame_len]);
        }
        FrameWindow::from_vec(self.len, height, width, channels, data)
    }
}
