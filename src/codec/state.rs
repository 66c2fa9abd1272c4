//! Per-depth progress cursor shared by the writer and the reader.
//!
//! A message nested inside another message (directly or as a collection
//! element) gets the frame one level deeper than its parent, so each level
//! resumes independently.

/// Progress of one message at one nesting depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldState {
    /// Next slot to process.
    pub slot: usize,
    /// Direct type and field count have been written/read.
    pub header_done: bool,
    /// Field count announced by the remote writer (reader only).
    pub remote_fields: usize,
    /// Length prefix or null marker of the current slot is done.
    pub len_done: bool,
    /// Declared length of the array/collection in flight.
    pub len: usize,
    /// Array bytes or collection elements completed so far.
    pub offset: usize,
    /// Completed parts of a composite value, or "element started" for reads.
    pub part: u8,
    /// Parts of a composite value already read (reader only).
    pub longs: [i64; 3],
}

impl FieldState {
    /// Reset the sub-slot progress when moving on to the next slot.
    #[inline]
    pub fn next_slot(&mut self) {
        self.slot += 1;
        self.len_done = false;
        self.len = 0;
        self.offset = 0;
        self.part = 0;
        self.longs = [0; 3];
    }
}

/// Stack of frames indexed by the current nesting depth.
#[derive(Debug, Clone)]
pub(crate) struct StateStack {
    frames: Vec<FieldState>,
    depth: usize,
}

impl StateStack {
    pub fn new() -> Self {
        Self {
            frames: vec![FieldState::default()],
            depth: 0,
        }
    }

    #[inline]
    pub fn current(&self) -> &FieldState {
        &self.frames[self.depth]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut FieldState {
        &mut self.frames[self.depth]
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter a nested message, reusing a frame left over from a previous
    /// suspended call at that depth.
    pub fn push(&mut self) {
        self.depth += 1;
        if self.frames.len() == self.depth {
            self.frames.push(FieldState::default());
        }
    }

    /// Leave a nested message. A finished child's frame is cleared so the
    /// next sibling starts fresh.
    pub fn pop(&mut self, finished: bool) {
        if finished {
            self.frames[self.depth] = FieldState::default();
        }
        self.depth -= 1;
    }

    /// Clear all progress.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        self.frames[0] = FieldState::default();
        self.depth = 0;
    }
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}
