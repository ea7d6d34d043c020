//! # Transfer Buffer
//!
//! Caller-owned scratch memory that outgoing bytes are staged into before
//! each native push call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ensure_capacity(slot, n)                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  slot empty or invalid  ──►  allocate max(n, 8 KiB)                     │
//! │  capacity < n           ──►  release, allocate exactly n                │
//! │  capacity >= n          ──►  reuse unchanged                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The floor only applies to the first allocation. Once real write sizes
//! are known the buffer tracks the largest of them.

/// Minimum size of a freshly allocated transfer buffer: 8 KiB
pub const MIN_TRANSFER_CAPACITY: usize = 8 * 1024;

/// Scratch buffer for staging outgoing blocks.
#[derive(Debug)]
pub struct TransferBuffer {
    data: Vec<u8>,
    valid: bool,
}

impl TransferBuffer {
    fn allocate(capacity: usize) -> Self {
        tracing::trace!(capacity, "Allocating transfer buffer");
        Self {
            data: vec![0; capacity],
            valid: true,
        }
    }

    /// Usable capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer can still be used.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the buffer unusable; the next `ensure_capacity` reallocates.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Copy `bytes` to the front of the buffer and return the staged prefix.
    ///
    /// The caller must have ensured capacity for `bytes.len()`.
    pub(crate) fn stage(&mut self, bytes: &[u8]) -> &[u8] {
        let staged = &mut self.data[..bytes.len()];
        staged.copy_from_slice(bytes);
        staged
    }

    /// Free the memory and invalidate.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.valid = false;
    }
}

/// Make sure `slot` holds a valid buffer of at least `requested` bytes.
pub fn ensure_capacity(slot: &mut Option<TransferBuffer>, requested: usize) -> &mut TransferBuffer {
    match slot {
        Some(buffer) if buffer.is_valid() && buffer.capacity() >= requested => {}
        Some(buffer) if buffer.is_valid() => {
            buffer.release();
            *slot = Some(TransferBuffer::allocate(requested));
        }
        _ => {
            *slot = Some(TransferBuffer::allocate(requested.max(MIN_TRANSFER_CAPACITY)));
        }
    }
    slot.get_or_insert_with(|| TransferBuffer::allocate(requested.max(MIN_TRANSFER_CAPACITY)))
}

/// Stage `bytes` into the scratch buffer in `slot`, growing it as needed.
pub(crate) fn stage<'b>(slot: &'b mut Option<TransferBuffer>, bytes: &[u8]) -> &'b [u8] {
    ensure_capacity(slot, bytes.len()).stage(bytes)
}

/// Release the scratch buffer in `slot`, if any.
pub(crate) fn release(slot: &mut Option<TransferBuffer>) {
    if let Some(mut buffer) = slot.take() {
        buffer.release();
    }
}
