use std::{
    cell::RefCell,
    ops::{Deref, DerefMut},
};

thread_local! {
    static SCRATCH_POOL: RefCell<Vec<Vec<u64>>> = const { RefCell::new(Vec::new()) };
}

/// A zeroed limb buffer borrowed from the calling thread's scratch pool.
///
/// # Remarks
/// Dropping the guard returns the buffer to the pool, so repeated evaluations
/// on the same thread reuse the same allocations. Guards may be nested; each
/// acquisition receives a distinct buffer.
pub struct ScratchGuard {
    buf: Vec<u64>,
    len: usize,
}

impl ScratchGuard {
    /// The buffer as an immutable slice of exactly the requested length.
    pub fn as_slice(&self) -> &[u64] {
        &self.buf[..self.len]
    }

    /// The buffer as a mutable slice of exactly the requested length.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.buf[..self.len]
    }
}

impl Deref for ScratchGuard {
    type Target = [u64];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for ScratchGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);

        // The pool may already be gone during thread teardown.
        let _ = SCRATCH_POOL.try_with(|pool| pool.borrow_mut().push(buf));
    }
}

/// Borrow a zeroed buffer of `len` limbs from the thread-local pool.
pub fn allocate_scratch(len: usize) -> ScratchGuard {
    let mut buf = SCRATCH_POOL
        .try_with(|pool| pool.borrow_mut().pop())
        .ok()
        .flatten()
        .unwrap_or_default();

    if buf.len() < len {
        buf.resize(len, 0);
    }

    buf[..len].fill(0);

    ScratchGuard { buf, len }
}
