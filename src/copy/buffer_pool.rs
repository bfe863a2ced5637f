//! Pooled copy buffers in two size classes.
//!
//! Workers borrow a buffer per file and hand it back on drop, so a copy of
//! hundreds of thousands of files allocates only a handful of buffers.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Buffer used for files below [`LARGE_FILE_THRESHOLD`].
pub const SMALL_BUFFER_SIZE: usize = 64 * 1024;
/// Buffer used for everything else.
pub const LARGE_BUFFER_SIZE: usize = 1024 * 1024;
/// Files at or above this size get a large buffer.
pub const LARGE_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Idle buffers kept per class; extras are freed on release.
const MAX_IDLE_PER_CLASS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferClass {
    Small,
    Large,
}

impl BufferClass {
    pub fn for_file_size(size: u64) -> Self {
        if size < LARGE_FILE_THRESHOLD {
            BufferClass::Small
        } else {
            BufferClass::Large
        }
    }

    pub fn capacity(self) -> usize {
        match self {
            BufferClass::Small => SMALL_BUFFER_SIZE,
            BufferClass::Large => LARGE_BUFFER_SIZE,
        }
    }
}

#[derive(Default)]
pub struct BufferPool {
    small: Mutex<Vec<Vec<u8>>>,
    large: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, class: BufferClass) -> &Mutex<Vec<Vec<u8>>> {
        match class {
            BufferClass::Small => &self.small,
            BufferClass::Large => &self.large,
        }
    }

    /// Borrow a buffer sized for a file of `file_size` bytes.
    pub fn acquire(&self, file_size: u64) -> PooledBuffer<'_> {
        let class = BufferClass::for_file_size(file_size);
        let reused = self
            .slot(class)
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop());
        let buf = reused.unwrap_or_else(|| vec![0u8; class.capacity()]);
        PooledBuffer {
            pool: self,
            class,
            buf: Some(buf),
        }
    }

    fn release(&self, class: BufferClass, buf: Vec<u8>) {
        if buf.len() != class.capacity() {
            return;
        }
        if let Ok(mut idle) = self.slot(class).lock() {
            if idle.len() < MAX_IDLE_PER_CLASS {
                idle.push(buf);
            }
        }
    }

    /// Number of idle buffers in a class.
    pub fn idle(&self, class: BufferClass) -> usize {
        self.slot(class).lock().map(|v| v.len()).unwrap_or(0)
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    class: BufferClass,
    buf: Option<Vec<u8>>,
}

impl PooledBuffer<'_> {
    pub fn class(&self) -> BufferClass {
        self.class
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(self.class, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_threshold() {
        assert_eq!(BufferClass::for_file_size(0), BufferClass::Small);
        assert_eq!(
            BufferClass::for_file_size(LARGE_FILE_THRESHOLD - 1),
            BufferClass::Small
        );
        assert_eq!(
            BufferClass::for_file_size(LARGE_FILE_THRESHOLD),
            BufferClass::Large
        );
    }

    #[test]
    fn test_buffers_are_reused() {
        let pool = BufferPool::new();
        {
            let buf = pool.acquire(2 * 1024);
            assert_eq!(buf.len(), SMALL_BUFFER_SIZE);
            assert_eq!(buf.class(), BufferClass::Small);
        }
        assert_eq!(pool.idle(BufferClass::Small), 1);

        let again = pool.acquire(10);
        assert_eq!(pool.idle(BufferClass::Small), 0);
        drop(again);

        let large = pool.acquire(2 * 1024 * 1024);
        assert_eq!(large.len(), LARGE_BUFFER_SIZE);
        drop(large);
        assert_eq!(pool.idle(BufferClass::Large), 1);
        assert_eq!(pool.idle(BufferClass::Small), 1);
    }

    #[test]
    fn test_idle_is_bounded() {
        let pool = BufferPool::new();
        let held: Vec<_> = (0..MAX_IDLE_PER_CLASS + 4).map(|_| pool.acquire(1)).collect();
        drop(held);
        assert_eq!(pool.idle(BufferClass::Small), MAX_IDLE_PER_CLASS);
    }
}
