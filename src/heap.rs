//! Heap growth primitives.
//!
//! ```text
//!   base                                   top               limit
//!   ├──────────────── in use ────────────────┤──── reserve ────┤
//!                                            ▲
//!                       grow(n) moves it right, shrink(n) left
//! ```

use std::{io, ptr};

use libc::{c_void, intptr_t, sbrk};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
  #[error("cannot grow the heap by {requested} bytes, {available} available")]
  Exhausted { requested: usize, available: usize },
  #[error("increment of {0} bytes does not fit in an intptr_t")]
  TooLarge(usize),
  #[error("cannot shrink {requested} bytes from a heap of {size} bytes")]
  Shrink { requested: usize, size: usize },
  #[error("os refused to move the heap boundary: {0}")]
  Os(#[from] io::Error),
}

/// A contiguous region that only ever grows or shrinks at its top.
///
/// # Safety
///
/// Memory returned by `grow` must be readable, writable, exclusively owned by
/// the caller until it is shrunk away, and contiguous with the previous top.
pub unsafe trait HeapGrowth {
  /// Current end of the heap: the address the next `grow` will return.
  fn top(&self) -> *mut u8;

  /// Extends the heap by `increment` bytes and returns the old top.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<*mut u8, HeapError>;

  /// Gives the last `decrement` bytes back.
  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), HeapError>;
}

const SBRK_FAILURE: *mut c_void = usize::MAX as *mut c_void;

/// The process data segment, moved with `sbrk(2)`.
///
/// Only one `Sbrk` should be driving the break at a time, and nothing else in
/// the process (including the system `malloc`) should be growing it between
/// calls if blocks are expected to be trimmed.
pub struct Sbrk;

impl Sbrk {
  pub const fn new() -> Self {
    Self
  }
}

impl Default for Sbrk {
  fn default() -> Self {
    Self::new()
  }
}

unsafe impl HeapGrowth for Sbrk {
  fn top(&self) -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }

  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<*mut u8, HeapError> {
    let delta = intptr_t::try_from(increment).map_err(|_| HeapError::TooLarge(increment))?;

    let address = unsafe { sbrk(delta) };
    if address == SBRK_FAILURE {
      return Err(HeapError::Os(io::Error::last_os_error()));
    }
    Ok(address as *mut u8)
  }

  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), HeapError> {
    let delta = intptr_t::try_from(decrement).map_err(|_| HeapError::TooLarge(decrement))?;

    if unsafe { sbrk(-delta) } == SBRK_FAILURE {
      return Err(HeapError::Os(io::Error::last_os_error()));
    }
    Ok(())
  }
}

/// A bounded heap carved out of one anonymous private mapping.
///
/// The whole reservation is mapped up front; `grow` and `shrink` only move the
/// top inside it, so growth past `limit` is denied deterministically.
pub struct Region {
  base: *mut u8,
  len: usize,
  limit: usize,
}

impl Region {
  pub fn with_capacity(limit: usize) -> Result<Self, HeapError> {
    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        limit.max(1),
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    if base == libc::MAP_FAILED {
      return Err(HeapError::Os(io::Error::last_os_error()));
    }
    Ok(Self {
      base: base as *mut u8,
      len: 0,
      limit,
    })
  }

  pub fn base(&self) -> *mut u8 {
    self.base
  }

  /// Bytes currently handed out.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

unsafe impl HeapGrowth for Region {
  fn top(&self) -> *mut u8 {
    self.base.wrapping_add(self.len)
  }

  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<*mut u8, HeapError> {
    let available = self.limit - self.len;
    if increment > available {
      return Err(HeapError::Exhausted {
        requested: increment,
        available,
      });
    }
    let old_top = self.top();
    self.len += increment;
    Ok(old_top)
  }

  fn shrink(
    &mut self,
    decrement: usize,
  ) -> Result<(), HeapError> {
    if decrement > self.len {
      return Err(HeapError::Shrink {
        requested: decrement,
        size: self.len,
      });
    }
    self.len -= decrement;
    Ok(())
  }
}

// The mapping is owned exclusively by this value.
unsafe impl Send for Region {}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base as *mut c_void, self.limit.max(1));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_region_grow_and_shrink() {
    let mut region = Region::with_capacity(4096).unwrap();
    let base = region.base();

    assert!(region.is_empty());
    assert_eq!(region.top(), base);

    let first = region.grow(64).unwrap();
    assert_eq!(first, base);
    assert_eq!(region.top(), unsafe { base.add(64) });

    let second = region.grow(128).unwrap();
    assert_eq!(second, unsafe { base.add(64) });
    assert_eq!(region.len(), 192);

    region.shrink(128).unwrap();
    assert_eq!(region.top(), unsafe { base.add(64) });
  }

  #[test]
  fn test_region_denies_past_limit() {
    let mut region = Region::with_capacity(256).unwrap();

    region.grow(200).unwrap();

    match region.grow(100) {
      Err(HeapError::Exhausted { requested, available }) => {
        assert_eq!(requested, 100);
        assert_eq!(available, 56);
      }
      other => panic!("unexpected {:?}", other),
    }
    assert_eq!(region.len(), 200);
    assert!(matches!(region.shrink(300), Err(HeapError::Shrink { .. })));
  }

  #[test]
  fn test_region_memory_is_writable() {
    let mut region = Region::with_capacity(1024).unwrap();
    let address = region.grow(16).unwrap();

    unsafe {
      ptr::write_bytes(address, 0xAB, 16);
      assert_eq!(*address.add(15), 0xAB);
    }
  }

  #[test]
  fn test_sbrk_rejects_oversized_increment() {
    let mut heap = Sbrk::new();

    assert!(matches!(heap.grow(usize::MAX), Err(HeapError::TooLarge(_))));
  }
}
