use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use parking_lot::{Mutex, MutexGuard, const_mutex};

use crate::{
  allocator::FreeListAllocator,
  counters::Stats,
  heap::{HeapGrowth, Sbrk},
};

/// A [`FreeListAllocator`] behind a mutex, usable as the process allocator.
///
/// ```rust,ignore
/// use fitalloc::LockedAllocator;
///
/// #[global_allocator]
/// static ALLOCATOR: LockedAllocator = LockedAllocator::sbrk();
/// ```
///
/// Build without the `tracing` feature when installing it globally with a
/// subscriber that allocates, or events will re-enter the lock.
pub struct LockedAllocator<H: HeapGrowth = Sbrk> {
  inner: Mutex<FreeListAllocator<H>>,
}

impl LockedAllocator<Sbrk> {
  pub const fn sbrk() -> Self {
    Self::new(FreeListAllocator::sbrk())
  }
}

impl<H: HeapGrowth> LockedAllocator<H> {
  pub const fn new(allocator: FreeListAllocator<H>) -> Self {
    Self {
      inner: const_mutex(allocator),
    }
  }

  pub fn lock(&self) -> MutexGuard<'_, FreeListAllocator<H>> {
    self.inner.lock()
  }

  pub fn stats(&self) -> Stats {
    self.inner.lock().stats()
  }

  fn supports(
    &self,
    allocator: &FreeListAllocator<H>,
    layout: Layout,
  ) -> bool {
    layout.align() <= allocator.config().alignment
  }
}

unsafe impl<H: HeapGrowth + Send> GlobalAlloc for LockedAllocator<H> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let mut allocator = self.inner.lock();
    if !self.supports(&allocator, layout) {
      return ptr::null_mut();
    }
    allocator
      .allocate(layout.size())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    address: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.inner.lock().release(NonNull::new(address)) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let mut allocator = self.inner.lock();
    if !self.supports(&allocator, layout) {
      return ptr::null_mut();
    }
    allocator
      .zero_allocate(1, layout.size())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn realloc(
    &self,
    address: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    let mut allocator = self.inner.lock();
    if !self.supports(&allocator, layout) {
      return ptr::null_mut();
    }
    unsafe {
      allocator
        .reallocate(NonNull::new(address), new_size)
        .map_or(ptr::null_mut(), NonNull::as_ptr)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::heap::Region;

  fn locked() -> LockedAllocator<Region> {
    LockedAllocator::new(FreeListAllocator::new(Region::with_capacity(1 << 16).unwrap()))
  }

  #[test]
  fn test_global_alloc_round_trip() {
    let allocator = locked();
    let layout = Layout::array::<u32>(8).unwrap();

    unsafe {
      let address = allocator.alloc(layout) as *mut u32;
      assert!(!address.is_null());
      for i in 0..8 {
        address.add(i).write(i as u32);
      }

      let grown = allocator.realloc(address as *mut u8, layout, 64) as *mut u32;
      assert!(!grown.is_null());
      for i in 0..8 {
        assert_eq!(grown.add(i).read(), i as u32);
      }

      allocator.dealloc(grown as *mut u8, Layout::array::<u32>(16).unwrap());
    }

    let stats = allocator.stats();
    assert_eq!(stats.counters.mallocs, 2);
    assert_eq!(stats.counters.frees, 2);
    assert_eq!(stats.counters.reallocs, 1);
  }

  #[test]
  fn test_alloc_zeroed() {
    let allocator = locked();
    let layout = Layout::array::<u8>(40).unwrap();

    unsafe {
      let address = allocator.alloc_zeroed(layout);
      assert!(!address.is_null());
      assert!(std::slice::from_raw_parts(address, 40).iter().all(|&b| b == 0));
    }
    assert_eq!(allocator.lock().counters().callocs, 1);
  }

  #[test]
  fn test_rejects_over_aligned_layout() {
    let allocator = locked();
    let layout = Layout::from_size_align(64, 4096).unwrap();

    unsafe {
      assert!(allocator.alloc(layout).is_null());
    }
    assert_eq!(allocator.stats().counters.grows, 0);
  }

  #[test]
  fn test_shared_between_threads() {
    let allocator = std::sync::Arc::new(locked());

    let handles: Vec<_> = (0..4)
      .map(|_| {
        let allocator = allocator.clone();
        std::thread::spawn(move || {
          for size in 1..64 {
            let layout = Layout::from_size_align(size, 1).unwrap();
            unsafe {
              let address = allocator.alloc(layout);
              assert!(!address.is_null());
              address.write_bytes(0xCC, size);
              allocator.dealloc(address, layout);
            }
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    let stats = allocator.stats();
    assert_eq!(stats.counters.mallocs, 4 * 63);
    assert_eq!(stats.counters.frees, 4 * 63);
  }
}
