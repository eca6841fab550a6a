use std::ptr::{self, NonNull};

use crate::{
  block::Block,
  config::{Config, ConfigError},
  counters::{self, Counters, Stats},
  free_list::FreeList,
  heap::{HeapGrowth, Sbrk},
};

/// The allocator: one heap, one free list.
///
/// Every call either completes or leaves the heap exactly as it found it.
/// Nothing here is synchronized; see [`LockedAllocator`](crate::LockedAllocator)
/// for shared use.
pub struct FreeListAllocator<H: HeapGrowth = Sbrk> {
  heap: H,
  config: Config,
  free: FreeList,
  counters: Counters,
}

// Blocks are only ever reached through `&mut self`.
unsafe impl<H: HeapGrowth + Send> Send for FreeListAllocator<H> {}

impl FreeListAllocator<Sbrk> {
  /// An allocator over the process data segment.
  pub const fn sbrk() -> Self {
    Self::new(Sbrk::new())
  }
}

impl<H: HeapGrowth> FreeListAllocator<H> {
  pub const fn new(heap: H) -> Self {
    Self {
      heap,
      config: Config::new(),
      free: FreeList::new(),
      counters: Counters::new(),
    }
  }

  pub fn with_config(
    heap: H,
    config: Config,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self {
      heap,
      config,
      free: FreeList::new(),
      counters: Counters::new(),
    })
  }

  /// Returns `size` usable bytes, or `None` for a zero size or when the heap
  /// cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }
    self.free.anchor();

    let block = match self.free.search(size, self.config.fit, &mut self.counters) {
      Some(found) => unsafe {
        let block = Block::split(found.as_ptr(), size, &self.config, &mut self.counters);
        Block::detach(block)
      },
      None => unsafe {
        Block::allocate(&mut self.heap, size, &self.config, &mut self.counters)?.as_ptr()
      },
    };

    unsafe {
      (*block).size = size;
    }
    self.counters.mallocs += 1;
    self.counters.requested += size;

    NonNull::new(Block::payload(block))
  }

  /// Gives a payload back: to the OS when it is a large block at the heap top,
  /// to the free list otherwise.
  ///
  /// # Safety
  ///
  /// `pointer` must come from this allocator and not have been released since.
  pub unsafe fn release(
    &mut self,
    pointer: Option<NonNull<u8>>,
  ) {
    let Some(pointer) = pointer else {
      return;
    };
    self.free.anchor();
    self.counters.frees += 1;

    let block = Block::from_payload(pointer.as_ptr());
    unsafe {
      if !Block::release(&mut self.heap, block, &self.config, &mut self.counters) {
        self.free.insert(block, &mut self.counters);
      }
    }
  }

  /// `count * size` zeroed bytes. An overflowing product is refused.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if count == 0 || size == 0 {
      return None;
    }
    self.counters.callocs += 1;

    let Some(total) = count.checked_mul(size) else {
      trace_event!(debug, count, size, "zero_allocate size overflows");
      return None;
    };
    let payload = self.allocate(total)?;

    unsafe {
      let capacity = (*Block::from_payload(payload.as_ptr())).capacity;
      ptr::write_bytes(payload.as_ptr(), 0, capacity);
    }
    Some(payload)
  }

  /// Moves the first `min(old size, size)` bytes into a fresh allocation.
  ///
  /// On failure the original allocation is untouched and still owned by the
  /// caller.
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](Self::release).
  pub unsafe fn reallocate(
    &mut self,
    pointer: Option<NonNull<u8>>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.counters.reallocs += 1;

    let Some(old) = pointer else {
      return self.allocate(size);
    };
    if size == 0 {
      unsafe { self.release(Some(old)) };
      return None;
    }

    let old_size = unsafe { (*Block::from_payload(old.as_ptr())).size };
    let new = self.allocate(size)?;

    unsafe {
      ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size.min(size));
      self.release(Some(old));
    }
    Some(new)
  }

  /// Capacity of the block behind `pointer`, at least the size it was
  /// allocated with.
  ///
  /// # Safety
  ///
  /// `pointer` must be a live allocation from this allocator.
  pub unsafe fn usable_size(
    &self,
    pointer: NonNull<u8>,
  ) -> usize {
    unsafe { (*Block::from_payload(pointer.as_ptr())).capacity }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn counters(&self) -> &Counters {
    &self.counters
  }

  pub fn free_list(&self) -> &FreeList {
    &self.free
  }

  pub fn heap(&self) -> &H {
    &self.heap
  }

  pub fn internal_fragmentation(&self) -> f64 {
    counters::internal_fragmentation(self.free.iter(), self.counters.heap_size)
  }

  pub fn external_fragmentation(&self) -> f64 {
    counters::external_fragmentation(self.free.iter())
  }

  pub fn stats(&self) -> Stats {
    Stats {
      counters: self.counters,
      free_blocks: self.free.length(),
      internal_fragmentation: self.internal_fragmentation(),
      external_fragmentation: self.external_fragmentation(),
    }
  }
}
