//! Block headers and the structural operations on them.
//!
//! A block is a header followed directly by its payload:
//!
//! ```text
//!   block                     payload = block + HEADER_SIZE
//!   ├─ capacity ─ size ─ prev ─ next ─┼──────── capacity bytes ────────┤
//!                                                                 end ─┘
//! ```
//!
//! Links are raw addresses. A block that is live or freshly grown points at
//! itself in both directions; a free block points at its free-list neighbors.

use std::{mem, ptr, ptr::NonNull};

use crate::{align::align_up, config::Config, counters::Counters, heap::HeapGrowth};

/// Size of the header preceding every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Capacity reserved for the free-list sentinel. No request can match it
/// because no aligned capacity reaches it.
const SENTINEL_CAPACITY: usize = usize::MAX;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub capacity: usize,
  /// Bytes requested by the current (or last) occupant.
  pub size: usize,
  pub prev: *mut Block,
  pub next: *mut Block,
}

impl Block {
  /// The list boundary. Its links are fixed up by the owning list.
  pub const fn sentinel() -> Self {
    Self {
      capacity: SENTINEL_CAPACITY,
      size: SENTINEL_CAPACITY,
      prev: ptr::null_mut(),
      next: ptr::null_mut(),
    }
  }

  pub fn is_sentinel(&self) -> bool {
    self.capacity == SENTINEL_CAPACITY
  }

  pub fn payload(block: *mut Block) -> *mut u8 {
    (block as *mut u8).wrapping_add(HEADER_SIZE)
  }

  pub fn from_payload(payload: *mut u8) -> *mut Block {
    payload.wrapping_sub(HEADER_SIZE) as *mut Block
  }

  /// First address past the payload.
  ///
  /// # Safety
  ///
  /// `block` must point at a readable header.
  pub unsafe fn end(block: *const Block) -> usize {
    unsafe { (block as usize).wrapping_add(HEADER_SIZE).wrapping_add((*block).capacity) }
  }

  /// # Safety
  ///
  /// `block` must point at a readable header.
  pub unsafe fn is_isolated(block: *const Block) -> bool {
    unsafe { ptr::eq((*block).prev, block) && ptr::eq((*block).next, block) }
  }

  /// Appends a new block of `align(size)` capacity at the heap top, padding
  /// the top up to `config.alignment` first.
  ///
  /// Returns `None` when the heap refuses to grow or the request cannot be
  /// represented.
  ///
  /// # Safety
  ///
  /// `heap` must hand out memory that is exclusively ours.
  pub unsafe fn allocate<H: HeapGrowth>(
    heap: &mut H,
    size: usize,
    config: &Config,
    counters: &mut Counters,
  ) -> Option<NonNull<Block>> {
    let capacity = align_up(size, config.alignment)?;
    let allocated = capacity.checked_add(HEADER_SIZE)?;

    // Headers start on an alignment boundary even if someone else moved the
    // top; the pad belongs to no block.
    let top = heap.top() as usize;
    let pad = align_up(top, config.alignment)? - top;
    let increment = pad.checked_add(allocated)?;

    let address = match heap.grow(increment) {
      Ok(address) => address,
      Err(error) => {
        trace_event!(debug, allocated = increment, %error, "heap growth denied");
        return None;
      }
    };

    let block = address.wrapping_add(pad) as *mut Block;
    unsafe {
      block.write(Block {
        capacity,
        size,
        prev: block,
        next: block,
      });
    }

    counters.heap_size += allocated;
    counters.blocks += 1;
    counters.grows += 1;
    trace_event!(trace, address = block as usize, capacity, "grow");

    NonNull::new(block)
  }

  /// Hands `block` back to the heap if it sits at the very top and is at
  /// least `trim_threshold` bytes. Otherwise nothing changes and the caller
  /// keeps the block.
  ///
  /// # Safety
  ///
  /// `block` must be a valid header obtained from `heap`.
  pub unsafe fn release<H: HeapGrowth>(
    heap: &mut H,
    block: *mut Block,
    config: &Config,
    counters: &mut Counters,
  ) -> bool {
    unsafe {
      if Block::end(block) != heap.top() as usize || (*block).capacity < config.trim_threshold {
        return false;
      }

      let capacity = (*block).capacity;
      let allocated = capacity + HEADER_SIZE;

      Block::detach(block);
      if let Err(error) = heap.shrink(allocated) {
        trace_event!(debug, allocated, %error, "heap shrink refused");
        return false;
      }

      counters.heap_size -= allocated;
      counters.blocks -= 1;
      counters.shrinks += 1;
      trace_event!(trace, address = block as usize, capacity, "shrink");

      true
    }
  }

  /// Splices `block` out of its list and leaves it self-linked.
  ///
  /// # Safety
  ///
  /// `block` and both of its neighbors must be valid headers.
  pub unsafe fn detach(block: *mut Block) -> *mut Block {
    unsafe {
      let prev = (*block).prev;
      let next = (*block).next;
      (*prev).next = next;
      (*next).prev = prev;
      (*block).prev = block;
      (*block).next = block;
    }
    block
  }

  /// Absorbs `src` into `dst` when `src` starts exactly where `dst` ends.
  ///
  /// # Safety
  ///
  /// Both must be valid headers, and `src`'s neighbors must be valid.
  pub unsafe fn merge(
    dst: *mut Block,
    src: *mut Block,
    counters: &mut Counters,
  ) -> bool {
    unsafe {
      if ptr::eq(dst, src) || (*dst).is_sentinel() || (*src).is_sentinel() {
        return false;
      }
      if Block::end(dst) != src as usize {
        return false;
      }

      (*dst).capacity += (*src).capacity + HEADER_SIZE;
      Block::detach(src);

      counters.merges += 1;
      counters.blocks -= 1;
      trace_event!(trace, address = dst as usize, capacity = (*dst).capacity, "merge");

      true
    }
  }

  /// Trims `block` to `align(size)` and turns the tail into a new block
  /// linked right after it, if the tail can hold a header and at least one
  /// byte. Either way `block.size` becomes `size`.
  ///
  /// # Safety
  ///
  /// `block` must be a valid header whose `next` is a valid header
  /// (itself, when isolated).
  pub unsafe fn split(
    block: *mut Block,
    size: usize,
    config: &Config,
    counters: &mut Counters,
  ) -> *mut Block {
    unsafe {
      let front = align_up(size, config.alignment);
      let needed = front.and_then(|front| front.checked_add(HEADER_SIZE));

      if let (Some(front), Some(needed)) = (front, needed) {
        if (*block).capacity > needed {
          let next = (*block).next;
          let remainder = (block as *mut u8).add(needed) as *mut Block;
          remainder.write(Block {
            capacity: (*block).capacity - needed,
            size: 0,
            prev: block,
            next,
          });
          (*next).prev = remainder;
          (*block).next = remainder;
          (*block).capacity = front;

          counters.splits += 1;
          counters.blocks += 1;
          trace_event!(
            trace,
            address = block as usize,
            capacity = front,
            remainder = (*remainder).capacity,
            "split"
          );
        }
      }

      (*block).size = size;
      block
    }
  }
}
