//! Address-ordered, circular, doubly-linked list of released blocks.
//!
//! ```text
//!   ┌──────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐
//!   │ sentinel │───▶│ 0x1000  │───▶│ 0x1400  │───▶│ 0x2c00  │───┐
//!   └──────────┘◀───└─────────┘◀───└─────────┘◀───└─────────┘   │
//!        ▲                                                      │
//!        └──────────────────────────────────────────────────────┘
//! ```
//!
//! No two members are ever adjacent in memory: every insertion merges the new
//! block with whichever neighbors it touches.

use std::{iter, ptr, ptr::NonNull};

use crate::{block::Block, config::FitStrategy, counters::Counters};

/// Read-only view of one free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  pub address: usize,
  pub capacity: usize,
  pub size: usize,
}

pub struct FreeList {
  sentinel: Block,
  /// Address the sentinel had when its neighbors were last pointed at it.
  anchor: *const Block,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      sentinel: Block::sentinel(),
      anchor: ptr::null(),
    }
  }

  /// Points the boundary links at the sentinel's current address and returns
  /// it. Must run before any block in the list is relinked.
  pub(crate) fn anchor(&mut self) -> *mut Block {
    let head = &mut self.sentinel as *mut Block;
    if ptr::eq(self.anchor, head) {
      return head;
    }

    if self.anchor.is_null() || ptr::eq(self.sentinel.next, self.anchor) {
      self.sentinel.next = head;
      self.sentinel.prev = head;
    } else {
      unsafe {
        (*self.sentinel.next).prev = head;
        (*self.sentinel.prev).next = head;
      }
    }
    self.anchor = head;
    head
  }

  fn is_boundary(
    &self,
    block: *const Block,
  ) -> bool {
    block.is_null() || ptr::eq(block, self.anchor) || ptr::eq(block, &self.sentinel)
  }

  fn blocks(&self) -> impl Iterator<Item = *mut Block> + '_ {
    let mut current = self.sentinel.next;
    iter::from_fn(move || {
      if self.is_boundary(current) {
        return None;
      }
      let block = current;
      current = unsafe { (*block).next };
      Some(block)
    })
  }

  /// Free blocks in ascending address order.
  pub fn iter(&self) -> impl Iterator<Item = FreeBlock> + '_ {
    self.blocks().map(|block| unsafe {
      FreeBlock {
        address: block as usize,
        capacity: (*block).capacity,
        size: (*block).size,
      }
    })
  }

  pub fn length(&self) -> usize {
    self.blocks().count()
  }

  pub fn is_empty(&self) -> bool {
    self.is_boundary(self.sentinel.next)
  }

  pub(crate) fn search_first_fit(
    &self,
    size: usize,
  ) -> Option<NonNull<Block>> {
    self
      .blocks()
      .find(|&block| unsafe { (*block).capacity } >= size)
      .and_then(NonNull::new)
  }

  pub(crate) fn search_best_fit(
    &self,
    size: usize,
  ) -> Option<NonNull<Block>> {
    self
      .blocks()
      .filter(|&block| unsafe { (*block).capacity } >= size)
      .min_by_key(|&block| unsafe { (*block).capacity })
      .and_then(NonNull::new)
  }

  /// Largest block overall, and only if it is big enough.
  pub(crate) fn search_worst_fit(
    &self,
    size: usize,
  ) -> Option<NonNull<Block>> {
    self
      .blocks()
      .reduce(|largest, block| unsafe {
        if (*block).capacity > (*largest).capacity {
          block
        } else {
          largest
        }
      })
      .filter(|&largest| unsafe { (*largest).capacity } >= size)
      .and_then(NonNull::new)
  }

  pub(crate) fn search(
    &self,
    size: usize,
    fit: FitStrategy,
    counters: &mut Counters,
  ) -> Option<NonNull<Block>> {
    let found = match fit {
      FitStrategy::First => self.search_first_fit(size),
      FitStrategy::Best => self.search_best_fit(size),
      FitStrategy::Worst => self.search_worst_fit(size),
    };

    if let Some(block) = found {
      counters.reuses += 1;
      trace_event!(trace, address = block.as_ptr() as usize, size, %fit, "reuse");
    }
    found
  }

  /// Links `block` in front of the first member at a higher address, then
  /// merges it with both neighbors where they touch.
  ///
  /// # Safety
  ///
  /// `block` must be a valid, isolated header that is not already a member.
  pub(crate) unsafe fn insert(
    &mut self,
    block: *mut Block,
    counters: &mut Counters,
  ) {
    let head = self.anchor();
    let next = self
      .blocks()
      .find(|&member| member as usize > block as usize)
      .unwrap_or(head);

    unsafe {
      let prev = (*next).prev;
      (*prev).next = block;
      (*next).prev = block;
      (*block).prev = prev;
      (*block).next = next;

      Block::merge(block, (*block).next, counters);
      Block::merge((*block).prev, block, counters);
    }
  }
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}
