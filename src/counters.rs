use std::fmt;

use serde::Serialize;

use crate::free_list::FreeBlock;

/// Monotonic event counters, plus the two running gauges `blocks` and
/// `heap_size`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
  /// Headers currently carved out of the heap, live or free.
  pub blocks: usize,
  pub mallocs: usize,
  pub frees: usize,
  pub callocs: usize,
  pub reallocs: usize,
  pub reuses: usize,
  pub grows: usize,
  pub shrinks: usize,
  pub splits: usize,
  pub merges: usize,
  /// Sum of every size passed to a successful allocation.
  pub requested: usize,
  /// Bytes obtained from the heap and not yet returned.
  pub heap_size: usize,
}

impl Counters {
  pub const fn new() -> Self {
    Self {
      blocks: 0,
      mallocs: 0,
      frees: 0,
      callocs: 0,
      reallocs: 0,
      reuses: 0,
      grows: 0,
      shrinks: 0,
      splits: 0,
      merges: 0,
      requested: 0,
      heap_size: 0,
    }
  }
}

/// Wasted tail space inside free blocks, as a percentage of the heap.
pub fn internal_fragmentation<I>(
  free: I,
  heap_size: usize,
) -> f64
where
  I: IntoIterator<Item = FreeBlock>,
{
  if heap_size == 0 {
    return 0.0;
  }
  let wasted: usize = free
    .into_iter()
    .map(|block| block.capacity.saturating_sub(block.size))
    .sum();
  wasted as f64 / heap_size as f64 * 100.0
}

/// `(1 - largest / total) * 100` over free capacities.
pub fn external_fragmentation<I>(free: I) -> f64
where
  I: IntoIterator<Item = FreeBlock>,
{
  let (largest, total) = free
    .into_iter()
    .fold((0usize, 0usize), |(largest, total), block| {
      (largest.max(block.capacity), total + block.capacity)
    });
  if total == 0 {
    return 0.0;
  }
  (1.0 - largest as f64 / total as f64) * 100.0
}

/// Point-in-time report handed to whatever consumes allocator statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
  #[serde(flatten)]
  pub counters: Counters,
  pub free_blocks: usize,
  pub internal_fragmentation: f64,
  pub external_fragmentation: f64,
}

impl fmt::Display for Stats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let c = &self.counters;
    writeln!(f, "blocks:      {}", c.blocks)?;
    writeln!(f, "free blocks: {}", self.free_blocks)?;
    writeln!(f, "mallocs:     {}", c.mallocs)?;
    writeln!(f, "frees:       {}", c.frees)?;
    writeln!(f, "callocs:     {}", c.callocs)?;
    writeln!(f, "reallocs:    {}", c.reallocs)?;
    writeln!(f, "reuses:      {}", c.reuses)?;
    writeln!(f, "grows:       {}", c.grows)?;
    writeln!(f, "shrinks:     {}", c.shrinks)?;
    writeln!(f, "splits:      {}", c.splits)?;
    writeln!(f, "merges:      {}", c.merges)?;
    writeln!(f, "requested:   {}", c.requested)?;
    writeln!(f, "heap size:   {}", c.heap_size)?;
    writeln!(f, "internal:    {:4.2}", self.internal_fragmentation)?;
    writeln!(f, "external:    {:4.2}", self.external_fragmentation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn free_block(
    capacity: usize,
    size: usize,
  ) -> FreeBlock {
    FreeBlock {
      address: 0,
      capacity,
      size,
    }
  }

  #[test]
  fn test_empty_list_has_no_fragmentation() {
    assert_eq!(internal_fragmentation(Vec::new(), 0), 0.0);
    assert_eq!(internal_fragmentation(Vec::new(), 4096), 0.0);
    assert_eq!(external_fragmentation(Vec::new()), 0.0);
  }

  #[test]
  fn test_exact_fit_has_no_internal_fragmentation() {
    let blocks = vec![free_block(64, 64)];

    assert_eq!(internal_fragmentation(blocks.clone(), 96), 0.0);
    assert_eq!(external_fragmentation(blocks), 0.0);
  }

  #[test]
  fn test_fragmentation_percentages() {
    let blocks = vec![free_block(64, 32), free_block(192, 0)];

    // (32 + 192) / 448
    assert_eq!(internal_fragmentation(blocks.clone(), 448), 50.0);
    // 1 - 192 / 256
    assert_eq!(external_fragmentation(blocks), 25.0);
  }

  #[test]
  fn test_stats_dump_format() {
    let stats = Stats {
      counters: Counters {
        blocks: 2,
        mallocs: 3,
        heap_size: 128,
        ..Counters::new()
      },
      free_blocks: 1,
      internal_fragmentation: 12.5,
      external_fragmentation: 0.0,
    };

    let dump = stats.to_string();

    assert!(dump.starts_with("blocks:      2\nfree blocks: 1\nmallocs:     3\n"));
    assert!(dump.contains("heap size:   128\n"));
    assert!(dump.contains("internal:    12.50\n"));
    assert!(dump.ends_with("external:    0.00\n"));
  }

  #[test]
  fn test_stats_serialize_flat() {
    let stats = Stats {
      counters: Counters {
        merges: 4,
        ..Counters::new()
      },
      free_blocks: 0,
      internal_fragmentation: 0.0,
      external_fragmentation: 0.0,
    };

    let json = serde_json::to_value(stats).unwrap();

    assert_eq!(json["merges"], 4);
    assert_eq!(json["free_blocks"], 0);
    assert!(json.get("counters").is_none());
  }
}
