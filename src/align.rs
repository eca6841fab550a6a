/// Rounds `value` up to the machine word alignment.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use fitalloc::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to a multiple of `unit`, which must be a power of two.
///
/// ```rust
/// use fitalloc::align_to;
///
/// assert_eq!(align_to!(100, 16), 112);
/// assert_eq!(align_to!(96, 32), 96);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $unit:expr) => {
    ($value + $unit - 1) & !($unit - 1)
  };
}

/// Checked form of [`align_to!`]: `None` when rounding would overflow `usize`.
pub const fn align_up(
  value: usize,
  unit: usize,
) -> Option<usize> {
  match value.checked_add(unit - 1) {
    Some(padded) => Some(padded & !(unit - 1)),
    None => None,
  }
}
