use std::{fmt, mem};

use serde::Serialize;
use thiserror::Error;

use crate::block::{Block, HEADER_SIZE};

/// Policy used to pick a free block for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitStrategy {
  /// Lowest-addressed block that is large enough.
  First,
  /// Smallest block that is large enough; ties go to the lowest address.
  Best,
  /// Largest block in the list, if it is large enough.
  Worst,
}

impl FitStrategy {
  /// Strategy selected by the `best-fit` / `worst-fit` cargo features.
  pub const fn build_default() -> Self {
    if cfg!(feature = "worst-fit") {
      FitStrategy::Worst
    } else if cfg!(feature = "best-fit") {
      FitStrategy::Best
    } else {
      FitStrategy::First
    }
  }
}

impl fmt::Display for FitStrategy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let name = match self {
      FitStrategy::First => "first-fit",
      FitStrategy::Best => "best-fit",
      FitStrategy::Worst => "worst-fit",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("alignment {0} is not a power of two")]
  NotPowerOfTwo(usize),
  #[error("alignment {alignment} is below the header alignment {minimum}")]
  BelowHeaderAlignment { alignment: usize, minimum: usize },
  #[error("alignment {alignment} does not divide the header size {header}")]
  HeaderMisaligned { alignment: usize, header: usize },
}

/// Allocator tunables.
///
/// ```rust
/// use fitalloc::{Config, FitStrategy};
///
/// const CONFIG: Config = Config::new()
///   .with_alignment(16)
///   .with_trim_threshold(4096)
///   .with_fit(FitStrategy::Best);
///
/// assert!(CONFIG.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
  /// Every capacity is rounded up to a multiple of this.
  pub alignment: usize,
  /// Smallest top-of-heap capacity handed back to the OS on release.
  pub trim_threshold: usize,
  pub fit: FitStrategy,
}

impl Config {
  pub const DEFAULT_ALIGNMENT: usize = mem::size_of::<usize>();
  pub const DEFAULT_TRIM_THRESHOLD: usize = 1024;

  pub const fn new() -> Self {
    Self {
      alignment: Self::DEFAULT_ALIGNMENT,
      trim_threshold: Self::DEFAULT_TRIM_THRESHOLD,
      fit: FitStrategy::build_default(),
    }
  }

  pub const fn with_alignment(
    mut self,
    alignment: usize,
  ) -> Self {
    self.alignment = alignment;
    self
  }

  pub const fn with_trim_threshold(
    mut self,
    trim_threshold: usize,
  ) -> Self {
    self.trim_threshold = trim_threshold;
    self
  }

  pub const fn with_fit(
    mut self,
    fit: FitStrategy,
  ) -> Self {
    self.fit = fit;
    self
  }

  /// Checks that block headers carved at any aligned offset stay aligned,
  /// and that payloads (`header + HEADER_SIZE`) keep the unit.
  pub const fn validate(&self) -> Result<(), ConfigError> {
    let alignment = self.alignment;
    if !alignment.is_power_of_two() {
      return Err(ConfigError::NotPowerOfTwo(alignment));
    }
    if alignment < mem::align_of::<Block>() {
      return Err(ConfigError::BelowHeaderAlignment {
        alignment,
        minimum: mem::align_of::<Block>(),
      });
    }
    if HEADER_SIZE % alignment != 0 {
      return Err(ConfigError::HeaderMisaligned {
        alignment,
        header: HEADER_SIZE,
      });
    }
    Ok(())
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
