//! Hub configuration.
//!
//! `HubConfig` controls the limits and defaults of one [`HubRegistry`](crate::hub::HubRegistry).
//! It provides defaults via [`Default`] and a fluent [`HubConfig::builder()`] with validation.
//!
//! # Examples
//!
//! ```rust
//! use portlet_hub::config::HubConfig;
//! use portlet_hub::hub::CacheLevel;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = HubConfig::builder()
//!     .max_portlets(8)
//!     .default_cache_level(CacheLevel::Portlet)
//!     .build()?;
//! assert_eq!(cfg.max_portlets, 8);
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `max_portlets`: Maximum number of portlets that may register (default: 64).
//! - `max_dispatch_depth`: How deeply listener callbacks may nest state change
//!   dispatches before further notifications are dropped (default: 16).
//! - `default_cache_level`: Cache level for resource URLs created without one
//!   (default: `cacheLevelPage`).
//! - `notice_capacity`: Buffer size of the notice bus (default: 256).

use std::fmt;
use crate::hub::CacheLevel;

pub const DEFAULT_NOTICE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_portlets: usize,
    pub max_dispatch_depth: usize,
    pub default_cache_level: CacheLevel,
    pub notice_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_portlets: 64,
            max_dispatch_depth: 16,
            default_cache_level: CacheLevel::Page,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl HubConfig {
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HubConfigBuilder {
    inner: HubConfig,
}

impl HubConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut HubConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn max_portlets(self, n: usize) -> Self { self.map(|c| c.max_portlets = n) }
    pub fn max_dispatch_depth(self, n: usize) -> Self { self.map(|c| c.max_dispatch_depth = n) }
    pub fn default_cache_level(self, level: CacheLevel) -> Self { self.map(|c| c.default_cache_level = level) }
    pub fn notice_capacity(self, n: usize) -> Self { self.map(|c| c.notice_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut HubConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<HubConfig, HubConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum HubConfigError {
    ZeroPortlets,
    ZeroDispatchDepth,
    ZeroNoticeCapacity,
}

impl fmt::Display for HubConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubConfigError::ZeroPortlets => write!(f, "max_portlets must be at least 1"),
            HubConfigError::ZeroDispatchDepth => write!(f, "max_dispatch_depth must be at least 1"),
            HubConfigError::ZeroNoticeCapacity => write!(f, "notice_capacity must be at least 1"),
        }
    }
}
impl std::error::Error for HubConfigError {}

fn validate(c: &HubConfig) -> Result<(), HubConfigError> {
    if c.max_portlets == 0 {
        return Err(HubConfigError::ZeroPortlets);
    }
    if c.max_dispatch_depth == 0 {
        return Err(HubConfigError::ZeroDispatchDepth);
    }
    // tokio's broadcast channel panics on a zero capacity
    if c.notice_capacity == 0 {
        return Err(HubConfigError::ZeroNoticeCapacity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = HubConfig::builder().build().unwrap();
        assert_eq!(cfg.max_portlets, 64);
        assert_eq!(cfg.max_dispatch_depth, 16);
        assert_eq!(cfg.default_cache_level, CacheLevel::Page);
        assert_eq!(cfg.notice_capacity, DEFAULT_NOTICE_CAPACITY);
    }

    #[test]
    fn builder_sets_fields() {
        let cfg = HubConfig::builder()
            .max_portlets(2)
            .max_dispatch_depth(3)
            .default_cache_level(CacheLevel::Full)
            .with(|c| c.notice_capacity = 4)
            .build()
            .unwrap();
        assert_eq!(cfg.max_portlets, 2);
        assert_eq!(cfg.max_dispatch_depth, 3);
        assert_eq!(cfg.default_cache_level, CacheLevel::Full);
        assert_eq!(cfg.notice_capacity, 4);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert_eq!(HubConfig::builder().max_portlets(0).build().unwrap_err(), HubConfigError::ZeroPortlets);
        assert_eq!(
            HubConfig::builder().max_dispatch_depth(0).build().unwrap_err(),
            HubConfigError::ZeroDispatchDepth
        );
        let err = HubConfig::builder().notice_capacity(0).build().unwrap_err();
        assert_eq!(err.to_string(), "notice_capacity must be at least 1");
    }
}
