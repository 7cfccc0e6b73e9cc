// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! When a property getter goes back to hardware.

/// Device-wide getter policy, selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Serve cached values once the initial read has happened.
    #[default]
    CachedAfterInit,
    /// Re-query hardware on every get.
    Always,
}

/// Per-call override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    Cached,
    ForceImmediate,
}

impl RefreshPolicy {
    /// Whether a get must hit the hardware.
    ///
    /// A value that has never been read is always fetched.
    pub fn needs_query(self, mode: RefreshMode, has_cached: bool) -> bool {
        !has_cached || mode == RefreshMode::ForceImmediate || self == RefreshPolicy::Always
    }
}

impl From<bool> for RefreshPolicy {
    fn from(always: bool) -> Self {
        if always {
            RefreshPolicy::Always
        } else {
            RefreshPolicy::CachedAfterInit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_query() {
        let cached = RefreshPolicy::CachedAfterInit;
        assert!(cached.needs_query(RefreshMode::Cached, false));
        assert!(!cached.needs_query(RefreshMode::Cached, true));
        assert!(cached.needs_query(RefreshMode::ForceImmediate, true));
        assert!(RefreshPolicy::Always.needs_query(RefreshMode::Cached, true));
    }
}
