// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window request throttle keyed by caller.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CallerId;

/// Default requests allowed per caller per window.
pub const DEFAULT_LIMIT: u32 = 100;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Per-caller window state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: TimeDelta,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: TimeDelta::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    counters: HashMap<CallerId, RateLimitCounter>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            counters: HashMap::new(),
        }
    }

    /// Count one request for `caller` at `now`.
    ///
    /// Returns `false` without counting once the window's limit is reached.
    /// A request after the window has elapsed opens a new window at count 1.
    pub fn check_and_increment(&mut self, caller: &str, now: DateTime<Utc>) -> bool {
        if self.policy.limit == 0 {
            return false;
        }

        match self.counters.get_mut(caller) {
            Some(counter) if now > counter.window_start + self.policy.window => {
                counter.window_start = now;
                counter.count = 1;
                true
            }
            Some(counter) if counter.count >= self.policy.limit => false,
            Some(counter) => {
                counter.count += 1;
                true
            }
            None => {
                self.counters.insert(
                    caller.to_string(),
                    RateLimitCounter {
                        window_start: now,
                        count: 1,
                    },
                );
                true
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn counter(&self, caller: &str) -> Option<RateLimitCounter> {
        self.counters.get(caller).copied()
    }

    pub fn counters(&self) -> impl Iterator<Item = (&CallerId, &RateLimitCounter)> {
        self.counters.iter()
    }

    pub fn restore(&mut self, caller: CallerId, counter: RateLimitCounter) {
        self.counters.insert(caller, counter);
    }

    /// Forget counters whose window has elapsed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let window = self.policy.window;
        let before = self.counters.len();
        self.counters.retain(|_, c| now <= c.window_start + window);
        before - self.counters.len()
    }
}
