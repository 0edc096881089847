// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Attempt reporting over activity heartbeats.
//!
//! An attempt publishes its own number as the single heartbeat detail
//! (`[attempt]`) before starting real work, so status queries can show which
//! attempt is in flight. [`decode_attempt`] is the reading side.

use tracing::debug;

use crate::activity::ActivityContext;

/// Publishes the current attempt number through the activity heartbeat.
pub struct AttemptReporter<'a> {
    ctx: &'a ActivityContext,
}

impl<'a> AttemptReporter<'a> {
    /// Create a reporter for the given attempt context.
    pub fn new(ctx: &'a ActivityContext) -> Self {
        Self { ctx }
    }

    /// Heartbeat the attempt number and return it.
    pub fn report(&self) -> u32 {
        let attempt = self.ctx.attempt();
        self.ctx.heartbeat(&attempt);
        debug!(job_id = %self.ctx.info().job_id, attempt, "Attempt reported");
        attempt
    }
}

/// Decode the attempt number from heartbeat details.
///
/// Returns `None` when there are no details or the first detail is not a
/// positive integer.
pub fn decode_attempt(details: &[serde_json::Value]) -> Option<u32> {
    details
        .first()?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_attempt() {
        assert_eq!(decode_attempt(&[json!(2)]), Some(2));
        assert_eq!(decode_attempt(&[json!(4), json!("extra")]), Some(4));
    }

    #[test]
    fn test_decode_attempt_rejects_bad_details() {
        assert_eq!(decode_attempt(&[]), None);
        assert_eq!(decode_attempt(&[json!(0)]), None);
        assert_eq!(decode_attempt(&[json!(-1)]), None);
        assert_eq!(decode_attempt(&[json!("2")]), None);
        assert_eq!(decode_attempt(&[json!(u64::MAX)]), None);
    }
}
