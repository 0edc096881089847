// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The task function: plain computation with no orchestration awareness.

use crate::error::TaskError;

/// Sum the numbers, failing on i64 overflow.
pub fn sum_numbers(numbers: &[i64]) -> Result<i64, TaskError> {
    numbers
        .iter()
        .try_fold(0i64, |acc, n| acc.checked_add(*n))
        .ok_or(TaskError::Overflow)
}

/// Whether this attempt must fail on purpose.
pub fn should_fail_attempt(attempt: u32, fail_first_attempt: bool) -> bool {
    fail_first_attempt && attempt == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_numbers() {
        assert_eq!(sum_numbers(&[1, 2, 3]), Ok(6));
        assert_eq!(sum_numbers(&[-5, 5, 7]), Ok(7));
        assert_eq!(sum_numbers(&[]), Ok(0));
    }

    #[test]
    fn test_sum_numbers_overflow() {
        assert_eq!(sum_numbers(&[i64::MAX, 1]), Err(TaskError::Overflow));
    }

    #[test]
    fn test_should_fail_attempt() {
        assert!(should_fail_attempt(1, true));
        assert!(!should_fail_attempt(2, true));
        assert!(!should_fail_attempt(1, false));
    }
}
