// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bounded busy waiting on hardware status bits.
//!
//! Usage: wait for the INAK bit in the CAN MSR register to be set, checking at
//! most `CONFIG.can_inak_timeout` times.
//!
//! ```ignore
//! poll::wait_until(CONFIG.can_inak_timeout, || regs.msr.is_set(MSR::INAK))?;
//! ```

use crate::ErrorCode;

/// Check `condition` up to `times` times. Returns `true` as soon as it holds.
#[inline]
pub fn wait_for(times: usize, condition: impl Fn() -> bool) -> bool {
    for _ in 0..times {
        if condition() {
            return true;
        }
        core::hint::spin_loop();
    }

    false
}

/// Like [`wait_for`], but reports an exhausted budget as `ErrorCode::BUSY`.
#[inline]
pub fn wait_until(times: usize, condition: impl Fn() -> bool) -> Result<(), ErrorCode> {
    if wait_for(times, condition) {
        Ok(())
    } else {
        Err(ErrorCode::BUSY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn returns_once_condition_holds() {
        let polls = Cell::new(0);
        let result = wait_until(10, || {
            polls.set(polls.get() + 1);
            polls.get() == 3
        });
        assert_eq!(Ok(()), result);
        assert_eq!(3, polls.get());
    }

    #[test]
    fn exhausted_budget_is_busy() {
        let polls = Cell::new(0);
        let result = wait_until(5, || {
            polls.set(polls.get() + 1);
            false
        });
        assert_eq!(Err(ErrorCode::BUSY), result);
        assert_eq!(5, polls.get());
    }

    #[test]
    fn zero_budget_never_checks() {
        assert!(!wait_for(0, || true));
    }
}
