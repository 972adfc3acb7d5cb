//! Per-token daily spending limits.
//!
//! A day is `timestamp / 86400`. Totals accumulate per token per day and reset
//! implicitly when the day index changes. A token with no configured limit (or a
//! zero limit) is unrestricted. Native value is tracked under the zero address.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::AccountError;

/// Seconds in one limit window.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Token key used for native value.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// Day index for a block timestamp.
pub const fn day_index(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY
}

/// Spend that passed the limit check and has yet to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSpend {
    token: Address,
    day: u64,
    amount: U256,
}

/// Limits and running totals for one account.
#[derive(Debug, Clone, Default)]
pub struct SpendingLimits {
    limits: HashMap<Address, U256>,
    spent: HashMap<(Address, u64), U256>,
}

impl SpendingLimits {
    /// Sets the limit for `token`. Zero removes it.
    pub fn set_limit(&mut self, token: Address, amount: U256) {
        if amount.is_zero() {
            self.limits.remove(&token);
        } else {
            self.limits.insert(token, amount);
        }
    }

    /// Configured limit, zero when unrestricted.
    pub fn limit(&self, token: Address) -> U256 {
        self.limits.get(&token).copied().unwrap_or_default()
    }

    /// Total spent of `token` during `day`.
    pub fn spent(&self, token: Address, day: u64) -> U256 {
        self.spent.get(&(token, day)).copied().unwrap_or_default()
    }

    /// Checks every spend against today's totals without recording anything.
    /// Spends of the same token accumulate before the check.
    pub fn authorize(
        &self,
        spends: &[(Address, U256)],
        timestamp: u64,
    ) -> Result<Vec<PendingSpend>, AccountError> {
        let day = day_index(timestamp);
        let mut pending: Vec<PendingSpend> = Vec::with_capacity(spends.len());
        for &(token, amount) in spends {
            let requested = match pending.iter_mut().find(|p| p.token == token) {
                Some(existing) => {
                    existing.amount = existing.amount.saturating_add(amount);
                    existing.amount
                }
                None => {
                    pending.push(PendingSpend { token, day, amount });
                    amount
                }
            };
            let total = self.spent(token, day).saturating_add(requested);
            let limit = self.limit(token);
            if !limit.is_zero() && total > limit {
                return Err(AccountError::DailyLimitExceeded { token, attempted: total, limit });
            }
        }
        Ok(pending)
    }

    /// Adds spends returned by [`Self::authorize`] onto the day's running totals.
    pub fn commit(&mut self, pending: Vec<PendingSpend>) {
        for spend in pending {
            let spent = self.spent.entry((spend.token, spend.day)).or_default();
            *spent = spent.saturating_add(spend.amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x70);

    #[test]
    fn unrestricted_without_limit() {
        let limits = SpendingLimits::default();
        assert!(limits.authorize(&[(TOKEN, U256::MAX)], 0).is_ok());
    }

    #[test]
    fn accumulates_within_a_day() {
        let mut limits = SpendingLimits::default();
        limits.set_limit(TOKEN, U256::from(100));

        let first = limits.authorize(&[(TOKEN, U256::from(60))], 10).unwrap();
        limits.commit(first);
        assert_eq!(limits.spent(TOKEN, 0), U256::from(60));

        let err = limits.authorize(&[(TOKEN, U256::from(41))], 20).unwrap_err();
        assert_eq!(
            err,
            AccountError::DailyLimitExceeded { token: TOKEN, attempted: U256::from(101), limit: U256::from(100) }
        );
        assert_eq!(limits.spent(TOKEN, 0), U256::from(60));

        limits.commit(limits.authorize(&[(TOKEN, U256::from(40))], 30).unwrap());
        assert_eq!(limits.spent(TOKEN, 0), U256::from(100));
    }

    #[test]
    fn total_resets_on_next_day() {
        let mut limits = SpendingLimits::default();
        limits.set_limit(NATIVE_TOKEN, U256::from(5));
        limits.commit(limits.authorize(&[(NATIVE_TOKEN, U256::from(5))], SECONDS_PER_DAY - 1).unwrap());
        assert!(limits.authorize(&[(NATIVE_TOKEN, U256::from(1))], SECONDS_PER_DAY - 1).is_err());
        assert!(limits.authorize(&[(NATIVE_TOKEN, U256::from(5))], SECONDS_PER_DAY).is_ok());
    }

    #[test]
    fn spends_of_one_call_are_summed() {
        let mut limits = SpendingLimits::default();
        limits.set_limit(TOKEN, U256::from(10));
        let spends = [(TOKEN, U256::from(6)), (NATIVE_TOKEN, U256::from(1)), (TOKEN, U256::from(6))];
        assert!(matches!(
            limits.authorize(&spends, 0),
            Err(AccountError::DailyLimitExceeded { attempted, .. }) if attempted == U256::from(12)
        ));
    }

    #[test]
    fn commit_adds_onto_totals_recorded_in_between() {
        let mut limits = SpendingLimits::default();
        limits.set_limit(TOKEN, U256::from(100));

        let outer = limits.authorize(&[(TOKEN, U256::from(60))], 0).unwrap();
        let inner = limits.authorize(&[(TOKEN, U256::from(30))], 0).unwrap();
        limits.commit(inner);
        limits.commit(outer);

        assert_eq!(limits.spent(TOKEN, 0), U256::from(90));
        assert!(limits.authorize(&[(TOKEN, U256::from(11))], 0).is_err());
    }

    #[test]
    fn zero_limit_clears_restriction() {
        let mut limits = SpendingLimits::default();
        limits.set_limit(TOKEN, U256::from(1));
        limits.set_limit(TOKEN, U256::ZERO);
        assert_eq!(limits.limit(TOKEN), U256::ZERO);
        assert!(limits.authorize(&[(TOKEN, U256::from(2))], 0).is_ok());
    }
}
