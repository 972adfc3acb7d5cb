//! Fee replacement policy.
use keyrelay_core::Fees;
use serde::{Deserialize, Serialize};

use crate::bundler::FeeFloor;

/// How far above the relay's floor a replacement bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Percentage applied to each floor value. Must be above 100.
    pub bump_percent: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { bump_percent: 125 }
    }
}

impl FeePolicy {
    /// Fees for a replacement. Each value is strictly above its floor and never
    /// below what the operation already offered. The max fee is raised to cover
    /// the priority fee when the floor's priority outruns it.
    pub fn bump(&self, current: Fees, floor: FeeFloor) -> Fees {
        let max_priority_fee_per_gas =
            self.raise(floor.current_max_priority_fee).max(current.max_priority_fee_per_gas);
        let max_fee_per_gas = self
            .raise(floor.current_max_fee)
            .max(current.max_fee_per_gas)
            .max(max_priority_fee_per_gas);
        Fees { max_fee_per_gas, max_priority_fee_per_gas }
    }

    fn raise(&self, value: u128) -> u128 {
        let scaled = value.saturating_mul(u128::from(self.bump_percent)) / 100;
        scaled.max(value.saturating_add(1))
    }
}

/// Whether `fees` outbid `floor` on both components.
pub const fn exceeds_floor(fees: Fees, floor: FeeFloor) -> bool {
    fees.max_fee_per_gas > floor.current_max_fee
        && fees.max_priority_fee_per_gas > floor.current_max_priority_fee
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn floor(max: u128, prio: u128) -> FeeFloor {
        FeeFloor { current_max_fee: max, current_max_priority_fee: prio }
    }

    #[test]
    fn bumps_by_percentage() {
        let fees = FeePolicy::default().bump(Fees::default(), floor(1_000, 100));
        assert_eq!(fees, Fees { max_fee_per_gas: 1_250, max_priority_fee_per_gas: 125 });
        assert!(exceeds_floor(fees, floor(1_000, 100)));
    }

    #[test]
    fn tiny_floors_still_increase() {
        let fees = FeePolicy::default().bump(Fees::default(), floor(1, 0));
        assert_eq!(fees, Fees { max_fee_per_gas: 2, max_priority_fee_per_gas: 1 });
        assert!(exceeds_floor(fees, floor(1, 0)));
    }

    #[test]
    fn never_lowers_current_fees() {
        let current = Fees { max_fee_per_gas: 5_000, max_priority_fee_per_gas: 400 };
        let fees = FeePolicy::default().bump(current, floor(1_000, 100));
        assert_eq!(fees, current);
    }

    #[test]
    fn equal_floors_bump_together() {
        let fees = FeePolicy { bump_percent: 200 }.bump(Fees::default(), floor(10, 10));
        assert_eq!(fees.max_fee_per_gas, 20);
        assert_eq!(fees.max_priority_fee_per_gas, 20);
        assert!(exceeds_floor(fees, floor(10, 10)));
    }

    #[test]
    fn priority_floor_above_max_floor_lifts_max_fee() {
        let fees = FeePolicy::default().bump(Fees::default(), floor(10, 50));
        assert_eq!(fees, Fees { max_fee_per_gas: 62, max_priority_fee_per_gas: 62 });
        assert!(exceeds_floor(fees, floor(10, 50)));

        let current = Fees { max_fee_per_gas: 30, max_priority_fee_per_gas: 100 };
        let fees = FeePolicy::default().bump(current, floor(20, 90));
        assert_eq!(fees, Fees { max_fee_per_gas: 112, max_priority_fee_per_gas: 112 });
        assert!(exceeds_floor(fees, floor(20, 90)));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let fees = FeePolicy::default().bump(Fees::default(), floor(u128::MAX - 1, 1));
        assert_eq!(fees.max_fee_per_gas, u128::MAX);
    }
}
