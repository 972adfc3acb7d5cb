//! Engine configuration.
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use keyrelay_core::{AddressDeriver, HashScheme, OperationHasher};

use crate::{
    builder::{DEFAULT_DEPLOYMENT_VERIFICATION_GAS_MULTIPLIER, OperationBuilder},
    error::EngineError,
    fees::FeePolicy,
    poller::ReceiptPoller,
};

/// Everything a [`SubmissionEngine`](crate::SubmissionEngine) needs besides its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// EntryPoint the operations target.
    pub entry_point: Address,
    /// Chain id bound into operation hashes.
    pub chain_id: u64,
    /// Account factory.
    pub factory: Address,
    /// Account creation code used for address derivation.
    pub account_creation_code: Bytes,
    /// Operation hash binding.
    pub hash_scheme: HashScheme,
    /// Time between receipt lookups.
    pub poll_interval: Duration,
    /// Deadline for a receipt after acceptance.
    pub poll_timeout: Duration,
    /// Replacement bid policy.
    pub fee_policy: FeePolicy,
    /// Factor applied to verification gas when deploying.
    pub deployment_verification_gas_multiplier: u64,
    /// Automatic fee replacements per submission.
    pub max_fee_replacements: u32,
}

impl EngineConfig {
    /// Config with default polling, fee and gas settings.
    pub const fn new(
        entry_point: Address,
        chain_id: u64,
        factory: Address,
        account_creation_code: Bytes,
    ) -> Self {
        Self {
            entry_point,
            chain_id,
            factory,
            account_creation_code,
            hash_scheme: HashScheme::TypeTagged,
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(60),
            fee_policy: FeePolicy { bump_percent: 125 },
            deployment_verification_gas_multiplier: DEFAULT_DEPLOYMENT_VERIFICATION_GAS_MULTIPLIER,
            max_fee_replacements: 1,
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.fee_policy.bump_percent <= 100 {
            return Err(EngineError::InvalidConfig(format!(
                "fee bump must exceed 100%, got {}%",
                self.fee_policy.bump_percent
            )));
        }
        if self.deployment_verification_gas_multiplier == 0 {
            return Err(EngineError::InvalidConfig("deployment multiplier must be at least 1".into()));
        }
        if self.poll_interval.is_zero() || self.poll_timeout < self.poll_interval {
            return Err(EngineError::InvalidConfig(format!(
                "poll interval {:?} must be non-zero and within timeout {:?}",
                self.poll_interval, self.poll_timeout
            )));
        }
        Ok(())
    }

    /// Hasher for this EntryPoint and chain.
    pub const fn hasher(&self) -> OperationHasher {
        OperationHasher::new(self.entry_point, self.chain_id).with_scheme(self.hash_scheme)
    }

    /// Address deriver for this factory.
    pub fn deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.factory, self.entry_point, self.account_creation_code.clone())
    }

    /// Operation builder for this config.
    pub fn builder(&self) -> OperationBuilder {
        OperationBuilder::new(self.hasher(), self.deriver())
            .with_deployment_multiplier(self.deployment_verification_gas_multiplier)
    }

    /// Receipt poller for this config.
    pub const fn poller(&self) -> ReceiptPoller {
        ReceiptPoller::new(self.poll_interval, self.poll_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(Address::repeat_byte(1), 8453, Address::repeat_byte(2), Bytes::new())
    }

    #[test]
    fn defaults_are_valid() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_fee_replacements, 1);
        assert_eq!(config.deployment_verification_gas_multiplier, 10);
    }

    #[test]
    fn rejects_non_increasing_bump() {
        let mut config = config();
        config.fee_policy.bump_percent = 100;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_interval_longer_than_timeout() {
        let mut config = config();
        config.poll_interval = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }
}
