//! Counterfactual account factory.
use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use keyrelay_core::{AddressDeriver, KeyMaterial, abi::IAccountFactory, abi::selector_of};
use tracing::info;

use crate::{
    account::SmartAccount,
    error::AccountError,
    ledger::{Code, Ledger},
    verifier::VerifierSet,
};

/// Deploys accounts to their CREATE2 addresses and keeps the deployed set.
#[derive(Debug, Clone)]
pub struct AccountFactory {
    deriver: AddressDeriver,
    entry_point: Address,
    verifier: Arc<VerifierSet>,
    accounts: HashMap<Address, SmartAccount>,
}

impl AccountFactory {
    /// Factory whose accounts trust `entry_point`.
    pub fn new(deriver: AddressDeriver, entry_point: Address, verifier: Arc<VerifierSet>) -> Self {
        Self { deriver, entry_point, verifier, accounts: HashMap::new() }
    }

    /// Factory contract address.
    pub const fn address(&self) -> Address {
        self.deriver.factory()
    }

    /// Deployed account at `address`.
    pub fn account(&self, address: Address) -> Option<&SmartAccount> {
        self.accounts.get(&address)
    }

    /// Mutable deployed account at `address`.
    pub fn account_mut(&mut self, address: Address) -> Option<&mut SmartAccount> {
        self.accounts.get_mut(&address)
    }

    /// Where `create_account` deploys for this key and salt.
    pub fn get_address(&self, key: &KeyMaterial, salt: U256) -> Result<Address, AccountError> {
        Ok(self.deriver.derive(key, index_from_salt(salt)?))
    }

    /// Deploys the account, or returns it unchanged when it already exists.
    pub fn create_account(
        &mut self,
        ledger: &mut Ledger,
        key: KeyMaterial,
        salt: U256,
    ) -> Result<Address, AccountError> {
        let address = self.get_address(&key, salt)?;
        if ledger.has_code(address) {
            return Ok(address);
        }
        ledger.install(address, Code::Account);
        self.accounts
            .insert(address, SmartAccount::new(address, self.entry_point, key, Arc::clone(&self.verifier)));
        info!(message = "account deployed", %address, key_type = ?key.key_type());
        Ok(address)
    }

    /// Dispatches factory calldata, returning the ABI-encoded result.
    pub fn handle_call(&mut self, ledger: &mut Ledger, data: &[u8]) -> Result<Bytes, AccountError> {
        let bad_calldata = |_| AccountError::CallReverted(Bytes::new());
        let address = match selector_of(data).map(|selector| selector.0) {
            Some(IAccountFactory::createAccountCall::SELECTOR) => {
                let call = IAccountFactory::createAccountCall::abi_decode(data).map_err(bad_calldata)?;
                self.create_account(ledger, KeyMaterial::P256 { x: call.x, y: call.y }, call.salt)?
            }
            Some(IAccountFactory::createAccountWithOwnerCall::SELECTOR) => {
                let call =
                    IAccountFactory::createAccountWithOwnerCall::abi_decode(data).map_err(bad_calldata)?;
                self.create_account(ledger, KeyMaterial::Secp256k1 { owner: call.owner }, call.salt)?
            }
            Some(IAccountFactory::getAddressCall::SELECTOR) => {
                let call = IAccountFactory::getAddressCall::abi_decode(data).map_err(bad_calldata)?;
                self.get_address(&KeyMaterial::P256 { x: call.x, y: call.y }, call.salt)?
            }
            _ => return Err(AccountError::CallReverted(Bytes::new())),
        };
        Ok(address.abi_encode().into())
    }
}

fn index_from_salt(salt: U256) -> Result<u64, AccountError> {
    u64::try_from(salt).map_err(|_| AccountError::reason("salt out of range"))
}
