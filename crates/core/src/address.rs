//! Counterfactual account addresses.
//!
//! `address = keccak(0xff ‖ factory ‖ salt ‖ keccak(creationCode ‖ constructorArgs))[12..]`
//! where the salt is the account index as a 32-byte big-endian word.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolValue};

use crate::{
    abi::IAccountFactory,
    types::{AccountIdentity, KeyMaterial},
    user_operation::DeploymentPayload,
};

/// Derives account addresses and deployment payloads for one factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDeriver {
    factory: Address,
    entry_point: Address,
    account_creation_code: Bytes,
}

impl AddressDeriver {
    /// Deriver for accounts deployed by `factory`, bound to `entry_point`.
    pub const fn new(factory: Address, entry_point: Address, account_creation_code: Bytes) -> Self {
        Self { factory, entry_point, account_creation_code }
    }

    /// Factory contract address.
    pub const fn factory(&self) -> Address {
        self.factory
    }

    /// ABI-encoded constructor arguments for an account bound to `key`.
    pub fn constructor_args(&self, key: &KeyMaterial) -> Vec<u8> {
        match *key {
            KeyMaterial::P256 { x, y } => (self.entry_point, x, y).abi_encode(),
            KeyMaterial::Secp256k1 { owner } => (self.entry_point, owner).abi_encode(),
        }
    }

    /// Hash of the creation code with constructor arguments appended.
    pub fn init_code_hash(&self, key: &KeyMaterial) -> B256 {
        let args = self.constructor_args(key);
        let mut code = Vec::with_capacity(self.account_creation_code.len() + args.len());
        code.extend_from_slice(&self.account_creation_code);
        code.extend_from_slice(&args);
        keccak256(code)
    }

    /// CREATE2 salt for an account index.
    pub fn salt(index: u64) -> B256 {
        B256::from(U256::from(index))
    }

    /// Address the factory will deploy the account to.
    pub fn derive(&self, key: &KeyMaterial, index: u64) -> Address {
        self.factory.create2(Self::salt(index).0, self.init_code_hash(key).0)
    }

    /// Identity for a freshly derived, not yet deployed account.
    pub fn identity(&self, key: KeyMaterial, index: u64) -> AccountIdentity {
        AccountIdentity { index, address: self.derive(&key, index), key, deployed: false }
    }

    /// Factory call that deploys the account.
    pub fn deployment_payload(&self, key: &KeyMaterial, index: u64) -> DeploymentPayload {
        let salt = U256::from(index);
        let factory_data = match *key {
            KeyMaterial::P256 { x, y } => {
                IAccountFactory::createAccountCall { x, y, salt }.abi_encode()
            }
            KeyMaterial::Secp256k1 { owner } => {
                IAccountFactory::createAccountWithOwnerCall { owner, salt }.abi_encode()
            }
        };
        DeploymentPayload { factory: self.factory, factory_data: factory_data.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes, hex};

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(
            address!("9406cc6185a346906296840746125a0e44976454"),
            address!("0000000071727de22e5e9d8baf0edac6f37da032"),
            bytes!("60806040"),
        )
    }

    const P256_KEY: KeyMaterial = KeyMaterial::P256 { x: U256::from_limbs([1, 0, 0, 0]), y: U256::from_limbs([2, 0, 0, 0]) };

    #[test]
    fn golden_p256_address() {
        let deriver = deriver();
        assert_eq!(
            deriver.init_code_hash(&P256_KEY),
            b256!("36a0a8003d0ee92a2cccafc1965c85b73def597fe84db8675d369b3b97392ed9")
        );
        assert_eq!(deriver.derive(&P256_KEY, 0), address!("3da87594fc57c042af7484660b911a30f9459ea8"));
        assert_eq!(deriver.derive(&P256_KEY, 1), address!("db1301df3a01c96e76617d938aa4c73c5c641abe"));
    }

    #[test]
    fn golden_owner_address() {
        let key = KeyMaterial::Secp256k1 { owner: address!("00000000000000000000000000000000000000aa") };
        assert_eq!(deriver().derive(&key, 0), address!("50c754ba6f0a668c9c4c076081c50a6713162f92"));
    }

    #[test]
    fn derivation_is_stable_and_input_sensitive() {
        let deriver = deriver();
        let base = deriver.derive(&P256_KEY, 7);
        assert_eq!(deriver.derive(&P256_KEY, 7), base);
        assert_ne!(deriver.derive(&P256_KEY, 8), base);

        let other_x = KeyMaterial::P256 { x: U256::from(3), y: U256::from(2) };
        let other_y = KeyMaterial::P256 { x: U256::from(1), y: U256::from(3) };
        assert_ne!(deriver.derive(&other_x, 7), base);
        assert_ne!(deriver.derive(&other_y, 7), base);
    }

    #[test]
    fn deployment_payload_calls_create_account() {
        let payload = deriver().deployment_payload(&P256_KEY, 5);
        assert_eq!(payload.factory, deriver().factory());
        assert_eq!(&payload.factory_data[..4], &hex!("4c1ed7f5"));
        let call = IAccountFactory::createAccountCall::abi_decode(&payload.factory_data).unwrap();
        assert_eq!(call.x, U256::from(1));
        assert_eq!(call.salt, U256::from(5));
    }
}
