//! Operation hashing, matching the EntryPoint's `getUserOpHash`.
use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::{SolValue, sol};
use serde::{Deserialize, Serialize};

use crate::user_operation::UserOperation;

sol! {
    struct PackedUserOperationStruct {
        bytes32 userOpTypeHash;
        address sender;
        uint256 nonce;
        bytes32 initCodeHash;
        bytes32 callDataHash;
        bytes32 accountGasLimits;
        uint256 preVerificationGas;
        bytes32 gasFees;
        bytes32 paymasterAndDataHash;
    }

    struct DomainSeparatorData {
        bytes32 typeHash;
        bytes32 nameHash;
        bytes32 versionHash;
        uint256 chainId;
        address verifyingContract;
    }
}

/// Type string whose hash tags the inner struct hash.
pub const USEROP_TYPEHASH: &str = "PackedUserOperation(address sender,uint256 nonce,bytes initCode,bytes callData,bytes32 accountGasLimits,uint256 preVerificationGas,bytes32 gasFees,bytes paymasterAndData)";
/// EIP-712 domain type string, used only by [`HashScheme::TypedData`].
pub const EIP712_DOMAIN_TYPEHASH: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const DOMAIN_NAME: &str = "ERC4337";
const DOMAIN_VERSION: &str = "1";

/// How the struct hash is bound to the EntryPoint and chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashScheme {
    /// `keccak(abi.encode(structHash, entryPoint, chainId))`.
    #[default]
    TypeTagged,
    /// `keccak(0x1901 ‖ domainSeparator ‖ structHash)`.
    TypedData,
}

/// Computes operation hashes for one EntryPoint on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationHasher {
    entry_point: Address,
    chain_id: u64,
    scheme: HashScheme,
}

impl OperationHasher {
    /// Hasher using the default [`HashScheme::TypeTagged`] binding.
    pub const fn new(entry_point: Address, chain_id: u64) -> Self {
        Self { entry_point, chain_id, scheme: HashScheme::TypeTagged }
    }

    /// Overrides the binding scheme.
    pub const fn with_scheme(mut self, scheme: HashScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// EntryPoint the hashes are bound to.
    pub const fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Chain id the hashes are bound to.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Inner hash over the type tag and the operation fields. The signature is excluded
    /// and variable-length fields are replaced by their own hash.
    pub fn struct_hash(&self, op: &UserOperation) -> B256 {
        let packed = PackedUserOperationStruct {
            userOpTypeHash: keccak256(USEROP_TYPEHASH.as_bytes()),
            sender: op.sender,
            nonce: op.nonce,
            initCodeHash: keccak256(op.init_code()),
            callDataHash: keccak256(&op.call_data),
            accountGasLimits: op.account_gas_limits(),
            preVerificationGas: U256::from(op.pre_verification_gas),
            gasFees: op.gas_fees(),
            paymasterAndDataHash: keccak256(op.paymaster_and_data()),
        };
        keccak256(packed.abi_encode())
    }

    /// The digest the account verifies and the relay reports as the operation id.
    pub fn operation_hash(&self, op: &UserOperation) -> B256 {
        let struct_hash = self.struct_hash(op);
        match self.scheme {
            HashScheme::TypeTagged => keccak256(
                (struct_hash, self.entry_point, U256::from(self.chain_id)).abi_encode(),
            ),
            HashScheme::TypedData => {
                to_typed_data_hash(self.domain_separator(), struct_hash)
            }
        }
    }

    /// EIP-712 domain separator for this EntryPoint and chain.
    pub fn domain_separator(&self) -> B256 {
        let data = DomainSeparatorData {
            typeHash: keccak256(EIP712_DOMAIN_TYPEHASH.as_bytes()),
            nameHash: keccak256(DOMAIN_NAME.as_bytes()),
            versionHash: keccak256(DOMAIN_VERSION.as_bytes()),
            chainId: U256::from(self.chain_id),
            verifyingContract: self.entry_point,
        };
        keccak256(data.abi_encode())
    }
}

/// `keccak(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`.
pub fn to_typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut enc = [0u8; 66];
    enc[0] = 0x19;
    enc[1] = 0x01;
    enc[2..34].copy_from_slice(domain_separator.as_slice());
    enc[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(enc)
}
