//! ABI shapes for the account, token, factory and EntryPoint surfaces.
//!
//! Everything is encoded with 32-byte words: integers and addresses are
//! left-padded, dynamic `bytes` are an offset word followed (in the tail) by a
//! length word and the right-padded payload. `executeBatch` adds one more level:
//! an offset table with one word per element, each offset relative to the start
//! of the table.

use alloy_primitives::{Address, B256, Bytes, Selector, U256};
use alloy_sol_types::{SolCall, sol};

sol! {
    /// One element of an `executeBatch` call.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct Call {
        address target;
        uint256 value;
        bytes data;
    }

    /// Entry points exposed by the smart account.
    interface ISmartAccount {
        function execute(address dest, uint256 value, bytes func) external;
        function executeBatch(Call[] calls) external;
        function setDailyLimit(address token, uint256 amount) external;
        function setSigner(address signer, bool authorized) external;
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);

        #[derive(Debug, PartialEq, Eq)]
        error DailyLimitExceeded(address token, uint256 attempted, uint256 limit);
        #[derive(Debug, PartialEq, Eq)]
        error NotAuthorized(address caller);
        #[derive(Debug, PartialEq, Eq)]
        error InvalidSignatureLength(uint256 length);
    }

    /// The two token entry points the decoder and the spend limiter understand.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Counterfactual account factory.
    interface IAccountFactory {
        function createAccount(uint256 x, uint256 y, uint256 salt) external returns (address account);
        function createAccountWithOwner(address owner, uint256 salt) external returns (address account);
        function getAddress(uint256 x, uint256 y, uint256 salt) external view returns (address account);
    }

    /// Nonce registrar view on the EntryPoint.
    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

/// What the account should do once the operation is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCall {
    /// A single `execute(dest, value, data)`.
    Single {
        /// Call destination.
        to: Address,
        /// Native value forwarded with the call.
        value: U256,
        /// Inner calldata, empty for a plain value transfer.
        data: Bytes,
    },
    /// An `executeBatch` over several calls.
    Batch(Vec<Call>),
}

impl AccountCall {
    /// Native value transfer with no inner calldata.
    pub const fn transfer(to: Address, value: U256) -> Self {
        Self::Single { to, value, data: Bytes::new() }
    }

    /// ERC-20 `transfer` routed through `execute`.
    pub fn erc20_transfer(token: Address, to: Address, amount: U256) -> Self {
        Self::Single { to: token, value: U256::ZERO, data: encode_erc20_transfer(to, amount) }
    }

    /// ERC-20 `approve` routed through `execute`.
    pub fn erc20_approve(token: Address, spender: Address, amount: U256) -> Self {
        Self::Single { to: token, value: U256::ZERO, data: encode_erc20_approve(spender, amount) }
    }

    /// Encodes the account-level calldata for this call.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Single { to, value, data } => encode_execute(*to, *value, data.clone()),
            Self::Batch(calls) => encode_execute_batch(calls.clone()),
        }
    }
}

/// `execute(dest, value, func)`.
pub fn encode_execute(dest: Address, value: U256, func: Bytes) -> Bytes {
    ISmartAccount::executeCall { dest, value, func }.abi_encode().into()
}

/// `executeBatch(calls)`.
pub fn encode_execute_batch(calls: Vec<Call>) -> Bytes {
    ISmartAccount::executeBatchCall { calls }.abi_encode().into()
}

/// `setDailyLimit(token, amount)`. Only effective when the account calls itself.
pub fn encode_set_daily_limit(token: Address, amount: U256) -> Bytes {
    ISmartAccount::setDailyLimitCall { token, amount }.abi_encode().into()
}

/// `setSigner(signer, authorized)`. Only effective when the account calls itself.
pub fn encode_set_signer(signer: Address, authorized: bool) -> Bytes {
    ISmartAccount::setSignerCall { signer, authorized }.abi_encode().into()
}

/// ERC-20 `transfer(to, amount)`.
pub fn encode_erc20_transfer(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

/// ERC-20 `approve(spender, amount)`.
pub fn encode_erc20_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

/// Leading four bytes of `data`, if there are at least four.
pub fn selector_of(data: &[u8]) -> Option<Selector> {
    data.get(..4).map(Selector::from_slice)
}

/// Packs two 128-bit quantities into one word, `hi` in the upper half.
pub fn pack_u128_pair(hi: u128, lo: u128) -> B256 {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&hi.to_be_bytes());
    word[16..].copy_from_slice(&lo.to_be_bytes());
    B256::from(word)
}

/// Inverse of [`pack_u128_pair`].
pub fn unpack_u128_pair(word: B256) -> (u128, u128) {
    let mut hi = [0u8; 16];
    let mut lo = [0u8; 16];
    hi.copy_from_slice(&word[..16]);
    lo.copy_from_slice(&word[16..]);
    (u128::from_be_bytes(hi), u128::from_be_bytes(lo))
}
