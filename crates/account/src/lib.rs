#![doc = include_str!("../README.md")]

pub mod account;
pub use account::{
    ERC1271_INVALID, ERC1271_MAGIC_VALUE, SIG_VALIDATION_FAILED, SmartAccount, VALIDATION_SUCCESS,
};

pub mod entry_point;
pub use entry_point::{EntryPointError, EntryPointSimulator, ExecutionResult};

pub mod error;
pub use error::AccountError;

pub mod factory;
pub use factory::AccountFactory;

pub mod ledger;
pub use ledger::{Code, Ledger};

pub mod limits;
pub use limits::{NATIVE_TOKEN, SECONDS_PER_DAY, SpendingLimits, day_index};

pub mod verifier;
pub use verifier::{
    FALLBACK_P256_VERIFIER, MissingVerifier, NativeP256Verifier, P256_PRECOMPILE, P256Verifier,
    VerifierSet,
};
