#![doc = include_str!("../README.md")]

pub mod builder;
pub mod bundler;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod fees;
pub mod metrics;
pub mod paymaster;
pub mod poller;
pub mod receipt;
pub mod rpc;
pub mod signer;

pub use builder::OperationBuilder;
pub use bundler::{BundlerClient, FeeFloor, SubmitOutcome};
pub use chain::ChainStateLookup;
pub use config::EngineConfig;
pub use engine::{SubmissionEngine, SubmissionReport, SubmissionState};
pub use error::{ChainError, EngineError, RpcCallError, SignerError};
pub use fees::FeePolicy;
pub use paymaster::{PaymasterClient, SponsorResult};
pub use poller::{PollOutcome, ReceiptPoller, ReceiptSource};
pub use receipt::UserOperationReceipt;
pub use rpc::{JsonRpcClient, RpcErrorObject};
pub use signer::{LocalP256Signer, LocalSecp256k1Signer, OperationSigner};
