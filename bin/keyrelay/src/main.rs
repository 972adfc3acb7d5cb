//! Command line front end for counterfactual addresses, call decoding and submission.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::RootProvider;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyrelay_client::{
    BundlerClient, EngineConfig, LocalP256Signer, LocalSecp256k1Signer, OperationSigner,
    PaymasterClient, SubmissionEngine,
};
use keyrelay_core::{AccountCall, HashScheme, KeyMaterial, decode_call_data, logger::{LogFormat, init_logger}};
use serde_json::json;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "keyrelay")]
#[command(about = "Derive, inspect and submit operations for keyrelay smart accounts")]
struct Cli {
    #[arg(long, env = "KEYRELAY_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// `text` or `json`
    #[arg(long, env = "KEYRELAY_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    network: NetworkArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct NetworkArgs {
    /// EntryPoint contract
    #[arg(long, env = "KEYRELAY_ENTRY_POINT", default_value = "0x0000000071727De22E5E9d8BAf0edAc6f37da032", global = true)]
    entry_point: Address,

    #[arg(long, env = "KEYRELAY_CHAIN_ID", default_value = "8453", global = true)]
    chain_id: u64,

    /// Account factory
    #[arg(long, env = "KEYRELAY_FACTORY", global = true)]
    factory: Option<Address>,

    /// Account creation code, hex
    #[arg(long, env = "KEYRELAY_ACCOUNT_CREATION_CODE", global = true)]
    account_creation_code: Option<Bytes>,

    #[arg(long, env = "KEYRELAY_HASH_SCHEME", value_enum, default_value = "type-tagged", global = true)]
    hash_scheme: SchemeArg,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SchemeArg {
    TypeTagged,
    TypedData,
}

impl From<SchemeArg> for HashScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::TypeTagged => Self::TypeTagged,
            SchemeArg::TypedData => Self::TypedData,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the counterfactual address for a key
    Address {
        #[command(flatten)]
        key: KeyArgs,

        #[arg(long, default_value = "0")]
        index: u64,
    },
    /// Decode account calldata into actions
    Decode {
        call_data: Bytes,
    },
    /// Build, sign, submit and wait for a transfer
    Send(SendArgs),
    /// List the EntryPoints a bundler supports
    EntryPoints {
        #[arg(long, env = "KEYRELAY_BUNDLER_URL")]
        bundler_url: Url,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
struct KeyArgs {
    /// P-256 public key x coordinate
    #[arg(long, requires = "p256_y", conflicts_with = "owner")]
    p256_x: Option<U256>,

    /// P-256 public key y coordinate
    #[arg(long, requires = "p256_x")]
    p256_y: Option<U256>,

    /// secp256k1 owner address
    #[arg(long)]
    owner: Option<Address>,
}

impl KeyArgs {
    fn material(&self) -> Result<KeyMaterial> {
        match (self.p256_x, self.p256_y, self.owner) {
            (Some(x), Some(y), None) => Ok(KeyMaterial::P256 { x, y }),
            (None, None, Some(owner)) => Ok(KeyMaterial::Secp256k1 { owner }),
            _ => bail!("pass either --p256-x/--p256-y or --owner"),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    P256,
    Secp256k1,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(long, env = "KEYRELAY_BUNDLER_URL")]
    bundler_url: Url,

    /// Node used for code, nonce and fee lookups
    #[arg(long, env = "KEYRELAY_RPC_URL")]
    rpc_url: Url,

    #[arg(long, env = "KEYRELAY_PAYMASTER_URL")]
    paymaster_url: Option<Url>,

    #[arg(long, env = "KEYRELAY_KEY_TYPE", value_enum, default_value = "p256")]
    key_type: KeyKind,

    #[arg(long, env = "KEYRELAY_PRIVATE_KEY", hide_env_values = true)]
    private_key: B256,

    #[arg(long, default_value = "0")]
    index: u64,

    #[arg(long)]
    to: Address,

    /// Wei, or token units with --token
    #[arg(long)]
    value: U256,

    /// ERC-20 token to transfer instead of native value
    #[arg(long)]
    token: Option<Address>,

    #[arg(long, env = "KEYRELAY_POLL_TIMEOUT_SECONDS", default_value = "60")]
    poll_timeout_seconds: u64,
}

impl NetworkArgs {
    fn engine_config(&self) -> Result<EngineConfig> {
        let factory = self.factory.context("--factory is required")?;
        let creation_code =
            self.account_creation_code.clone().context("--account-creation-code is required")?;
        let mut config = EngineConfig::new(self.entry_point, self.chain_id, factory, creation_code);
        config.hash_scheme = self.hash_scheme.into();
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Address { key, index } => {
            let identity = cli.network.engine_config()?.deriver().identity(key.material()?, index);
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        Command::Decode { call_data } => {
            println!("{}", serde_json::to_string_pretty(&decode_call_data(&call_data))?);
        }
        Command::EntryPoints { bundler_url } => {
            let bundler = BundlerClient::new(bundler_url, cli.network.entry_point);
            for entry_point in bundler.supported_entry_points().await? {
                println!("{entry_point}");
            }
        }
        Command::Send(args) => send(cli.network.engine_config()?, args).await?,
    }
    Ok(())
}

async fn send(mut config: EngineConfig, args: SendArgs) -> Result<()> {
    config.poll_timeout = Duration::from_secs(args.poll_timeout_seconds);

    let (signer, key): (Box<dyn OperationSigner>, KeyMaterial) = match args.key_type {
        KeyKind::P256 => {
            let signer = LocalP256Signer::from_slice(args.private_key.as_slice())?;
            let key = signer.key_material();
            (Box::new(signer), key)
        }
        KeyKind::Secp256k1 => {
            let signer = LocalSecp256k1Signer::from_slice(args.private_key.as_slice())?;
            let key = signer.key_material();
            (Box::new(signer), key)
        }
    };

    info!(
        message = "Starting submission",
        bundler_url = %args.bundler_url,
        rpc_url = %args.rpc_url,
        entry_point = %config.entry_point,
        chain_id = config.chain_id,
        sponsored = args.paymaster_url.is_some()
    );

    let bundler = BundlerClient::new(args.bundler_url, config.entry_point);
    let provider: RootProvider = RootProvider::new_http(args.rpc_url);
    let chain = Arc::new(provider);
    let mut engine = SubmissionEngine::new(config.clone(), bundler, chain)?;
    if let Some(url) = args.paymaster_url {
        engine = engine.with_paymaster(PaymasterClient::new(url, config.entry_point));
    }

    let account = engine.account(key, args.index);
    let call = match args.token {
        Some(token) => AccountCall::erc20_transfer(token, args.to, args.value),
        None => AccountCall::transfer(args.to, args.value),
    };

    let report = engine.submit(&account, call, signer.as_ref()).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "userOpHash": report.user_op_hash,
            "sender": report.sender,
            "nonce": report.nonce,
            "deployedAccount": report.deployed_account,
            "feeReplacements": report.fee_replacements,
            "fees": report.fees,
            "transactionHash": report.receipt.transaction_hash(),
            "actualGasCost": report.receipt.actual_gas_cost,
        }))?
    );
    Ok(())
}
