//! Balances, token state and block time that account calls act on.
use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use keyrelay_core::abi::{IERC20, selector_of};

use crate::error::AccountError;

/// Code installed at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    /// Minimal ERC-20 supporting `transfer` and `approve`.
    Token,
    /// A smart account.
    Account,
    /// Reverts every call with the given data.
    Reverter(Bytes),
}

/// World state for the account model.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    timestamp: u64,
    native: HashMap<Address, U256>,
    code: HashMap<Address, Code>,
    token_balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl Ledger {
    /// Ledger at block time `timestamp`.
    pub fn at(timestamp: u64) -> Self {
        Self { timestamp, ..Default::default() }
    }

    /// Current block time.
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Moves block time forward.
    pub const fn advance(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    /// Native balance of `account`.
    pub fn balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    /// Credits native value.
    pub fn fund(&mut self, account: Address, amount: U256) {
        let balance = self.native.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Code at `address`, if any.
    pub fn code(&self, address: Address) -> Option<&Code> {
        self.code.get(&address)
    }

    /// Whether `address` has code.
    pub fn has_code(&self, address: Address) -> bool {
        self.code.contains_key(&address)
    }

    /// Installs `code` at `address`.
    pub fn install(&mut self, address: Address, code: Code) {
        self.code.insert(address, code);
    }

    /// Token balance of `holder`.
    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.token_balances.get(&(token, holder)).copied().unwrap_or_default()
    }

    /// Credits `amount` of `token` to `holder`.
    pub fn mint(&mut self, token: Address, holder: Address, amount: U256) {
        let balance = self.token_balances.entry((token, holder)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Allowance `owner` granted `spender` on `token`.
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    /// Moves native value between accounts.
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), AccountError> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balance(from);
        if balance < amount {
            return Err(AccountError::reason("insufficient native balance"));
        }
        self.native.insert(from, balance - amount);
        self.fund(to, amount);
        Ok(())
    }

    /// Message call from `from` to `to`. Either every effect applies or none does.
    pub fn call(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, AccountError> {
        if let Some(Code::Reverter(revert)) = self.code.get(&to) {
            return Err(AccountError::CallReverted(revert.clone()));
        }
        let balances_before = (self.balance(from), self.balance(to));
        self.transfer(from, to, value)?;
        if !matches!(self.code.get(&to), Some(Code::Token)) {
            return Ok(Bytes::new());
        }
        let result = self.token_call(to, from, data);
        if result.is_err() {
            // token calls never touch native balances
            self.native.insert(from, balances_before.0);
            self.native.insert(to, balances_before.1);
        }
        result
    }

    fn token_call(&mut self, token: Address, caller: Address, data: &[u8]) -> Result<Bytes, AccountError> {
        let Some(selector) = selector_of(data) else {
            return Err(AccountError::CallReverted(Bytes::new()));
        };
        match selector.0 {
            IERC20::transferCall::SELECTOR => {
                let call = IERC20::transferCall::abi_decode(data)
                    .map_err(|_| AccountError::CallReverted(Bytes::new()))?;
                let balance = self.token_balance(token, caller);
                if balance < call.amount {
                    return Err(AccountError::reason("ERC20: transfer amount exceeds balance"));
                }
                self.token_balances.insert((token, caller), balance - call.amount);
                self.mint(token, call.to, call.amount);
            }
            IERC20::approveCall::SELECTOR => {
                let call = IERC20::approveCall::abi_decode(data)
                    .map_err(|_| AccountError::CallReverted(Bytes::new()))?;
                self.allowances.insert((token, caller, call.spender), call.amount);
            }
            _ => return Err(AccountError::CallReverted(Bytes::new())),
        }
        Ok(true.abi_encode().into())
    }
}
