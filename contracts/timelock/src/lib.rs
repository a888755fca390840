//! # Timelock Contract
//!
//! Delayed execution of approved proposal actions. Proposers (the governor)
//! schedule a batch of calls; once the delay has elapsed the same proposer
//! executes them in order. Each call may carry a `value`, an amount of the
//! configured asset transferred from the timelock to the target first.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, token,
    xdr::ToXdr, Address, BytesN, Env, Symbol, Val, Vec,
};

const ADMIN: Symbol = symbol_short!("admin");
const MIN_DELAY: Symbol = symbol_short!("min_dly");
const ASSET: Symbol = symbol_short!("asset");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TimelockError {
    NotAdmin = 50,
    NotProposer = 51,
    AlreadyScheduled = 52,
    NotScheduled = 53,
    NotReady = 54,
    AlreadyDone = 55,
    DelayTooShort = 56,
    AlreadyInitialized = 57,
    /// A call carries value but no asset was configured
    NoAsset = 58,
    InvalidValue = 59,
}

/// One action of an approved proposal.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub target: Address,
    pub function: Symbol,
    pub args: Vec<Val>,
    pub value: i128,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub proposer: Address,
    pub calls: Vec<Call>,
    pub ready_at: u64,
    pub done: bool,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Proposer(Address),       // address -> bool
    Operation(BytesN<32>),   // operation id -> Operation
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CallScheduled {
    #[topic]
    pub id: BytesN<32>,
    pub proposer: Address,
    pub ready_at: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CallExecuted {
    #[topic]
    pub id: BytesN<32>,
    pub calls: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct Cancelled {
    #[topic]
    pub id: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct RoleChanged {
    #[topic]
    pub proposer: Address,
    pub granted: bool,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Timelock;

#[contractimpl]
impl Timelock {
    /// Constructor: admin manages proposers, `asset` funds call values
    pub fn __constructor(env: Env, admin: Address, min_delay: u64, asset: Option<Address>) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, TimelockError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&MIN_DELAY, &min_delay);
        if let Some(asset) = asset {
            env.storage().instance().set(&ASSET, &asset);
        }
    }

    pub fn grant_proposer(env: Env, admin: Address, proposer: Address) {
        Self::assert_admin(&env, &admin);
        env.storage()
            .persistent()
            .set(&DataKey::Proposer(proposer.clone()), &true);

        RoleChanged {
            proposer,
            granted: true,
        }
        .publish(&env);
    }

    pub fn revoke_proposer(env: Env, admin: Address, proposer: Address) {
        Self::assert_admin(&env, &admin);
        env.storage()
            .persistent()
            .remove(&DataKey::Proposer(proposer.clone()));

        RoleChanged {
            proposer,
            granted: false,
        }
        .publish(&env);
    }

    /// Schedule a batch of calls; returns the operation id
    pub fn schedule(
        env: Env,
        proposer: Address,
        calls: Vec<Call>,
        salt: BytesN<32>,
        delay: u64,
    ) -> BytesN<32> {
        Self::assert_proposer(&env, &proposer);

        if delay < Self::min_delay(env.clone()) {
            panic_with_error!(&env, TimelockError::DelayTooShort);
        }

        let has_asset = env.storage().instance().has(&ASSET);
        for call in calls.iter() {
            if call.value < 0 {
                panic_with_error!(&env, TimelockError::InvalidValue);
            }
            if call.value > 0 && !has_asset {
                panic_with_error!(&env, TimelockError::NoAsset);
            }
        }

        let id = Self::hash_operation(env.clone(), calls.clone(), salt);
        let op_key = DataKey::Operation(id.clone());
        if env.storage().persistent().has(&op_key) {
            panic_with_error!(&env, TimelockError::AlreadyScheduled);
        }

        let ready_at = env.ledger().timestamp().saturating_add(delay);
        let operation = Operation {
            proposer: proposer.clone(),
            calls,
            ready_at,
            done: false,
        };
        env.storage().persistent().set(&op_key, &operation);

        CallScheduled {
            id: id.clone(),
            proposer,
            ready_at,
        }
        .publish(&env);

        id
    }

    /// Execute a ready operation
    pub fn execute(env: Env, proposer: Address, id: BytesN<32>) {
        Self::assert_proposer(&env, &proposer);

        let op_key = DataKey::Operation(id.clone());
        let mut operation: Operation = env
            .storage()
            .persistent()
            .get(&op_key)
            .unwrap_or_else(|| panic_with_error!(&env, TimelockError::NotScheduled));

        if operation.done {
            panic_with_error!(&env, TimelockError::AlreadyDone);
        }
        if env.ledger().timestamp() < operation.ready_at {
            panic_with_error!(&env, TimelockError::NotReady);
        }

        // Mark done before any outbound call so a target cannot re-enter
        operation.done = true;
        env.storage().persistent().set(&op_key, &operation);

        for call in operation.calls.iter() {
            if call.value > 0 {
                let asset: Address = env
                    .storage()
                    .instance()
                    .get(&ASSET)
                    .unwrap_or_else(|| panic_with_error!(&env, TimelockError::NoAsset));
                token::Client::new(&env, &asset).transfer(
                    &env.current_contract_address(),
                    &call.target,
                    &call.value,
                );
            }
            let _: Val = env.invoke_contract(&call.target, &call.function, call.args.clone());
        }

        CallExecuted {
            id,
            calls: operation.calls.len(),
        }
        .publish(&env);
    }

    /// Cancel a pending operation
    pub fn cancel(env: Env, proposer: Address, id: BytesN<32>) {
        Self::assert_proposer(&env, &proposer);

        let op_key = DataKey::Operation(id.clone());
        let operation: Operation = env
            .storage()
            .persistent()
            .get(&op_key)
            .unwrap_or_else(|| panic_with_error!(&env, TimelockError::NotScheduled));
        if operation.done {
            panic_with_error!(&env, TimelockError::AlreadyDone);
        }

        env.storage().persistent().remove(&op_key);

        Cancelled { id }.publish(&env);
    }

    /// Operation id: keccak256 over the XDR of (calls, salt)
    pub fn hash_operation(env: Env, calls: Vec<Call>, salt: BytesN<32>) -> BytesN<32> {
        let payload = (calls, salt).to_xdr(&env);
        env.crypto().keccak256(&payload).into()
    }

    pub fn get_operation(env: Env, id: BytesN<32>) -> Option<Operation> {
        env.storage().persistent().get(&DataKey::Operation(id))
    }

    pub fn is_ready(env: Env, id: BytesN<32>) -> bool {
        match Self::get_operation(env.clone(), id) {
            Some(op) => !op.done && env.ledger().timestamp() >= op.ready_at,
            None => false,
        }
    }

    pub fn is_done(env: Env, id: BytesN<32>) -> bool {
        matches!(Self::get_operation(env, id), Some(op) if op.done)
    }

    pub fn is_proposer(env: Env, proposer: Address) -> bool {
        env.storage()
            .persistent()
            .get(&DataKey::Proposer(proposer))
            .unwrap_or(false)
    }

    pub fn min_delay(env: Env) -> u64 {
        env.storage().instance().get(&MIN_DELAY).unwrap_or(0)
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn assert_admin(env: &Env, admin: &Address) {
        admin.require_auth();
        let stored: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .unwrap_or_else(|| panic_with_error!(env, TimelockError::NotAdmin));
        if &stored != admin {
            panic_with_error!(env, TimelockError::NotAdmin);
        }
    }

    fn assert_proposer(env: &Env, proposer: &Address) {
        proposer.require_auth();
        if !Self::is_proposer(env.clone(), proposer.clone()) {
            panic_with_error!(env, TimelockError::NotProposer);
        }
    }
}
