//! # Anonymous Governor Contract
//!
//! Proposal lifecycle with anonymous, unit-weight voting:
//!
//! 1. `propose` hashes the action list into a deterministic proposal id and
//!    opens a fresh commitment tree for it.
//! 2. During registration participants publish `leaf = hash(secret)` via
//!    `register_commitment`.
//! 3. While Active, any address submits `cast_vote` with a Groth16 proof of
//!    membership under some recorded root plus a nullifier bound to the
//!    proposal scope. The voter is never recorded.
//! 4. After voting closes the tally decides Succeeded or Defeated; successful
//!    proposals are queued in, and executed through, the timelock.
//!
//! ## Proposal rounds
//!
//! The id is a pure function of the actions and description, so proposing the
//! same thing twice yields the same id. Once the earlier proposal is terminal
//! a new round starts; `instance = sha256(id || round)` keys the tree, the
//! nullifier ledger, the tally and the lifecycle record so rounds never share
//! state. Earlier rounds stay readable through `get_round` and `round_state`.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short,
    xdr::ToXdr, Address, Bytes, BytesN, Env, IntoVal, String, Symbol, Val, Vec, U256,
};

use zkgov_groth16::{Proof, PublicInputs};

mod ledger;

const CONFIG: Symbol = symbol_short!("config");
const PROPOSAL_COUNT: Symbol = symbol_short!("prop_cnt");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

const MAX_TREE_DEPTH: u32 = 20;
const MAX_DESCRIPTION_LEN: u32 = 1024;

pub const AGAINST: u32 = 0;
pub const FOR: u32 = 1;
pub const ABSTAIN: u32 = 2;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GovernorError {
    InvalidState = 1,
    CapacityExceeded = 2,
    DuplicateLeaf = 3,
    DuplicateProposal = 4,
    UnknownRoot = 5,
    InvalidProof = 6,
    NullifierAlreadyUsed = 7,
    Unauthorized = 8,
    ProposalNotFound = 9,
    InvalidOption = 10,
    InvalidConfig = 11,
    AlreadyInitialized = 12,
    InvalidProposal = 13,
    InvalidCommitment = 14,
}

#[contracttype]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

/// Deployment configuration, fixed at construction.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct GovernorConfig {
    /// May cancel any non-terminal proposal
    pub guardian: Address,
    pub tree: Address,
    pub verifier: Address,
    pub timelock: Address,
    /// Optional weight source consulted at registration
    pub voter_roll: Option<Address>,
    pub tree_depth: u32,
    pub voting_delay: u64,
    pub voting_period: u64,
    /// Registration stays open this long after voting starts
    pub registration_grace: u64,
    /// Minimum for + abstain votes
    pub quorum: u64,
    pub timelock_delay: u64,
    /// 0 disables expiry
    pub queue_window: u64,
    pub execution_window: u64,
}

/// Function and arguments invoked on one proposal target.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    pub function: Symbol,
    pub args: Vec<Val>,
}

/// Timelock call; field layout matches the timelock's own `Call`.
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
pub struct ProposalInfo {
    pub id: BytesN<32>,
    pub round: u32,
    pub instance: BytesN<32>,
    pub scope: U256,              // circuit domain separator derived from instance
    pub proposer: Address,
    pub description: String,
    pub calls: Vec<Call>,
    pub created_at: u64,
    pub vote_start: u64,
    pub vote_end: u64,
    pub registration_end: u64,
}

#[contracttype]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tally {
    pub against: u64,
    pub for_votes: u64,
    pub abstain: u64,
}

/// Decision recorded once a proposal leaves the voting phase.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Lifecycle {
    pub status: ProposalState,
    pub operation_id: Option<BytesN<32>>,
    pub eta: u64,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Proposal(BytesN<32>),               // id -> ProposalInfo (latest round)
    Round(BytesN<32>, u32),             // (id, round) -> ProposalInfo
    Tally(BytesN<32>),                  // instance -> Tally
    Lifecycle(BytesN<32>),              // instance -> Lifecycle
    Nullifier(BytesN<32>, U256),        // (instance, nullifier) -> bool
    Registrations(BytesN<32>, Address), // (instance, registrant) -> count
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalCreated {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub round: u32,
    pub proposer: Address,
    pub description: String,
    pub vote_start: u64,
    pub vote_end: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommitmentRegistered {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub leaf: U256,
    pub index: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteCast {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub support: u32,
    pub nullifier: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalFinalized {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub state: ProposalState,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalQueued {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub operation_id: BytesN<32>,
    pub eta: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalExecuted {
    #[topic]
    pub proposal_id: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalCanceled {
    #[topic]
    pub proposal_id: BytesN<32>,
    pub by: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Governor;

#[contractimpl]
impl Governor {
    /// Constructor: validate and store the deployment configuration
    pub fn __constructor(env: Env, config: GovernorConfig) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, GovernorError::AlreadyInitialized);
        }
        if config.tree_depth == 0
            || config.tree_depth > MAX_TREE_DEPTH
            || config.voting_period == 0
            || config.registration_grace > config.voting_period
        {
            panic_with_error!(&env, GovernorError::InvalidConfig);
        }

        // Queueing must satisfy the timelock's own minimum
        let min_delay: u64 = env.invoke_contract(
            &config.timelock,
            &symbol_short!("min_delay"),
            soroban_sdk::vec![&env],
        );
        if config.timelock_delay < min_delay {
            panic_with_error!(&env, GovernorError::InvalidConfig);
        }

        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&CONFIG, &config);
    }

    /// Create a proposal (or a new round of a terminal one)
    pub fn propose(
        env: Env,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<i128>,
        payloads: Vec<Payload>,
        description: String,
    ) -> BytesN<32> {
        proposer.require_auth();

        if targets.is_empty()
            || targets.len() != values.len()
            || targets.len() != payloads.len()
            || description.len() > MAX_DESCRIPTION_LEN
        {
            panic_with_error!(&env, GovernorError::InvalidProposal);
        }

        let mut calls = Vec::new(&env);
        for i in 0..targets.len() {
            let value = values.get_unchecked(i);
            if value < 0 {
                panic_with_error!(&env, GovernorError::InvalidProposal);
            }
            let payload = payloads.get_unchecked(i);
            calls.push_back(Call {
                target: targets.get_unchecked(i),
                function: payload.function,
                args: payload.args,
                value,
            });
        }

        let proposal_id = Self::hash_proposal(
            env.clone(),
            targets,
            values,
            payloads,
            description.clone(),
        );

        let cfg = Self::config(env.clone());
        let round = match Self::load_proposal(&env, &proposal_id) {
            Some(previous) => {
                if !Self::is_terminal(Self::status_of(&env, &cfg, &previous)) {
                    panic_with_error!(&env, GovernorError::DuplicateProposal);
                }
                previous.round + 1
            }
            None => 0,
        };

        let instance = Self::derive_instance(&env, &proposal_id, round);
        let scope = zkgov_groth16::scope_from_digest(&env, &instance);

        // Fresh tree namespaced by (governor, instance)
        let _: Val = env.invoke_contract(
            &cfg.tree,
            &symbol_short!("init_tree"),
            soroban_sdk::vec![
                &env,
                env.current_contract_address().into_val(&env),
                instance.clone().into_val(&env),
                cfg.tree_depth.into_val(&env),
            ],
        );

        let now = env.ledger().timestamp();
        let vote_start = now.saturating_add(cfg.voting_delay);
        let vote_end = vote_start.saturating_add(cfg.voting_period);

        let proposal = ProposalInfo {
            id: proposal_id.clone(),
            round,
            instance,
            scope,
            proposer: proposer.clone(),
            description: description.clone(),
            calls,
            created_at: now,
            vote_start,
            vote_end,
            registration_end: vote_start.saturating_add(cfg.registration_grace),
        };

        // Earlier rounds keep their own record, tally and lifecycle
        env.storage()
            .persistent()
            .set(&DataKey::Round(proposal_id.clone(), round), &proposal);
        env.storage()
            .persistent()
            .set(&DataKey::Tally(proposal.instance.clone()), &Tally::default());
        env.storage()
            .persistent()
            .set(&DataKey::Proposal(proposal_id.clone()), &proposal);

        let count = Self::proposal_count(env.clone());
        env.storage().instance().set(&PROPOSAL_COUNT, &(count + 1));

        ProposalCreated {
            proposal_id: proposal_id.clone(),
            round,
            proposer,
            description,
            vote_start,
            vote_end,
        }
        .publish(&env);

        proposal_id
    }

    /// Add a commitment to the proposal's tree; returns its leaf index
    pub fn register_commitment(
        env: Env,
        proposal_id: BytesN<32>,
        leaf: U256,
        registrant: Address,
    ) -> u32 {
        registrant.require_auth();

        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());
        let state = Self::state(env.clone(), proposal_id.clone());
        let open = matches!(state, ProposalState::Pending | ProposalState::Active)
            && env.ledger().timestamp() < proposal.registration_end;
        if !open {
            panic_with_error!(&env, GovernorError::InvalidState);
        }

        if leaf == U256::from_u32(&env, 0) || !zkgov_groth16::is_in_field(&env, &leaf) {
            panic_with_error!(&env, GovernorError::InvalidCommitment);
        }

        let cfg = Self::config(env.clone());

        // Weight w allows w commitments per round
        if let Some(roll) = cfg.voter_roll.clone() {
            let weight: u32 = env.invoke_contract(
                &roll,
                &symbol_short!("weight_of"),
                soroban_sdk::vec![&env, registrant.clone().into_val(&env)],
            );
            let reg_key = DataKey::Registrations(proposal.instance.clone(), registrant.clone());
            let used: u32 = env.storage().persistent().get(&reg_key).unwrap_or(0);
            if used >= weight {
                panic_with_error!(&env, GovernorError::Unauthorized);
            }
            env.storage().persistent().set(&reg_key, &(used + 1));
        }

        let owner = env.current_contract_address();

        // Pre-check tree conditions so failures surface as governor errors
        let duplicate: bool = env.invoke_contract(
            &cfg.tree,
            &symbol_short!("has_leaf"),
            soroban_sdk::vec![
                &env,
                owner.clone().into_val(&env),
                proposal.instance.clone().into_val(&env),
                leaf.clone().into_val(&env),
            ],
        );
        if duplicate {
            panic_with_error!(&env, GovernorError::DuplicateLeaf);
        }

        let (depth, next_index, _root): (u32, u32, U256) = env.invoke_contract(
            &cfg.tree,
            &Symbol::new(&env, "get_tree_info"),
            soroban_sdk::vec![
                &env,
                owner.clone().into_val(&env),
                proposal.instance.clone().into_val(&env),
            ],
        );
        if u64::from(next_index) >= 1u64 << depth {
            panic_with_error!(&env, GovernorError::CapacityExceeded);
        }

        let index: u32 = env.invoke_contract(
            &cfg.tree,
            &symbol_short!("insert"),
            soroban_sdk::vec![
                &env,
                owner.into_val(&env),
                proposal.instance.into_val(&env),
                leaf.clone().into_val(&env),
            ],
        );

        CommitmentRegistered {
            proposal_id,
            leaf,
            index,
        }
        .publish(&env);

        index
    }

    /// Submit an anonymous vote
    /// support: 0 = against, 1 = for, 2 = abstain
    pub fn cast_vote(
        env: Env,
        proposal_id: BytesN<32>,
        support: u32,
        nullifier_hash: U256,
        root: U256,
        proof: Proof,
    ) {
        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());

        if Self::state(env.clone(), proposal_id.clone()) != ProposalState::Active {
            panic_with_error!(&env, GovernorError::InvalidState);
        }
        if support > ABSTAIN {
            panic_with_error!(&env, GovernorError::InvalidOption);
        }
        if zkgov_groth16::validate_nullifier(&env, &nullifier_hash).is_err() {
            panic_with_error!(&env, GovernorError::InvalidProof);
        }
        // Cheap storage lookup before any cross-contract work
        if ledger::is_spent(&env, &proposal.instance, &nullifier_hash) {
            panic_with_error!(&env, GovernorError::NullifierAlreadyUsed);
        }

        let cfg = Self::config(env.clone());

        let root_valid: bool = env.invoke_contract(
            &cfg.tree,
            &symbol_short!("root_ok"),
            soroban_sdk::vec![
                &env,
                env.current_contract_address().into_val(&env),
                proposal.instance.clone().into_val(&env),
                root.clone().into_val(&env),
            ],
        );
        if !root_valid {
            panic_with_error!(&env, GovernorError::UnknownRoot);
        }

        let inputs = PublicInputs {
            root,
            nullifier_hash: nullifier_hash.clone(),
            scope: proposal.scope.clone(),
            support,
        };
        // Points off the curve make the host trap inside the verifier;
        // that is a rejected proof like any other
        let verified = env.try_invoke_contract::<bool, soroban_sdk::Error>(
            &cfg.verifier,
            &symbol_short!("verify"),
            soroban_sdk::vec![&env, inputs.into_val(&env), proof.into_val(&env)],
        );
        if !matches!(verified, Ok(Ok(true))) {
            panic_with_error!(&env, GovernorError::InvalidProof);
        }

        if !ledger::consume(&env, &proposal.instance, &nullifier_hash) {
            panic_with_error!(&env, GovernorError::NullifierAlreadyUsed);
        }

        let tally_key = DataKey::Tally(proposal.instance.clone());
        let mut tally: Tally = env
            .storage()
            .persistent()
            .get(&tally_key)
            .unwrap_or_default();
        match support {
            AGAINST => tally.against += 1,
            FOR => tally.for_votes += 1,
            _ => tally.abstain += 1,
        }
        env.storage().persistent().set(&tally_key, &tally);

        VoteCast {
            proposal_id,
            support,
            nullifier: nullifier_hash,
        }
        .publish(&env);
    }

    /// Record the voting outcome once the voting window has closed
    pub fn finalize(env: Env, proposal_id: BytesN<32>) -> ProposalState {
        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());
        if Self::load_lifecycle(&env, &proposal.instance).is_some() {
            return Self::state(env, proposal_id);
        }
        if env.ledger().timestamp() < proposal.vote_end {
            panic_with_error!(&env, GovernorError::InvalidState);
        }

        let cfg = Self::config(env.clone());
        let outcome = Self::decide(&env, &cfg, &proposal.instance);
        Self::store_lifecycle(
            &env,
            &proposal.instance,
            &Lifecycle {
                status: outcome,
                operation_id: None,
                eta: 0,
            },
        );

        ProposalFinalized {
            proposal_id: proposal_id.clone(),
            state: outcome,
        }
        .publish(&env);

        Self::state(env, proposal_id)
    }

    /// Schedule a succeeded proposal's calls in the timelock
    pub fn queue(env: Env, proposal_id: BytesN<32>) -> BytesN<32> {
        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());
        if Self::state(env.clone(), proposal_id.clone()) != ProposalState::Succeeded {
            panic_with_error!(&env, GovernorError::InvalidState);
        }

        let cfg = Self::config(env.clone());
        let operation_id: BytesN<32> = env.invoke_contract(
            &cfg.timelock,
            &symbol_short!("schedule"),
            soroban_sdk::vec![
                &env,
                env.current_contract_address().into_val(&env),
                proposal.calls.into_val(&env),
                proposal.instance.clone().into_val(&env),
                cfg.timelock_delay.into_val(&env),
            ],
        );

        let eta = env.ledger().timestamp().saturating_add(cfg.timelock_delay);
        Self::store_lifecycle(
            &env,
            &proposal.instance,
            &Lifecycle {
                status: ProposalState::Queued,
                operation_id: Some(operation_id.clone()),
                eta,
            },
        );

        ProposalQueued {
            proposal_id,
            operation_id: operation_id.clone(),
            eta,
        }
        .publish(&env);

        operation_id
    }

    /// Execute a queued proposal through the timelock
    pub fn execute(env: Env, proposal_id: BytesN<32>) {
        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());
        if Self::state(env.clone(), proposal_id.clone()) != ProposalState::Queued {
            panic_with_error!(&env, GovernorError::InvalidState);
        }

        let mut lifecycle = Self::load_lifecycle(&env, &proposal.instance)
            .unwrap_or_else(|| panic_with_error!(&env, GovernorError::InvalidState));
        if env.ledger().timestamp() < lifecycle.eta {
            panic_with_error!(&env, GovernorError::InvalidState);
        }
        let operation_id = lifecycle
            .operation_id
            .clone()
            .unwrap_or_else(|| panic_with_error!(&env, GovernorError::InvalidState));

        lifecycle.status = ProposalState::Executed;
        Self::store_lifecycle(&env, &proposal.instance, &lifecycle);

        let cfg = Self::config(env.clone());
        let _: Val = env.invoke_contract(
            &cfg.timelock,
            &symbol_short!("execute"),
            soroban_sdk::vec![
                &env,
                env.current_contract_address().into_val(&env),
                operation_id.into_val(&env),
            ],
        );

        ProposalExecuted { proposal_id }.publish(&env);
    }

    /// Cancel a proposal.
    /// The proposer may cancel while Pending; the guardian any time before a
    /// terminal state.
    pub fn cancel(env: Env, proposal_id: BytesN<32>, caller: Address) {
        caller.require_auth();

        let proposal = Self::get_proposal(env.clone(), proposal_id.clone());
        let state = Self::state(env.clone(), proposal_id.clone());
        if Self::is_terminal(state) {
            panic_with_error!(&env, GovernorError::InvalidState);
        }

        let cfg = Self::config(env.clone());
        let is_guardian = caller == cfg.guardian;
        let is_pending_proposer = caller == proposal.proposer && state == ProposalState::Pending;
        if !is_guardian && !is_pending_proposer {
            panic_with_error!(&env, GovernorError::Unauthorized);
        }

        let previous = Self::load_lifecycle(&env, &proposal.instance);
        if let Some(operation_id) = previous.as_ref().and_then(|l| l.operation_id.clone()) {
            let _: Val = env.invoke_contract(
                &cfg.timelock,
                &symbol_short!("cancel"),
                soroban_sdk::vec![
                    &env,
                    env.current_contract_address().into_val(&env),
                    operation_id.into_val(&env),
                ],
            );
        }

        Self::store_lifecycle(
            &env,
            &proposal.instance,
            &Lifecycle {
                status: ProposalState::Canceled,
                operation_id: None,
                eta: previous.map(|l| l.eta).unwrap_or(0),
            },
        );

        ProposalCanceled {
            proposal_id,
            by: caller,
        }
        .publish(&env);
    }

    /// Current lifecycle state of a proposal (its latest round)
    pub fn state(env: Env, proposal_id: BytesN<32>) -> ProposalState {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        let cfg = Self::config(env.clone());
        Self::status_of(&env, &cfg, &proposal)
    }

    /// State of one round of a proposal
    pub fn round_state(env: Env, proposal_id: BytesN<32>, round: u32) -> ProposalState {
        let proposal = Self::get_round(env.clone(), proposal_id, round);
        let cfg = Self::config(env.clone());
        Self::status_of(&env, &cfg, &proposal)
    }

    /// Votes recorded for one option
    pub fn tally(env: Env, proposal_id: BytesN<32>, option: u32) -> u64 {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        let tally = Self::load_tally(&env, &proposal.instance);
        match option {
            AGAINST => tally.against,
            FOR => tally.for_votes,
            ABSTAIN => tally.abstain,
            _ => panic_with_error!(&env, GovernorError::InvalidOption),
        }
    }

    /// (against, for, abstain)
    pub fn proposal_votes(env: Env, proposal_id: BytesN<32>) -> (u64, u64, u64) {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        let tally = Self::load_tally(&env, &proposal.instance);
        (tally.against, tally.for_votes, tally.abstain)
    }

    /// (against, for, abstain) of one round
    pub fn round_votes(env: Env, proposal_id: BytesN<32>, round: u32) -> (u64, u64, u64) {
        let proposal = Self::get_round(env.clone(), proposal_id, round);
        let tally = Self::load_tally(&env, &proposal.instance);
        (tally.against, tally.for_votes, tally.abstain)
    }

    pub fn get_proposal(env: Env, proposal_id: BytesN<32>) -> ProposalInfo {
        Self::load_proposal(&env, &proposal_id)
            .unwrap_or_else(|| panic_with_error!(&env, GovernorError::ProposalNotFound))
    }

    /// Record of a single round; round 0 is the first proposal
    pub fn get_round(env: Env, proposal_id: BytesN<32>, round: u32) -> ProposalInfo {
        env.storage()
            .persistent()
            .get(&DataKey::Round(proposal_id, round))
            .unwrap_or_else(|| panic_with_error!(&env, GovernorError::ProposalNotFound))
    }

    /// Queue/execution record, present once the outcome is cached
    pub fn get_lifecycle(env: Env, proposal_id: BytesN<32>) -> Option<Lifecycle> {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        Self::load_lifecycle(&env, &proposal.instance)
    }

    /// Whether a nullifier was spent in the proposal's current round
    pub fn is_nullifier_used(env: Env, proposal_id: BytesN<32>, nullifier: U256) -> bool {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        ledger::is_spent(&env, &proposal.instance, &nullifier)
    }

    /// Registrations already made by `registrant` in the current round
    pub fn registrations(env: Env, proposal_id: BytesN<32>, registrant: Address) -> u32 {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        env.storage()
            .persistent()
            .get(&DataKey::Registrations(proposal.instance, registrant))
            .unwrap_or(0)
    }

    /// (depth, leaf count, current root) of the proposal's commitment tree
    pub fn tree_info(env: Env, proposal_id: BytesN<32>) -> (u32, u32, U256) {
        let proposal = Self::get_proposal(env.clone(), proposal_id);
        let cfg = Self::config(env.clone());
        env.invoke_contract(
            &cfg.tree,
            &Symbol::new(&env, "get_tree_info"),
            soroban_sdk::vec![
                &env,
                env.current_contract_address().into_val(&env),
                proposal.instance.into_val(&env),
            ],
        )
    }

    /// Deterministic proposal id:
    /// keccak256(xdr(targets, values, payloads, sha256(description)))
    pub fn hash_proposal(
        env: Env,
        targets: Vec<Address>,
        values: Vec<i128>,
        payloads: Vec<Payload>,
        description: String,
    ) -> BytesN<32> {
        let len = description.len();
        if len > MAX_DESCRIPTION_LEN {
            panic_with_error!(&env, GovernorError::InvalidProposal);
        }
        let mut buf = [0u8; MAX_DESCRIPTION_LEN as usize];
        description.copy_into_slice(&mut buf[..len as usize]);
        let description_hash: BytesN<32> = env
            .crypto()
            .sha256(&Bytes::from_slice(&env, &buf[..len as usize]))
            .into();

        let encoded = (targets, values, payloads, description_hash).to_xdr(&env);
        env.crypto().keccak256(&encoded).into()
    }

    pub fn config(env: Env) -> GovernorConfig {
        env.storage()
            .instance()
            .get(&CONFIG)
            .unwrap_or_else(|| panic_with_error!(&env, GovernorError::InvalidConfig))
    }

    /// Number of proposals created, counting every round
    pub fn proposal_count(env: Env) -> u64 {
        env.storage().instance().get(&PROPOSAL_COUNT).unwrap_or(0)
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn derive_instance(env: &Env, proposal_id: &BytesN<32>, round: u32) -> BytesN<32> {
        let mut data = Bytes::from_array(env, &proposal_id.to_array());
        data.extend_from_array(&round.to_be_bytes());
        env.crypto().sha256(&data).into()
    }

    fn status_of(env: &Env, cfg: &GovernorConfig, proposal: &ProposalInfo) -> ProposalState {
        let now = env.ledger().timestamp();

        let status = match Self::load_lifecycle(env, &proposal.instance) {
            Some(lifecycle) => match lifecycle.status {
                ProposalState::Queued => {
                    if cfg.execution_window > 0
                        && now >= lifecycle.eta.saturating_add(cfg.execution_window)
                    {
                        return ProposalState::Expired;
                    }
                    return ProposalState::Queued;
                }
                ProposalState::Succeeded => ProposalState::Succeeded,
                other => return other,
            },
            None => {
                if now < proposal.vote_start {
                    return ProposalState::Pending;
                }
                if now < proposal.vote_end {
                    return ProposalState::Active;
                }
                Self::decide(env, cfg, &proposal.instance)
            }
        };

        // Succeeded but never queued
        if status == ProposalState::Succeeded
            && cfg.queue_window > 0
            && now >= proposal.vote_end.saturating_add(cfg.queue_window)
        {
            return ProposalState::Expired;
        }
        status
    }

    // Succeeded iff for + abstain reaches quorum and for beats against
    fn decide(env: &Env, cfg: &GovernorConfig, instance: &BytesN<32>) -> ProposalState {
        let tally = Self::load_tally(env, instance);
        let participation = tally.for_votes.saturating_add(tally.abstain);
        if participation >= cfg.quorum && tally.for_votes > tally.against {
            ProposalState::Succeeded
        } else {
            ProposalState::Defeated
        }
    }

    fn is_terminal(state: ProposalState) -> bool {
        matches!(
            state,
            ProposalState::Canceled
                | ProposalState::Defeated
                | ProposalState::Expired
                | ProposalState::Executed
        )
    }

    fn load_proposal(env: &Env, proposal_id: &BytesN<32>) -> Option<ProposalInfo> {
        env.storage()
            .persistent()
            .get(&DataKey::Proposal(proposal_id.clone()))
    }

    fn load_tally(env: &Env, instance: &BytesN<32>) -> Tally {
        env.storage()
            .persistent()
            .get(&DataKey::Tally(instance.clone()))
            .unwrap_or_else(|| panic_with_error!(env, GovernorError::ProposalNotFound))
    }

    fn load_lifecycle(env: &Env, instance: &BytesN<32>) -> Option<Lifecycle> {
        env.storage()
            .persistent()
            .get(&DataKey::Lifecycle(instance.clone()))
    }

    fn store_lifecycle(env: &Env, instance: &BytesN<32>, lifecycle: &Lifecycle) {
        env.storage()
            .persistent()
            .set(&DataKey::Lifecycle(instance.clone()), lifecycle);
    }
}
