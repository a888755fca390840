//! # Groth16 Vote Verifier Contract
//!
//! Stateless proof-verification service for the governor. The verification key
//! is injected once at deployment and never changes afterwards, so every
//! proposal verified by this contract is checked against the same key.
//!
//! Capability interface consumed by the governor:
//! `verify(PublicInputs, Proof) -> bool`
//!
//! ## Point Validation
//!
//! No custom curve or subgroup validation is performed on key or proof points.
//! Invalid points cannot satisfy the pairing equation, so the BN254 pairing
//! check is the final arbiter of proof validity.

#![no_std]
use soroban_sdk::{contract, contractimpl, panic_with_error, symbol_short, BytesN, Env, Symbol};

pub use zkgov_groth16::{Groth16Error, Proof, PublicInputs, VerificationKey};

const VK_KEY: Symbol = symbol_short!("vk");
const VK_HASH: Symbol = symbol_short!("vk_hash");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VkSetEvent {
    pub vk_hash: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Groth16Verifier;

#[contractimpl]
impl Groth16Verifier {
    /// Constructor: store the vote-circuit verification key
    pub fn __constructor(env: Env, vk: VerificationKey) {
        // IC vector must have exactly num_public_signals + 1 elements
        if vk.ic.len() != zkgov_groth16::EXPECTED_IC_LENGTH {
            panic_with_error!(&env, Groth16Error::IcLengthMismatch);
        }

        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        let vk_hash = zkgov_groth16::hash_vk(&env, &vk);
        env.storage().instance().set(&VK_KEY, &vk);
        env.storage().instance().set(&VK_HASH, &vk_hash);

        VkSetEvent { vk_hash }.publish(&env);
    }

    /// Verify a vote proof against the stored key.
    /// Malformed public inputs verify as false rather than erroring.
    pub fn verify(env: Env, inputs: PublicInputs, proof: Proof) -> bool {
        if inputs.validate(&env).is_err() {
            return false;
        }
        let vk = Self::vk(env.clone());
        zkgov_groth16::verify_groth16(&env, &vk, &proof, &inputs.to_signals(&env))
    }

    /// Get the verification key
    pub fn vk(env: Env) -> VerificationKey {
        env.storage()
            .instance()
            .get(&VK_KEY)
            .unwrap_or_else(|| panic_with_error!(&env, Groth16Error::IcLengthMismatch))
    }

    /// SHA256 of the verification key, for off-chain key pinning
    pub fn vk_hash(env: Env) -> BytesN<32> {
        env.storage()
            .instance()
            .get(&VK_HASH)
            .unwrap_or_else(|| panic_with_error!(&env, Groth16Error::IcLengthMismatch))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }
}
