//! # ZK Governor Groth16 Library
//!
//! Shared Groth16 zero-knowledge proof verification for the governor contracts.
//! Uses the BN254 elliptic curve (alt_bn128) for pairing-based verification.
//!
//! ## Vote Statement
//!
//! A vote proof attests, without revealing the witness `(secret, path)`:
//! - `Poseidon(secret)` is a leaf of the commitment tree whose root is `root`
//! - `nullifier_hash = Poseidon(secret, scope)`
//!
//! Public signals, in circuit order: `[root, nullifier_hash, scope, support]`.
//! `scope` separates nullifiers between proposals and `support` binds the
//! chosen option so a relayer cannot flip it.
//!
//! ## Cryptographic Primitives
//!
//! ### BN254 Curve (alt_bn128)
//! - **Definition**: y² = x³ + 3 over 𝔽_p where p = 21888242871839275222246405745257275088696311157297823662689037894645226208583
//! - **Scalar field order**: r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//!
//! ### Groth16 SNARK
//! - **Paper**: "On the Size of Pairing-based Non-interactive Arguments" by Jens Groth (2016)
//! - **Implementation**: Uses Soroban BN254 host functions for verification

#![no_std]

use soroban_sdk::{
    contracterror, contracttype,
    crypto::bn254::{Fr, G1Affine, G2Affine},
    Bytes, BytesN, Env, Vec, U256,
};

/// BN254 scalar field modulus (Fr) in big-endian bytes
/// r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
/// All public signals (nullifier, root, etc.) must be < r to prevent modular reduction attacks
pub const BN254_FR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// BN254 scalar field order minus one (r - 1) in big-endian bytes
/// Used for G1 point negation: (r-1) * P = -P since (r-1) ≡ -1 (mod r)
pub const BN254_R_MINUS_ONE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x00,
];

/// Number of public signals in the vote circuit.
pub const PUBLIC_INPUT_COUNT: u32 = 4;

/// Exact IC length a vote verification key must carry.
pub const EXPECTED_IC_LENGTH: u32 = PUBLIC_INPUT_COUNT + 1;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Groth16Error {
    /// IC vector length doesn't match public signals + 1
    IcLengthMismatch = 30,
    /// Public signal value >= BN254 scalar field modulus (invalid field element)
    SignalNotInField = 31,
    /// Nullifier is zero (invalid)
    InvalidNullifier = 32,
}

/// Groth16 Verification Key for BN254
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationKey {
    pub alpha: BytesN<64>,   // G1 point
    pub beta: BytesN<128>,   // G2 point
    pub gamma: BytesN<128>,  // G2 point
    pub delta: BytesN<128>,  // G2 point
    pub ic: Vec<BytesN<64>>, // IC points (G1)
}

/// Groth16 Proof
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Proof {
    pub a: BytesN<64>,  // G1 point
    pub b: BytesN<128>, // G2 point
    pub c: BytesN<64>,  // G1 point
}

/// Public inputs of a vote proof.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct PublicInputs {
    pub root: U256,
    pub nullifier_hash: U256,
    pub scope: U256,
    pub support: u32,
}

impl PublicInputs {
    /// Signals in circuit order: `[root, nullifier_hash, scope, support]`.
    pub fn to_signals(&self, env: &Env) -> Vec<U256> {
        soroban_sdk::vec![
            env,
            self.root.clone(),
            self.nullifier_hash.clone(),
            self.scope.clone(),
            U256::from_u32(env, self.support)
        ]
    }

    /// Reject signals that would be reduced mod r inside the circuit.
    pub fn validate(&self, env: &Env) -> Result<(), Groth16Error> {
        assert_in_field(env, &self.root)?;
        validate_nullifier(env, &self.nullifier_hash)?;
        assert_in_field(env, &self.scope)
    }
}

/// Validate that a U256 value is within the BN254 scalar field (< r)
///
/// This prevents modular reduction attacks where values >= r are reduced mod r,
/// allowing attackers to submit different U256 values that verify identically.
///
/// SECURITY: All public signals (nullifier, root) MUST be validated before use.
/// Without this check, an attacker could double-vote by submitting nullifier=r+1
/// (stored as different key) which verifies the same as nullifier=1.
///
/// Returns `Err(Groth16Error::SignalNotInField)` if value >= r.
pub fn assert_in_field(env: &Env, value: &U256) -> Result<(), Groth16Error> {
    if !is_in_field(env, value) {
        return Err(Groth16Error::SignalNotInField);
    }
    Ok(())
}

/// Check if a U256 value is within the BN254 scalar field (< r)
/// Returns true if valid, false if >= r.
pub fn is_in_field(env: &Env, value: &U256) -> bool {
    let modulus = U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_FR_MODULUS));
    value < &modulus
}

/// Validate that a nullifier is non-zero and within the BN254 scalar field.
/// Returns appropriate error for zero nullifier or out-of-field value.
pub fn validate_nullifier(env: &Env, nullifier: &U256) -> Result<(), Groth16Error> {
    if nullifier == &U256::from_u32(env, 0) {
        return Err(Groth16Error::InvalidNullifier);
    }
    assert_in_field(env, nullifier)
}

/// Map a 32-byte digest onto a field element by clearing its top three bits.
///
/// The result is below 2^253 < r, so it is always a canonical signal.
pub fn scope_from_digest(env: &Env, digest: &BytesN<32>) -> U256 {
    let mut bytes = digest.to_array();
    bytes[0] &= 0x1f;
    U256::from_be_bytes(env, &Bytes::from_array(env, &bytes))
}

/// Compute SHA256 hash of verification key for immutability tracking
pub fn hash_vk(env: &Env, vk: &VerificationKey) -> BytesN<32> {
    let mut data = Bytes::new(env);

    data.append(&Bytes::from_array(env, &vk.alpha.to_array()));
    data.append(&Bytes::from_array(env, &vk.beta.to_array()));
    data.append(&Bytes::from_array(env, &vk.gamma.to_array()));
    data.append(&Bytes::from_array(env, &vk.delta.to_array()));
    for ic_point in vk.ic.iter() {
        data.append(&Bytes::from_array(env, &ic_point.to_array()));
    }

    env.crypto().sha256(&data).into()
}

/// Verify a Groth16 proof using BN254 pairing check.
///
/// The Groth16 verification equation is:
/// e(-A, B) * e(alpha, beta) * e(vk_x, gamma) * e(C, delta) = 1
///
/// Where vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
///
/// # Arguments
/// * `env` - Soroban environment
/// * `vk` - Verification key
/// * `proof` - Groth16 proof (A, B, C points)
/// * `pub_signals` - Public signals (must have length = IC.len() - 1)
///
/// # Returns
/// `true` if the proof verifies, `false` otherwise.
pub fn verify_groth16(
    env: &Env,
    vk: &VerificationKey,
    proof: &Proof,
    pub_signals: &Vec<U256>,
) -> bool {
    if pub_signals.len() + 1 != vk.ic.len() {
        return false;
    }
    for signal in pub_signals.iter() {
        if !is_in_field(env, &signal) {
            return false;
        }
    }

    let vk_x = match compute_vk_x(vk, pub_signals) {
        Some(point) => point,
        None => return false,
    };

    // Negate A using scalar multiplication by (r-1)
    let a_point = G1Affine::from_bytes(proof.a.clone());
    let neg_a = a_point * neg_one_scalar(env);

    let mut g1_vec = Vec::new(env);
    g1_vec.push_back(neg_a);
    g1_vec.push_back(G1Affine::from_bytes(vk.alpha.clone()));
    g1_vec.push_back(vk_x);
    g1_vec.push_back(G1Affine::from_bytes(proof.c.clone()));

    let mut g2_vec = Vec::new(env);
    g2_vec.push_back(G2Affine::from_bytes(proof.b.clone()));
    g2_vec.push_back(G2Affine::from_bytes(vk.beta.clone()));
    g2_vec.push_back(G2Affine::from_bytes(vk.gamma.clone()));
    g2_vec.push_back(G2Affine::from_bytes(vk.delta.clone()));

    env.crypto().bn254().pairing_check(g1_vec, g2_vec)
}

/// Returns the scalar (r - 1) which is equivalent to -1 mod r.
fn neg_one_scalar(env: &Env) -> Fr {
    let bytes = Bytes::from_array(env, &BN254_R_MINUS_ONE);
    Fr::from(U256::from_be_bytes(env, &bytes))
}

/// Compute vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
fn compute_vk_x(vk: &VerificationKey, pub_signals: &Vec<U256>) -> Option<G1Affine> {
    let mut vk_x = G1Affine::from_bytes(vk.ic.get(0)?);

    for i in 0..pub_signals.len() {
        let signal = pub_signals.get(i)?;
        let ic_point = G1Affine::from_bytes(vk.ic.get(i + 1)?);
        vk_x = vk_x + ic_point * Fr::from(signal);
    }

    Some(vk_x)
}
