//! Spent-nullifier set, one per proposal instance.
//!
//! Entries are keyed by the composite `(instance, nullifier)`, so the same
//! nullifier value spent on one proposal round stays fresh on every other.

use soroban_sdk::{BytesN, Env, U256};

use crate::DataKey;

pub fn is_spent(env: &Env, instance: &BytesN<32>, nullifier: &U256) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Nullifier(instance.clone(), nullifier.clone()))
}

/// Record a nullifier. Returns false if it was already spent.
pub fn consume(env: &Env, instance: &BytesN<32>, nullifier: &U256) -> bool {
    let key = DataKey::Nullifier(instance.clone(), nullifier.clone());
    if env.storage().persistent().has(&key) {
        return false;
    }
    env.storage().persistent().set(&key, &true);
    true
}
