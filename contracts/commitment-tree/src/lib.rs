//! # Commitment Tree Contract
//!
//! Append-only, fixed-depth Poseidon Merkle trees of voter commitments.
//!
//! Trees are namespaced by `(owner, key)`: the owner is the contract that
//! created the tree and it must authorize every mutation. The governor keeps one
//! tree per proposal round, so no tree state is ever shared between proposals.
//!
//! Every root the tree ever had is kept, indexed by the leaf count at the time
//! it was produced. A vote proof built before later registrations still refers
//! to a root that genuinely existed and stays acceptable.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, Address,
    BytesN, Env, Symbol, Vec, U256,
};

const MAX_TREE_DEPTH: u32 = 20; // Supports ~1M commitments (2^20 = 1,048,576)
const ZEROS_CACHE: Symbol = symbol_short!("zeros");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TreeError {
    InvalidDepth = 20,
    TreeExists = 21,
    TreeNotFound = 22,
    CapacityExceeded = 23,
    DuplicateLeaf = 24,
    /// Leaf is zero (the empty-slot value) or not a BN254 field element
    InvalidLeaf = 25,
    LeafIndexOutOfBounds = 26,
    AlreadyInitialized = 27,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    TreeDepth(Address, BytesN<32>),            // (owner, key) -> depth
    NextLeafIndex(Address, BytesN<32>),        // (owner, key) -> next index
    FilledSubtrees(Address, BytesN<32>),       // (owner, key) -> Vec<U256>
    RootAt(Address, BytesN<32>, u32),          // (owner, key, leaf count) -> root
    RootCount(Address, BytesN<32>, U256),      // (owner, key, root) -> leaf count
    LeafIndex(Address, BytesN<32>, U256),      // (owner, key, commitment) -> index
    LeafValue(Address, BytesN<32>, u32),       // (owner, key, index) -> commitment
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct TreeInitEvent {
    #[topic]
    pub owner: Address,
    #[topic]
    pub key: BytesN<32>,
    pub depth: u32,
    pub empty_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommitEvent {
    #[topic]
    pub owner: Address,
    #[topic]
    pub key: BytesN<32>,
    pub commitment: U256,
    pub index: u32,
    pub new_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct CommitmentTree;

#[contractimpl]
impl CommitmentTree {
    /// Constructor: pre-computes the zeros cache so the first tree
    /// initialisation does not pay for it.
    pub fn __constructor(env: Env) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, TreeError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        Self::ensure_zeros_cache(&env);
    }

    /// Create an empty tree of `depth` levels under `(owner, key)`.
    pub fn init_tree(env: Env, owner: Address, key: BytesN<32>, depth: u32) {
        owner.require_auth();

        if depth == 0 || depth > MAX_TREE_DEPTH {
            panic_with_error!(&env, TreeError::InvalidDepth);
        }

        let depth_key = DataKey::TreeDepth(owner.clone(), key.clone());
        if env.storage().persistent().has(&depth_key) {
            panic_with_error!(&env, TreeError::TreeExists);
        }

        env.storage().persistent().set(&depth_key, &depth);
        env.storage()
            .persistent()
            .set(&DataKey::NextLeafIndex(owner.clone(), key.clone()), &0u32);

        let mut filled = Vec::new(&env);
        for level in 0..depth {
            filled.push_back(Self::zero_at_level(env.clone(), level));
        }
        env.storage()
            .persistent()
            .set(&DataKey::FilledSubtrees(owner.clone(), key.clone()), &filled);

        let empty_root = Self::zero_at_level(env.clone(), depth);
        Self::record_root(&env, &owner, &key, 0, &empty_root);

        TreeInitEvent {
            owner,
            key,
            depth,
            empty_root,
        }
        .publish(&env);
    }

    /// Append a commitment at the next free index and return that index.
    pub fn insert(env: Env, owner: Address, key: BytesN<32>, commitment: U256) -> u32 {
        owner.require_auth();

        let depth = Self::depth_of(&env, &owner, &key);

        if commitment == U256::from_u32(&env, 0)
            || !zkgov_groth16::is_in_field(&env, &commitment)
        {
            panic_with_error!(&env, TreeError::InvalidLeaf);
        }

        let leaf_key = DataKey::LeafIndex(owner.clone(), key.clone(), commitment.clone());
        if env.storage().persistent().has(&leaf_key) {
            panic_with_error!(&env, TreeError::DuplicateLeaf);
        }

        let next_index = Self::next_index_of(&env, &owner, &key);
        if next_index >= (1u32 << depth) {
            panic_with_error!(&env, TreeError::CapacityExceeded);
        }

        let new_root = Self::insert_leaf(&env, &owner, &key, commitment.clone(), next_index, depth);

        env.storage().persistent().set(
            &DataKey::NextLeafIndex(owner.clone(), key.clone()),
            &(next_index + 1),
        );
        env.storage().persistent().set(&leaf_key, &next_index);
        env.storage().persistent().set(
            &DataKey::LeafValue(owner.clone(), key.clone(), next_index),
            &commitment,
        );

        CommitEvent {
            owner,
            key,
            commitment,
            index: next_index,
            new_root,
        }
        .publish(&env);

        next_index
    }

    /// Get current root of a tree
    pub fn current_root(env: Env, owner: Address, key: BytesN<32>) -> U256 {
        let next_index = Self::next_index_of(&env, &owner, &key);
        env.storage()
            .persistent()
            .get(&DataKey::RootAt(owner, key, next_index))
            .unwrap_or_else(|| panic_with_error!(&env, TreeError::TreeNotFound))
    }

    /// Root recorded when the tree held exactly `leaf_count` leaves
    pub fn root_at(env: Env, owner: Address, key: BytesN<32>, leaf_count: u32) -> Option<U256> {
        env.storage()
            .persistent()
            .get(&DataKey::RootAt(owner, key, leaf_count))
    }

    /// Leaf count at which `root` was recorded, if it ever was
    pub fn root_count(env: Env, owner: Address, key: BytesN<32>, root: U256) -> Option<u32> {
        env.storage()
            .persistent()
            .get(&DataKey::RootCount(owner, key, root))
    }

    /// Check if a root is in history and covers at least one leaf.
    /// The empty-tree root proves nothing, so it is never accepted.
    pub fn root_ok(env: Env, owner: Address, key: BytesN<32>, root: U256) -> bool {
        matches!(Self::root_count(env, owner, key, root), Some(count) if count > 0)
    }

    pub fn has_leaf(env: Env, owner: Address, key: BytesN<32>, commitment: U256) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::LeafIndex(owner, key, commitment))
    }

    /// Get leaf index for a commitment
    pub fn get_leaf_index(
        env: Env,
        owner: Address,
        key: BytesN<32>,
        commitment: U256,
    ) -> Option<u32> {
        env.storage()
            .persistent()
            .get(&DataKey::LeafIndex(owner, key, commitment))
    }

    pub fn get_leaf(env: Env, owner: Address, key: BytesN<32>, index: u32) -> Option<U256> {
        env.storage()
            .persistent()
            .get(&DataKey::LeafValue(owner, key, index))
    }

    /// Get tree info: (depth, next_index, current_root)
    pub fn get_tree_info(env: Env, owner: Address, key: BytesN<32>) -> (u32, u32, U256) {
        let depth = Self::depth_of(&env, &owner, &key);
        let next_index = Self::next_index_of(&env, &owner, &key);
        let root = Self::current_root(env, owner, key);
        (depth, next_index, root)
    }

    /// Get Merkle path for a specific leaf index against the current root
    /// Returns (pathElements, pathIndices) where:
    /// - pathElements[i] is the sibling hash at level i
    /// - pathIndices[i] is 0 if the node is a left child, 1 if right child
    pub fn get_merkle_path(
        env: Env,
        owner: Address,
        key: BytesN<32>,
        leaf_index: u32,
    ) -> (Vec<U256>, Vec<u32>) {
        let depth = Self::depth_of(&env, &owner, &key);
        let next_index = Self::next_index_of(&env, &owner, &key);

        if leaf_index >= next_index {
            panic_with_error!(&env, TreeError::LeafIndexOutOfBounds);
        }

        let mut path_elements = Vec::new(&env);
        let mut path_indices = Vec::new(&env);
        let mut current_index = leaf_index;

        for level in 0..depth {
            let is_left = current_index % 2 == 0;
            path_indices.push_back(if is_left { 0 } else { 1 });

            let sibling_index = if is_left {
                current_index + 1
            } else {
                current_index - 1
            };
            path_elements.push_back(Self::node_at(
                &env,
                &owner,
                &key,
                level,
                sibling_index,
                next_index,
            ));

            current_index /= 2;
        }

        (path_elements, path_indices)
    }

    /// O(1) lookup for precomputed zero at each level
    pub fn zero_at_level(env: Env, level: u32) -> U256 {
        Self::ensure_zeros_cache(&env);
        let zeros: Vec<U256> = env
            .storage()
            .instance()
            .get(&ZEROS_CACHE)
            .unwrap_or_else(|| panic_with_error!(&env, TreeError::InvalidDepth));
        zeros
            .get(level)
            .unwrap_or_else(|| panic_with_error!(&env, TreeError::InvalidDepth))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn depth_of(env: &Env, owner: &Address, key: &BytesN<32>) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::TreeDepth(owner.clone(), key.clone()))
            .unwrap_or_else(|| panic_with_error!(env, TreeError::TreeNotFound))
    }

    fn next_index_of(env: &Env, owner: &Address, key: &BytesN<32>) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(owner.clone(), key.clone()))
            .unwrap_or_else(|| panic_with_error!(env, TreeError::TreeNotFound))
    }

    fn record_root(env: &Env, owner: &Address, key: &BytesN<32>, leaf_count: u32, root: &U256) {
        env.storage().persistent().set(
            &DataKey::RootAt(owner.clone(), key.clone(), leaf_count),
            root,
        );
        env.storage().persistent().set(
            &DataKey::RootCount(owner.clone(), key.clone(), root.clone()),
            &leaf_count,
        );
    }

    // Internal: insert leaf along its O(depth) path using the filled-subtree frontier
    fn insert_leaf(
        env: &Env,
        owner: &Address,
        key: &BytesN<32>,
        leaf: U256,
        index: u32,
        depth: u32,
    ) -> U256 {
        let filled_key = DataKey::FilledSubtrees(owner.clone(), key.clone());
        let mut filled: Vec<U256> = env
            .storage()
            .persistent()
            .get(&filled_key)
            .unwrap_or_else(|| panic_with_error!(env, TreeError::TreeNotFound));

        let mut current_hash = leaf;
        let mut current_index = index;

        for level in 0..depth {
            if current_index % 2 == 0 {
                // Left child - update filled subtree at this level
                filled.set(level, current_hash.clone());
                let zero = Self::zero_at_level(env.clone(), level);
                current_hash = Self::hash_pair(env, &current_hash, &zero);
            } else {
                // Right child - use filled subtree from left
                let left = filled
                    .get(level)
                    .unwrap_or_else(|| panic_with_error!(env, TreeError::TreeNotFound));
                current_hash = Self::hash_pair(env, &left, &current_hash);
            }
            current_index /= 2;
        }

        env.storage().persistent().set(&filled_key, &filled);
        Self::record_root(env, owner, key, index + 1, &current_hash);

        current_hash
    }

    // Internal: value of the node at (level, index) in the current tree.
    // Subtrees that start past the last leaf are empty and use the cached zero.
    fn node_at(
        env: &Env,
        owner: &Address,
        key: &BytesN<32>,
        level: u32,
        index: u32,
        next_index: u32,
    ) -> U256 {
        let first_leaf = (index as u64) << level;
        if first_leaf >= next_index as u64 {
            return Self::zero_at_level(env.clone(), level);
        }
        if level == 0 {
            return env
                .storage()
                .persistent()
                .get(&DataKey::LeafValue(owner.clone(), key.clone(), index))
                .unwrap_or_else(|| Self::zero_at_level(env.clone(), 0));
        }
        let left = Self::node_at(env, owner, key, level - 1, index * 2, next_index);
        let right = Self::node_at(env, owner, key, level - 1, index * 2 + 1, next_index);
        Self::hash_pair(env, &left, &right)
    }

    // Internal: Poseidon hash of two U256 values
    fn hash_pair(env: &Env, left: &U256, right: &U256) -> U256 {
        let field = Symbol::new(env, "BN254");
        let inputs = soroban_sdk::vec![env, left.clone(), right.clone()];
        env.crypto().poseidon_hash(&inputs, field)
    }

    // Internal: Ensure zeros cache is initialized (shared across all trees)
    fn ensure_zeros_cache(env: &Env) {
        if env.storage().instance().has(&ZEROS_CACHE) {
            return;
        }

        // zeros[0] = 0
        // zeros[i+1] = Poseidon(zeros[i], zeros[i])
        let mut zeros = Vec::new(env);
        let mut current = U256::from_u32(env, 0);
        zeros.push_back(current.clone());

        for _ in 0..MAX_TREE_DEPTH {
            current = Self::hash_pair(env, &current, &current);
            zeros.push_back(current.clone());
        }

        env.storage().instance().set(&ZEROS_CACHE, &zeros);
    }
}

// Test-only functions in separate contractimpl block
#[cfg(any(test, feature = "testutils"))]
#[contractimpl]
impl CommitmentTree {
    /// Test helper: Expose the node hash for known-answer and recomputation checks
    pub fn test_hash_pair(env: Env, a: U256, b: U256) -> U256 {
        Self::hash_pair(&env, &a, &b)
    }
}
