#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, Address,
    Env, Symbol, Vec,
};

const ADMIN: Symbol = symbol_short!("admin");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RollError {
    NotAdmin = 60,
    AlreadyEnrolled = 61,
    NotMember = 62,
    AlreadyInitialized = 63,
    InvalidWeight = 64,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Weight(Address),      // member -> voting weight
    Revoked(Address),     // member -> bool (revocation flag)
    MemberCount,          // total enrolled (ever)
    MemberAtIndex(u64),   // index -> Address
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct EnrollEvent {
    #[topic]
    pub member: Address,
    pub weight: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct RevokeEvent {
    #[topic]
    pub member: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeaveEvent {
    #[topic]
    pub member: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

/// Voting-weight source for commitment registration.
///
/// The governor consults `weight_of` when a commitment is registered, never at
/// vote time: a member of weight `w` may register up to `w` commitments per
/// proposal, which keeps weight attached to the anonymous vote without linking
/// the vote back to the member.
#[contract]
pub struct VoterRoll;

#[contractimpl]
impl VoterRoll {
    /// Constructor: Initialize contract with its admin
    pub fn __constructor(env: Env, admin: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, RollError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&ADMIN, &admin);
    }

    fn assert_admin(env: &Env, admin: &Address) {
        admin.require_auth();
        if &Self::admin(env.clone()) != admin {
            panic_with_error!(env, RollError::NotAdmin);
        }
    }

    /// Helper: Add member to enumeration list
    fn add_member_to_list(env: &Env, member: &Address) {
        let current_count: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::MemberCount)
            .unwrap_or(0);

        env.storage()
            .persistent()
            .set(&DataKey::MemberAtIndex(current_count), member);
        env.storage()
            .persistent()
            .set(&DataKey::MemberCount, &(current_count + 1));
    }

    /// Enroll a member with a voting weight (admin only)
    /// Can re-enroll previously revoked members
    pub fn enroll(env: Env, admin: Address, member: Address, weight: u32) {
        Self::assert_admin(&env, &admin);

        if weight == 0 {
            panic_with_error!(&env, RollError::InvalidWeight);
        }
        if Self::is_member(env.clone(), member.clone()) {
            panic_with_error!(&env, RollError::AlreadyEnrolled);
        }

        let weight_key = DataKey::Weight(member.clone());
        let is_new_member = !env.storage().persistent().has(&weight_key);

        env.storage().persistent().set(&weight_key, &weight);
        env.storage()
            .persistent()
            .remove(&DataKey::Revoked(member.clone()));

        if is_new_member {
            Self::add_member_to_list(&env, &member);
        }

        EnrollEvent { member, weight }.publish(&env);
    }

    /// Change an active member's weight (admin only)
    pub fn set_weight(env: Env, admin: Address, member: Address, weight: u32) {
        Self::assert_admin(&env, &admin);

        if weight == 0 {
            panic_with_error!(&env, RollError::InvalidWeight);
        }
        if !Self::is_member(env.clone(), member.clone()) {
            panic_with_error!(&env, RollError::NotMember);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Weight(member.clone()), &weight);

        EnrollEvent { member, weight }.publish(&env);
    }

    /// Revoke a member (admin only)
    /// Sets revocation flag, keeping the enumeration entry intact
    pub fn revoke(env: Env, admin: Address, member: Address) {
        Self::assert_admin(&env, &admin);

        if !Self::is_member(env.clone(), member.clone()) {
            panic_with_error!(&env, RollError::NotMember);
        }
        env.storage()
            .persistent()
            .set(&DataKey::Revoked(member.clone()), &true);

        RevokeEvent { member }.publish(&env);
    }

    /// Leave voluntarily (member self-revokes)
    pub fn leave(env: Env, member: Address) {
        member.require_auth();

        if !Self::is_member(env.clone(), member.clone()) {
            panic_with_error!(&env, RollError::NotMember);
        }
        env.storage()
            .persistent()
            .set(&DataKey::Revoked(member.clone()), &true);

        LeaveEvent { member }.publish(&env);
    }

    /// Voting weight of an address (0 when not enrolled or revoked)
    pub fn weight_of(env: Env, member: Address) -> u32 {
        let revoked: bool = env
            .storage()
            .persistent()
            .get(&DataKey::Revoked(member.clone()))
            .unwrap_or(false);
        if revoked {
            return 0;
        }
        env.storage()
            .persistent()
            .get(&DataKey::Weight(member))
            .unwrap_or(0)
    }

    pub fn is_member(env: Env, member: Address) -> bool {
        Self::weight_of(env, member) > 0
    }

    pub fn admin(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&ADMIN)
            .unwrap_or_else(|| panic_with_error!(&env, RollError::NotAdmin))
    }

    /// Get total number of addresses ever enrolled
    pub fn member_count(env: Env) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::MemberCount)
            .unwrap_or(0)
    }

    /// Get a batch of enrolled addresses from offset to offset+limit
    pub fn get_members(env: Env, offset: u64, limit: u64) -> Vec<Address> {
        let mut members = Vec::new(&env);
        let count = Self::member_count(env.clone());
        let end = core::cmp::min(offset.saturating_add(limit), count);

        for i in offset..end {
            if let Some(member) = env
                .storage()
                .persistent()
                .get::<_, Address>(&DataKey::MemberAtIndex(i))
            {
                members.push_back(member);
            }
        }

        members
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }
}
