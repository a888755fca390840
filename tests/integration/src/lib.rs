#![no_std]

// Integration test crate - all code is test-only

#[cfg(test)]
mod tests {
    extern crate std;
    use soroban_sdk::{
        contract, contractimpl,
        crypto::bn254::{Fr, G1Affine},
        symbol_short,
        testutils::{Address as _, Ledger as _},
        token, vec, Address, BytesN, Env, IntoVal, String, Vec, U256,
    };

    // Import actual contract clients
    use commitment_tree::CommitmentTreeClient;
    use governor::{
        GovernorClient, GovernorConfig, GovernorError, Payload, ProposalState, ABSTAIN, AGAINST,
        FOR,
    };
    use groth16_verifier::Groth16VerifierClient;
    use timelock::TimelockClient;
    use voter_roll::VoterRollClient;
    use zkgov_groth16::{Proof, PublicInputs, VerificationKey};

    const VOTING_DELAY: u64 = 100;
    const VOTING_PERIOD: u64 = 1_000;
    const TIMELOCK_DELAY: u64 = 60;
    const TREE_DEPTH: u32 = 3;

    // Recipient of proposal actions
    #[contract]
    pub struct Grantee;

    #[contractimpl]
    impl Grantee {
        pub fn receive(env: Env, memo: u32) {
            env.storage().instance().set(&symbol_short!("memo"), &memo);
        }

        pub fn memo(env: Env) -> u32 {
            env.storage()
                .instance()
                .get(&symbol_short!("memo"))
                .unwrap_or(0)
        }
    }

    fn hex_to_bytes<const N: usize>(env: &Env, hex: &str) -> BytesN<N> {
        let bytes = hex::decode(hex).expect("invalid hex");
        assert_eq!(bytes.len(), N, "hex string wrong length");
        BytesN::from_array(env, &bytes.try_into().unwrap())
    }

    /// Helper to setup the full governor system
    struct GovernorSystem {
        env: Env,
        governor: Address,
        tree: Address,
        verifier: Address,
        timelock: Address,
        roll: Address,
        asset: Address,
        admin: Address,
    }

    impl GovernorSystem {
        fn new() -> Self {
            let env = Env::default();
            env.mock_all_auths();
            // Poseidon and pairing host calls exceed the default budget
            env.cost_estimate().budget().reset_unlimited();
            env.ledger().with_mut(|li| li.timestamp = 1_000);

            let admin = Address::generate(&env);
            let asset = env
                .register_stellar_asset_contract_v2(admin.clone())
                .address();

            // Register all contracts with their constructors
            let tree = env.register(commitment_tree::CommitmentTree, ());
            let verifier = env.register(
                groth16_verifier::Groth16Verifier,
                (Self::generator_vk(&env),),
            );
            let timelock = env.register(
                timelock::Timelock,
                (admin.clone(), TIMELOCK_DELAY, Some(asset.clone())),
            );
            let roll = env.register(voter_roll::VoterRoll, (admin.clone(),));

            let config = GovernorConfig {
                guardian: admin.clone(),
                tree: tree.clone(),
                verifier: verifier.clone(),
                timelock: timelock.clone(),
                voter_roll: Some(roll.clone()),
                tree_depth: TREE_DEPTH,
                voting_delay: VOTING_DELAY,
                voting_period: VOTING_PERIOD,
                registration_grace: 0,
                quorum: 3,
                timelock_delay: TIMELOCK_DELAY,
                queue_window: 0,
                execution_window: 0,
            };
            let governor = env.register(governor::Governor, (config,));

            TimelockClient::new(&env, &timelock).grant_proposer(&admin, &governor);

            Self {
                env,
                governor,
                tree,
                verifier,
                timelock,
                roll,
                asset,
                admin,
            }
        }

        fn governor_client(&self) -> GovernorClient {
            GovernorClient::new(&self.env, &self.governor)
        }

        fn tree_client(&self) -> CommitmentTreeClient {
            CommitmentTreeClient::new(&self.env, &self.tree)
        }

        fn timelock_client(&self) -> TimelockClient {
            TimelockClient::new(&self.env, &self.timelock)
        }

        fn roll_client(&self) -> VoterRollClient {
            VoterRollClient::new(&self.env, &self.roll)
        }

        // BN254 G1 generator: (1, 2)
        fn g1_generator(env: &Env) -> BytesN<64> {
            let mut bytes = [0u8; 64];
            bytes[31] = 1;
            bytes[63] = 2;
            BytesN::from_array(env, &bytes)
        }

        fn g2_generator(env: &Env) -> BytesN<128> {
            hex_to_bytes(
                env,
                "1800506a061286eb6a84a5730b8f10293e29816cd1913d5338f715de3e98f9ad\
                 1983904211a53f6e0b0853a90a00efbff1700c7b1dc006324d859d75e3caa5a2\
                 12c85ea5db8c6deb4aab718e806a51a56608214c3f628b962cf191eacdc80e7a\
                 090d97c09ce1486063b359f3dd89b7c43c5f18958fb3e6b96db55e19a3b7c0fb",
            )
        }

        // Every point is a generator, so A = (3 + Σ signals)·g1 satisfies the
        // pairing equation. Changing any public input breaks it.
        fn generator_vk(env: &Env) -> VerificationKey {
            let g1 = Self::g1_generator(env);
            let g2 = Self::g2_generator(env);
            let mut ic = Vec::new(env);
            for _ in 0..zkgov_groth16::EXPECTED_IC_LENGTH {
                ic.push_back(g1.clone());
            }
            VerificationKey {
                alpha: g1,
                beta: g2.clone(),
                gamma: g2.clone(),
                delta: g2,
                ic,
            }
        }

        fn prove(&self, inputs: &PublicInputs) -> Proof {
            let mut sum = U256::from_u32(&self.env, 3);
            for signal in inputs.to_signals(&self.env).iter() {
                sum = sum.add(&signal);
            }
            let a = G1Affine::from_bytes(Self::g1_generator(&self.env)) * Fr::from(sum);
            Proof {
                a: a.to_bytes(),
                b: Self::g2_generator(&self.env),
                c: Self::g1_generator(&self.env),
            }
        }

        fn commitment(&self, secret: u32) -> U256 {
            let zero = U256::from_u32(&self.env, 0);
            self.tree_client()
                .test_hash_pair(&U256::from_u32(&self.env, secret), &zero)
        }

        fn nullifier(&self, secret: u32, scope: &U256) -> U256 {
            self.tree_client()
                .test_hash_pair(&U256::from_u32(&self.env, secret), scope)
        }

        fn enroll_voters(&self, n: u32) -> std::vec::Vec<Address> {
            let roll = self.roll_client();
            (0..n)
                .map(|_| {
                    let voter = Address::generate(&self.env);
                    roll.enroll(&self.admin, &voter, &1);
                    voter
                })
                .collect()
        }

        fn propose_grant(&self, grantee: &Address, amount: i128, memo: u32) -> BytesN<32> {
            let proposer = Address::generate(&self.env);
            self.governor_client().propose(
                &proposer,
                &vec![&self.env, grantee.clone()],
                &vec![&self.env, amount],
                &vec![
                    &self.env,
                    Payload {
                        function: symbol_short!("receive"),
                        args: vec![&self.env, memo.into_val(&self.env)],
                    },
                ],
                &String::from_str(&self.env, "Grant"),
            )
        }

        // Vote with the proof a prover holding `secret` would produce
        fn vote(&self, proposal_id: &BytesN<32>, secret: u32, support: u32) {
            let governor = self.governor_client();
            let proposal = governor.get_proposal(proposal_id);
            let inputs = PublicInputs {
                root: governor.tree_info(proposal_id).2,
                nullifier_hash: self.nullifier(secret, &proposal.scope),
                scope: proposal.scope,
                support,
            };
            let proof = self.prove(&inputs);
            governor.cast_vote(
                proposal_id,
                &support,
                &inputs.nullifier_hash,
                &inputs.root,
                &proof,
            );
        }

        fn set_time(&self, timestamp: u64) {
            self.env.ledger().with_mut(|li| li.timestamp = timestamp);
        }
    }

    #[test]
    fn test_verifier_key_is_pinned() {
        let system = GovernorSystem::new();
        let verifier = Groth16VerifierClient::new(&system.env, &system.verifier);

        let vk = GovernorSystem::generator_vk(&system.env);
        assert_eq!(verifier.vk_hash(), zkgov_groth16::hash_vk(&system.env, &vk));
    }

    #[test]
    fn test_five_participants_vote_for() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(5);
        let grantee = system.env.register(Grantee, ());

        let proposal_id = system.propose_grant(&grantee, 0, 1);
        let created = governor.get_proposal(&proposal_id);

        // Register voters; every insertion moves the root
        let mut roots = std::vec![governor.tree_info(&proposal_id).2];
        for (i, voter) in voters.iter().enumerate() {
            let index = governor.register_commitment(
                &proposal_id,
                &system.commitment(i as u32 + 1),
                voter,
            );
            assert_eq!(index, i as u32);
            roots.push(governor.tree_info(&proposal_id).2);
        }
        assert_eq!(governor.tree_info(&proposal_id).1, 5);
        let changes = roots.windows(2).filter(|pair| pair[0] != pair[1]).count();
        assert_eq!(changes, 5);

        system.set_time(created.vote_start);
        assert_eq!(governor.state(&proposal_id), ProposalState::Active);

        // Votes come from whoever relays them; the registrant is not involved
        for i in 0..5u32 {
            system.vote(&proposal_id, i + 1, FOR);
        }
        assert_eq!(governor.proposal_votes(&proposal_id), (0, 5, 0));

        // Voter 1 again, with a fresh proof that verifies on its own
        let replay = PublicInputs {
            root: governor.tree_info(&proposal_id).2,
            nullifier_hash: system.nullifier(1, &created.scope),
            scope: created.scope.clone(),
            support: AGAINST,
        };
        let replay_proof = system.prove(&replay);
        assert!(Groth16VerifierClient::new(&system.env, &system.verifier)
            .verify(&replay, &replay_proof));
        assert_eq!(
            governor.try_cast_vote(
                &proposal_id,
                &AGAINST,
                &replay.nullifier_hash,
                &replay.root,
                &replay_proof
            ),
            Err(Ok(GovernorError::NullifierAlreadyUsed))
        );
        assert_eq!(governor.proposal_votes(&proposal_id), (0, 5, 0));

        system.set_time(created.vote_end);
        assert_eq!(governor.state(&proposal_id) as u32, 4);
    }

    #[test]
    fn test_proof_is_bound_to_support() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(1);
        let grantee = system.env.register(Grantee, ());

        let proposal_id = system.propose_grant(&grantee, 0, 1);
        governor.register_commitment(&proposal_id, &system.commitment(1), &voters[0]);
        let proposal = governor.get_proposal(&proposal_id);
        system.set_time(proposal.vote_start);

        let inputs = PublicInputs {
            root: governor.tree_info(&proposal_id).2,
            nullifier_hash: system.nullifier(1, &proposal.scope),
            scope: proposal.scope,
            support: FOR,
        };
        let proof = system.prove(&inputs);

        // Same proof replayed as an AGAINST vote
        assert_eq!(
            governor.try_cast_vote(
                &proposal_id,
                &AGAINST,
                &inputs.nullifier_hash,
                &inputs.root,
                &proof
            ),
            Err(Ok(GovernorError::InvalidProof))
        );
        assert!(!governor.is_nullifier_used(&proposal_id, &inputs.nullifier_hash));

        governor.cast_vote(
            &proposal_id,
            &FOR,
            &inputs.nullifier_hash,
            &inputs.root,
            &proof,
        );
        assert_eq!(governor.tally(&proposal_id, &FOR), 1);
    }

    #[test]
    fn test_off_curve_proof_rejected_as_invalid() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(1);
        let grantee = system.env.register(Grantee, ());

        let proposal_id = system.propose_grant(&grantee, 0, 1);
        governor.register_commitment(&proposal_id, &system.commitment(1), &voters[0]);
        let proposal = governor.get_proposal(&proposal_id);
        system.set_time(proposal.vote_start);

        let inputs = PublicInputs {
            root: governor.tree_info(&proposal_id).2,
            nullifier_hash: system.nullifier(1, &proposal.scope),
            scope: proposal.scope,
            support: FOR,
        };
        let honest = system.prove(&inputs);

        // (1, 3) is not on y^2 = x^3 + 3
        let mut off_curve = [0u8; 64];
        off_curve[31] = 1;
        off_curve[63] = 3;
        let malformed = Proof {
            a: BytesN::from_array(&system.env, &off_curve),
            b: honest.b.clone(),
            c: honest.c.clone(),
        };

        assert_eq!(
            governor.try_cast_vote(
                &proposal_id,
                &FOR,
                &inputs.nullifier_hash,
                &inputs.root,
                &malformed
            ),
            Err(Ok(GovernorError::InvalidProof))
        );
        assert!(!governor.is_nullifier_used(&proposal_id, &inputs.nullifier_hash));
        assert_eq!(governor.proposal_votes(&proposal_id), (0, 0, 0));

        governor.cast_vote(
            &proposal_id,
            &FOR,
            &inputs.nullifier_hash,
            &inputs.root,
            &honest,
        );
        assert_eq!(governor.tally(&proposal_id, &FOR), 1);
    }

    #[test]
    fn test_full_lifecycle_through_timelock() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(4);
        let grantee = system.env.register(Grantee, ());
        token::StellarAssetClient::new(&system.env, &system.asset)
            .mint(&system.timelock, &1_000);

        let proposal_id = system.propose_grant(&grantee, 400, 42);
        let proposal = governor.get_proposal(&proposal_id);
        for (i, voter) in voters.iter().enumerate() {
            governor.register_commitment(&proposal_id, &system.commitment(i as u32 + 1), voter);
        }

        system.set_time(proposal.vote_start);
        system.vote(&proposal_id, 1, FOR);
        system.vote(&proposal_id, 2, FOR);
        system.vote(&proposal_id, 3, ABSTAIN);
        system.vote(&proposal_id, 4, AGAINST);

        system.set_time(proposal.vote_end);
        assert_eq!(governor.finalize(&proposal_id), ProposalState::Succeeded);

        let operation_id = governor.queue(&proposal_id);
        let timelock = system.timelock_client();
        assert!(timelock.get_operation(&operation_id).is_some());
        assert!(!timelock.is_ready(&operation_id));
        assert_eq!(
            governor.try_execute(&proposal_id),
            Err(Ok(GovernorError::InvalidState))
        );

        system.set_time(proposal.vote_end + TIMELOCK_DELAY);
        governor.execute(&proposal_id);

        assert!(timelock.is_done(&operation_id));
        assert_eq!(governor.state(&proposal_id), ProposalState::Executed);
        assert_eq!(GranteeClient::new(&system.env, &grantee).memo(), 42);

        let balances = token::Client::new(&system.env, &system.asset);
        assert_eq!(balances.balance(&grantee), 400);
        assert_eq!(balances.balance(&system.timelock), 600);
    }

    #[test]
    fn test_guardian_cancel_clears_timelock_operation() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(3);
        let grantee = system.env.register(Grantee, ());

        let proposal_id = system.propose_grant(&grantee, 0, 7);
        let proposal = governor.get_proposal(&proposal_id);
        for (i, voter) in voters.iter().enumerate() {
            governor.register_commitment(&proposal_id, &system.commitment(i as u32 + 1), voter);
        }

        system.set_time(proposal.vote_start);
        for secret in 1..=3u32 {
            system.vote(&proposal_id, secret, FOR);
        }
        system.set_time(proposal.vote_end);
        let operation_id = governor.queue(&proposal_id);

        governor.cancel(&proposal_id, &system.admin);
        assert!(system.timelock_client().get_operation(&operation_id).is_none());
        assert_eq!(governor.state(&proposal_id), ProposalState::Canceled);
        assert_eq!(GranteeClient::new(&system.env, &grantee).memo(), 0);
    }

    #[test]
    fn test_defeated_proposal_can_be_proposed_again() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(1);
        let grantee = system.env.register(Grantee, ());

        let proposal_id = system.propose_grant(&grantee, 0, 9);
        let first = governor.get_proposal(&proposal_id);
        governor.register_commitment(&proposal_id, &system.commitment(1), &voters[0]);
        system.set_time(first.vote_start);
        system.vote(&proposal_id, 1, FOR);

        // One vote is below quorum
        system.set_time(first.vote_end);
        assert_eq!(governor.state(&proposal_id), ProposalState::Defeated);

        let again = system.propose_grant(&grantee, 0, 9);
        assert_eq!(again, proposal_id);
        let second = governor.get_proposal(&proposal_id);
        assert_eq!(second.round, 1);

        // The member's weight is available again in the new round, and the
        // old nullifier is fresh under the new scope
        governor.register_commitment(&proposal_id, &system.commitment(1), &voters[0]);
        system.set_time(second.vote_start);
        system.vote(&proposal_id, 1, FOR);
        assert_eq!(governor.proposal_votes(&proposal_id), (0, 1, 0));

        // Round 0 keeps its record, tally and outcome
        assert_eq!(governor.get_round(&proposal_id, &0), first);
        assert_eq!(governor.round_votes(&proposal_id, &0), (0, 1, 0));
        assert_eq!(
            governor.round_state(&proposal_id, &0),
            ProposalState::Defeated
        );
        assert_eq!(governor.round_votes(&proposal_id, &1), (0, 1, 0));
    }

    #[test]
    fn test_registration_requires_enrolment() {
        let system = GovernorSystem::new();
        let governor = system.governor_client();
        let voters = system.enroll_voters(1);
        let grantee = system.env.register(Grantee, ());
        let proposal_id = system.propose_grant(&grantee, 0, 1);

        governor.register_commitment(&proposal_id, &system.commitment(1), &voters[0]);
        assert_eq!(
            governor.try_register_commitment(&proposal_id, &system.commitment(2), &voters[0]),
            Err(Ok(GovernorError::Unauthorized))
        );

        system.roll_client().revoke(&system.admin, &voters[0]);
        let fresh = system.propose_grant(&grantee, 0, 2);
        assert_eq!(
            governor.try_register_commitment(&fresh, &system.commitment(3), &voters[0]),
            Err(Ok(GovernorError::Unauthorized))
        );
    }
}
