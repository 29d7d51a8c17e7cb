//! Finalize authorization signing.
//!
//! Produces the EIP-712 signature that binds `(arena, winners, amounts,
//! nonce)` so the escrow contract accepts exactly this distribution and no
//! other. The orchestrator never holds the operator key: [`SigningService`]
//! is injected, and the bundled [`LocalOperatorSigner`] exists for dev
//! deployments and tests.
//!
//! Typed data layout (mirrors the escrow's verifier):
//! ```text
//! domain    = EIP712Domain(name "ClawArena", version "1", chainId, verifyingContract = arena)
//! Finalize  = (address arena, bytes32 winnersHash, bytes32 amountsHash, uint256 nonce)
//! winnersHash = keccak256(packed 20-byte addresses, rank order)
//! amountsHash = keccak256(packed 32-byte big-endian amounts, same order)
//! digest      = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)
//! ```

use claw_types::constants::{DOMAIN_NAME, DOMAIN_VERSION};
use claw_types::{economy, Address, Arena, FinalizeError, GameStatus, H256, U256};
use ethers_core::types::Signature;
use ethers_signers::{LocalWallet, Signer as _};
use sha3::{Digest, Keccak256};
use tracing::info;

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const FINALIZE_TYPE: &str =
    "Finalize(address arena,bytes32 winnersHash,bytes32 amountsHash,uint256 nonce)";

/// A 65-byte `(r, s, v)` recoverable signature.
pub type RecoverableSignature = [u8; 65];

fn keccak(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn word_from_u256(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn word_from_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// `keccak256(abi.encodePacked(address[]))` over the rank-ordered winners.
pub fn winners_hash(winners: &[Address]) -> H256 {
    let mut packed = Vec::with_capacity(winners.len() * 20);
    for winner in winners {
        packed.extend_from_slice(winner.as_bytes());
    }
    H256(keccak(&packed))
}

/// `keccak256(abi.encodePacked(uint256[]))` over the amounts.
pub fn amounts_hash(amounts: &[U256]) -> H256 {
    let mut packed = Vec::with_capacity(amounts.len() * 32);
    for amount in amounts {
        packed.extend_from_slice(&word_from_u256(*amount));
    }
    H256(keccak(&packed))
}

/// EIP-712 domain separator; the arena escrow is the verifying contract, so
/// authorizations are chain- and arena-bound.
pub fn domain_separator(chain_id: u64, arena: &Address) -> H256 {
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(&keccak(DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak(DOMAIN_NAME.as_bytes()));
    encoded.extend_from_slice(&keccak(DOMAIN_VERSION.as_bytes()));
    encoded.extend_from_slice(&word_from_u256(U256::from(chain_id)));
    encoded.extend_from_slice(&word_from_address(arena));
    H256(keccak(&encoded))
}

fn struct_hash(arena: &Address, winners: &[Address], amounts: &[U256], nonce: u64) -> H256 {
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(&keccak(FINALIZE_TYPE.as_bytes()));
    encoded.extend_from_slice(&word_from_address(arena));
    encoded.extend_from_slice(winners_hash(winners).as_bytes());
    encoded.extend_from_slice(amounts_hash(amounts).as_bytes());
    encoded.extend_from_slice(&word_from_u256(U256::from(nonce)));
    H256(keccak(&encoded))
}

/// The digest the operator key signs.
pub fn finalize_digest(
    chain_id: u64,
    arena: &Address,
    winners: &[Address],
    amounts: &[U256],
    nonce: u64,
) -> H256 {
    let mut preimage = Vec::with_capacity(2 + 64);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator(chain_id, arena).as_bytes());
    preimage.extend_from_slice(struct_hash(arena, winners, amounts, nonce).as_bytes());
    H256(keccak(&preimage))
}

/// Validate a finalize request against the arena's terminal state. All
/// preconditions must hold or signing is refused; nothing is mutated here.
///
/// A stale nonce reports `NonceReused` even on an already-finalized arena,
/// so a replayed request is distinguishable from a merely repeated one.
pub fn validate_finalize(
    arena: &Arena,
    winners: &[Address],
    amounts: &[U256],
    nonce: u64,
) -> Result<(), FinalizeError> {
    if nonce <= arena.used_nonce {
        return Err(FinalizeError::NonceReused);
    }
    if arena.is_finalized {
        return Err(FinalizeError::AlreadyFinalized);
    }
    if !arena.is_closed || arena.game_status != GameStatus::Finished {
        return Err(FinalizeError::ArenaNotClosed);
    }
    if nonce != arena.used_nonce + 1 {
        // Skipping ahead would burn nonces the contract has never seen.
        return Err(FinalizeError::NonceReused);
    }
    if winners.is_empty() || winners.len() != amounts.len() {
        return Err(FinalizeError::InvalidWinner);
    }
    let mut seen = std::collections::HashSet::new();
    for winner in winners {
        if !arena.players.contains(winner) || !seen.insert(winner) {
            return Err(FinalizeError::InvalidWinner);
        }
    }

    let pool = arena
        .config
        .entry_fee
        .checked_mul(U256::from(arena.player_count()))
        .ok_or(FinalizeError::PayoutExceedsEscrow)?;
    let available = pool - economy::protocol_fee(pool, arena.config.protocol_fee_bps);
    let mut total = U256::zero();
    for amount in amounts {
        total = total
            .checked_add(*amount)
            .ok_or(FinalizeError::PayoutExceedsEscrow)?;
    }
    if total > available {
        return Err(FinalizeError::PayoutExceedsEscrow);
    }
    Ok(())
}

/// Normalize the recovery byte into {27, 28}.
pub fn normalize_v(signature: &mut RecoverableSignature) {
    if signature[64] < 27 {
        signature[64] += 27;
    }
}

/// Recover the signing address from a digest and signature. Used to check
/// the authorization actually came from the operator.
pub fn recover_operator(digest: H256, signature: &RecoverableSignature) -> Option<Address> {
    let signature = Signature::try_from(signature.as_slice()).ok()?;
    signature.recover(digest).ok()
}

/// External signing boundary. Implementations hold the key; the
/// orchestrator only ever sees digests and signatures.
pub trait SigningService: Send + Sync {
    fn operator(&self) -> Address;

    /// Sign a 32-byte digest; the only failure mode the core distinguishes
    /// is unavailability, which the caller retries with backoff.
    fn sign_digest(&self, digest: H256) -> Result<RecoverableSignature, FinalizeError>;
}

/// In-process operator wallet for dev deployments and tests.
pub struct LocalOperatorSigner {
    wallet: LocalWallet,
}

impl LocalOperatorSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        let signer = Self { wallet };
        info!(operator = ?signer.operator(), "local operator signer ready");
        signer
    }

    pub fn from_hex_key(hex_key: &str) -> Result<Self, FinalizeError> {
        let wallet: LocalWallet = hex_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?;
        Ok(Self::new(wallet))
    }
}

impl SigningService for LocalOperatorSigner {
    fn operator(&self) -> Address {
        self.wallet.address()
    }

    fn sign_digest(&self, digest: H256) -> Result<RecoverableSignature, FinalizeError> {
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?;
        let bytes = signature.to_vec();
        let mut out: RecoverableSignature = bytes
            .try_into()
            .map_err(|_| FinalizeError::SigningServiceUnavailable)?;
        normalize_v(&mut out);
        Ok(out)
    }
}

/// Signer that fails a configured number of times before succeeding.
/// Exercises the transient-unavailability retry path.
pub struct FlakySigner<S> {
    inner: S,
    failures_left: std::sync::Mutex<u32>,
}

impl<S: SigningService> FlakySigner<S> {
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            failures_left: std::sync::Mutex::new(failures),
        }
    }
}

impl<S: SigningService> SigningService for FlakySigner<S> {
    fn operator(&self) -> Address {
        self.inner.operator()
    }

    fn sign_digest(&self, digest: H256) -> Result<RecoverableSignature, FinalizeError> {
        let mut left = self.failures_left.lock().expect("flaky lock");
        if *left > 0 {
            *left -= 1;
            return Err(FinalizeError::SigningServiceUnavailable);
        }
        self.inner.sign_digest(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_types::arena::{ArenaConfig, CreatedBy, Network, PayoutScheme};
    use claw_types::{GameResults, GameType};

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const CHAIN_ID: u64 = 10_143;

    fn finished_arena() -> Arena {
        let mut arena = Arena::new(
            Address::repeat_byte(0xa1),
            ArenaConfig {
                name: "signer test".into(),
                entry_fee: U256::exp10(15),
                max_players: 2,
                protocol_fee_bps: 250,
                treasury: Address::zero(),
                registration_deadline_ms: None,
                game_type: GameType::Prediction,
                network: Network::Testnet,
                created_by: CreatedBy::Admin,
                creation_reason: None,
                payout_scheme: PayoutScheme::EqualSplit,
            },
            0,
        )
        .unwrap();
        arena.record_join(Address::repeat_byte(1), 1).unwrap();
        arena.record_join(Address::repeat_byte(2), 2).unwrap();
        arena.close(3).unwrap();
        arena.begin_learning("g".into(), 4).unwrap();
        arena.begin_active(5).unwrap();
        arena
            .finish(
                vec![Address::repeat_byte(1), Address::repeat_byte(2)],
                GameResults::default(),
                6,
            )
            .unwrap();
        arena
    }

    fn valid_amounts(arena: &Arena) -> Vec<U256> {
        economy::split(
            arena.config.entry_fee,
            arena.player_count(),
            arena.config.protocol_fee_bps,
            arena.winners.len(),
            PayoutScheme::EqualSplit,
        )
        .unwrap()
        .payouts
    }

    #[test]
    fn digest_round_trip_recovers_operator() {
        let signer = LocalOperatorSigner::from_hex_key(TEST_KEY).unwrap();
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        let digest = finalize_digest(CHAIN_ID, &arena.address, &arena.winners, &amounts, 1);
        let signature = signer.sign_digest(digest).unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);
        assert_eq!(recover_operator(digest, &signature), Some(signer.operator()));
    }

    #[test]
    fn digest_binds_every_field() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        let base = finalize_digest(CHAIN_ID, &arena.address, &arena.winners, &amounts, 1);

        assert_ne!(
            base,
            finalize_digest(CHAIN_ID + 1, &arena.address, &arena.winners, &amounts, 1)
        );
        assert_ne!(
            base,
            finalize_digest(CHAIN_ID, &Address::repeat_byte(9), &arena.winners, &amounts, 1)
        );
        assert_ne!(
            base,
            finalize_digest(CHAIN_ID, &arena.address, &arena.winners, &amounts, 2)
        );
        let mut reversed = arena.winners.clone();
        reversed.reverse();
        assert_ne!(
            base,
            finalize_digest(CHAIN_ID, &arena.address, &reversed, &amounts, 1)
        );
    }

    #[test]
    fn validate_accepts_the_happy_path() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        assert_eq!(validate_finalize(&arena, &arena.winners, &amounts, 1), Ok(()));
    }

    #[test]
    fn nonce_reuse_then_already_finalized() {
        let mut arena = finished_arena();
        let amounts = valid_amounts(&arena);
        arena
            .record_finalization(amounts.clone(), vec![0u8; 65], 1, 10)
            .unwrap();

        // Replaying nonce 1 is nonce reuse; moving on to nonce 2 hits the
        // finalized guard.
        assert_eq!(
            validate_finalize(&arena, &arena.winners.clone(), &amounts, 1),
            Err(FinalizeError::NonceReused)
        );
        assert_eq!(
            validate_finalize(&arena, &arena.winners.clone(), &amounts, 2),
            Err(FinalizeError::AlreadyFinalized)
        );
    }

    #[test]
    fn nonce_must_be_exactly_next() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        assert_eq!(
            validate_finalize(&arena, &arena.winners, &amounts, 3),
            Err(FinalizeError::NonceReused)
        );
    }

    #[test]
    fn foreign_winner_rejected() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        let winners = vec![Address::repeat_byte(0x77), Address::repeat_byte(2)];
        assert_eq!(
            validate_finalize(&arena, &winners, &amounts, 1),
            Err(FinalizeError::InvalidWinner)
        );
    }

    #[test]
    fn duplicate_winner_rejected() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        let winners = vec![Address::repeat_byte(1), Address::repeat_byte(1)];
        assert_eq!(
            validate_finalize(&arena, &winners, &amounts, 1),
            Err(FinalizeError::InvalidWinner)
        );
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let arena = finished_arena();
        let amounts = valid_amounts(&arena);
        assert_eq!(
            validate_finalize(&arena, &arena.winners[..1], &amounts, 1),
            Err(FinalizeError::InvalidWinner)
        );
        assert_eq!(
            validate_finalize(&arena, &[], &[], 1),
            Err(FinalizeError::InvalidWinner)
        );
    }

    #[test]
    fn overdraw_rejected() {
        let arena = finished_arena();
        let pool = arena.config.entry_fee * U256::from(2u64);
        let amounts = vec![pool, U256::one()];
        assert_eq!(
            validate_finalize(&arena, &arena.winners, &amounts, 1),
            Err(FinalizeError::PayoutExceedsEscrow)
        );
    }

    #[test]
    fn open_arena_rejected() {
        let mut arena = finished_arena();
        arena.game_status = GameStatus::Active;
        let amounts = valid_amounts(&arena);
        assert_eq!(
            validate_finalize(&arena, &arena.winners.clone(), &amounts, 1),
            Err(FinalizeError::ArenaNotClosed)
        );
    }

    #[test]
    fn normalize_v_lifts_raw_recovery_ids() {
        let mut signature = [0u8; 65];
        signature[64] = 0;
        normalize_v(&mut signature);
        assert_eq!(signature[64], 27);
        signature[64] = 1;
        normalize_v(&mut signature);
        assert_eq!(signature[64], 28);
        signature[64] = 28;
        normalize_v(&mut signature);
        assert_eq!(signature[64], 28);
    }

    #[test]
    fn flaky_signer_recovers_after_failures() {
        let signer = FlakySigner::new(LocalOperatorSigner::from_hex_key(TEST_KEY).unwrap(), 2);
        let digest = H256::repeat_byte(5);
        assert_eq!(
            signer.sign_digest(digest),
            Err(FinalizeError::SigningServiceUnavailable)
        );
        assert_eq!(
            signer.sign_digest(digest),
            Err(FinalizeError::SigningServiceUnavailable)
        );
        assert!(signer.sign_digest(digest).is_ok());
    }

    #[test]
    fn packed_hashes_distinguish_order() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        assert_ne!(winners_hash(&[a, b]), winners_hash(&[b, a]));
        assert_ne!(
            amounts_hash(&[U256::one(), U256::from(2u64)]),
            amounts_hash(&[U256::from(2u64), U256::one()])
        );
    }
}
