use alloy_primitives::{keccak256, Address, B256, U256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SecretKey, SECP256K1};

use crate::errors::{EngineError, EngineResult};
use crate::params::SEAL_LEN;

const SECP256K1_N: U256 = U256::from_limbs([
    0xbfd2_5e8c_d036_4141,
    0xbaae_dce6_af48_a03b,
    0xffff_ffff_ffff_fffe,
    0xffff_ffff_ffff_ffff,
]);
const SECP256K1_HALF_N: U256 = U256::from_limbs([
    0xdfe9_2f46_681b_20a0,
    0x5d57_6e73_57a4_501d,
    0xffff_ffff_ffff_ffff,
    0x7fff_ffff_ffff_ffff,
]);

/// Signature domain validation with the homestead low-s rule.
pub fn validate_signature_values(v: u8, r: U256, s: U256) -> bool {
    if r < U256::from(1) || s < U256::from(1) {
        return false;
    }
    if s > SECP256K1_HALF_N {
        return false;
    }
    r < SECP256K1_N && s < SECP256K1_N && (v == 0 || v == 1)
}

/// Recovers the uncompressed public key from a 65-byte `(r || s || v)`
/// signature over the given digest.
pub fn ecrecover(hash: B256, signature: &[u8]) -> EngineResult<[u8; 65]> {
    if signature.len() != SEAL_LEN {
        return Err(EngineError::MissingSignature);
    }
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)
        .map_err(|err| EngineError::Crypto(err.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|err| EngineError::Crypto(err.to_string()))?;
    let message = Message::from_digest_slice(hash.as_slice())
        .map_err(|err| EngineError::Crypto(err.to_string()))?;
    let pubkey = SECP256K1
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| EngineError::InvalidSignature)?;
    Ok(pubkey.serialize_uncompressed())
}

/// Address of an uncompressed public key: the low 20 bytes of the keccak of
/// the unprefixed key material.
pub fn pubkey_to_address(pubkey: &[u8; 65]) -> Address {
    Address::from_slice(&keccak256(&pubkey[1..])[12..])
}

/// Produces a 65-byte recoverable signature over the digest. Realises the
/// signer callback for local keys and test fixtures; the wallet layer is the
/// production implementation.
pub fn sign_hash(secret: &SecretKey, hash: B256) -> EngineResult<Vec<u8>> {
    let message = Message::from_digest_slice(hash.as_slice())
        .map_err(|err| EngineError::Crypto(err.to_string()))?;
    let signature = SECP256K1.sign_ecdsa_recoverable(&message, secret);
    let (recovery_id, compact) = signature.serialize_compact();
    let mut out = Vec::with_capacity(SEAL_LEN);
    out.extend_from_slice(&compact);
    out.push(recovery_id.to_i32() as u8);
    Ok(out)
}
