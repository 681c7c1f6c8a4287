//! Input signing.
//!
//! [`Signer`] is the seam for hardware wallets and remote signers.
//! [`KeySigner`] signs with a single in-memory secp256k1 key using the
//! scheme named by the skeleton's chain parameters.

use bitcoin::consensus;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::script::{Script, ScriptBuf};
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{CompressedPublicKey, Transaction};
use log::trace;

use crate::assembly::{SignedTx, UnsignedTxSkeleton};
use crate::error::UtxoError;
use crate::params::SigScheme;

/// SIGHASH_ALL | SIGHASH_FORKID
const SIGHASH_ALL_FORKID: u32 = 0x41;

/// Unlocking data for one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSignature {
    pub script_sig: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
}

/// Produces the unlocking data for one input of a skeleton.
pub trait Signer {
    fn sign_input(
        &self,
        skeleton: &UnsignedTxSkeleton,
        input_index: usize,
    ) -> Result<InputSignature, UtxoError>;
}

/// Sign every input of `skeleton`, in order.
pub fn sign_all<S: Signer + ?Sized>(
    signer: &S,
    skeleton: &UnsignedTxSkeleton,
) -> Result<Vec<InputSignature>, UtxoError> {
    (0..skeleton.inputs().len())
        .map(|index| signer.sign_input(skeleton, index))
        .collect()
}

/// Sign all inputs and serialize the result.
pub fn sign_skeleton<S: Signer + ?Sized>(
    signer: &S,
    skeleton: &UnsignedTxSkeleton,
) -> Result<SignedTx, UtxoError> {
    let signatures = sign_all(signer, skeleton)?;
    skeleton.finalize(&signatures)
}

/// Single-key signer. All inputs must be locked to this key.
pub struct KeySigner {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeySigner {
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, UtxoError> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(secret)
            .map_err(|e| UtxoError::SigningError(format!("invalid secret key: {e}")))?;
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secp,
            secret_key,
            public_key,
        })
    }

    /// Compressed SEC1 public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    /// The scriptPubKey this key can spend under `scheme`.
    pub fn locking_script(&self, scheme: SigScheme) -> ScriptBuf {
        match scheme {
            SigScheme::SegwitV0 => {
                ScriptBuf::new_p2wpkh(&CompressedPublicKey(self.public_key).wpubkey_hash())
            }
            SigScheme::Legacy | SigScheme::LegacyForkId => {
                ScriptBuf::new_p2pkh(&bitcoin::PublicKey::new(self.public_key).pubkey_hash())
            }
        }
    }

    fn sign_digest(&self, digest: [u8; 32], sighash_byte: u8) -> Vec<u8> {
        let msg = Message::from_digest(digest);
        let signature = self.secp.sign_ecdsa(&msg, &self.secret_key);
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(sighash_byte);
        sig_bytes
    }

    /// `<sig> <pubkey>` as direct pushes.
    fn p2pkh_script_sig(&self, sig: &[u8]) -> Vec<u8> {
        let pubkey = self.public_key.serialize();
        let mut script = Vec::with_capacity(2 + sig.len() + pubkey.len());
        script.push(sig.len() as u8);
        script.extend_from_slice(sig);
        script.push(pubkey.len() as u8);
        script.extend_from_slice(&pubkey);
        script
    }
}

impl Drop for KeySigner {
    fn drop(&mut self) {
        self.secret_key.non_secure_erase();
    }
}

impl Signer for KeySigner {
    fn sign_input(
        &self,
        skeleton: &UnsignedTxSkeleton,
        input_index: usize,
    ) -> Result<InputSignature, UtxoError> {
        let input = skeleton.inputs().get(input_index).ok_or_else(|| {
            UtxoError::SigningError(format!("input index {input_index} out of range"))
        })?;
        let scheme = skeleton.params().sig_scheme;
        let script_pubkey = self.locking_script(scheme);
        if script_pubkey.as_bytes() != input.utxo.script_pubkey.as_slice() {
            return Err(UtxoError::SigningError(format!(
                "input {} is not locked to this key",
                input.utxo.outpoint()
            )));
        }

        let tx = skeleton.to_unsigned_transaction()?;
        let value = input.utxo.value.units();
        trace!("signing input {input_index} ({:?})", scheme);

        match scheme {
            SigScheme::SegwitV0 => {
                let sighash = SighashCache::new(&tx)
                    .p2wpkh_signature_hash(
                        input_index,
                        &script_pubkey,
                        bitcoin::Amount::from_sat(value),
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| UtxoError::SigningError(format!("sighash computation failed: {e}")))?;
                let sig = self.sign_digest(sighash.to_byte_array(), EcdsaSighashType::All as u8);
                Ok(InputSignature {
                    script_sig: Vec::new(),
                    witness: vec![sig, self.public_key.serialize().to_vec()],
                })
            }
            SigScheme::Legacy => {
                let sighash = SighashCache::new(&tx)
                    .legacy_signature_hash(
                        input_index,
                        &script_pubkey,
                        EcdsaSighashType::All.to_u32(),
                    )
                    .map_err(|e| UtxoError::SigningError(format!("sighash computation failed: {e}")))?;
                let sig = self.sign_digest(sighash.to_byte_array(), EcdsaSighashType::All as u8);
                Ok(InputSignature {
                    script_sig: self.p2pkh_script_sig(&sig),
                    witness: Vec::new(),
                })
            }
            SigScheme::LegacyForkId => {
                let digest =
                    forkid_signature_hash(&tx, input_index, &script_pubkey, value, SIGHASH_ALL_FORKID)?;
                let sig = self.sign_digest(digest, SIGHASH_ALL_FORKID as u8);
                Ok(InputSignature {
                    script_sig: self.p2pkh_script_sig(&sig),
                    witness: Vec::new(),
                })
            }
        }
    }
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// BIP-143 style digest as used by Bitcoin Cash replay protection.
///
/// `script_code` is the P2PKH script of the spent output.
pub(crate) fn forkid_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    sighash_type: u32,
) -> Result<[u8; 32], UtxoError> {
    let input = tx.input.get(input_index).ok_or_else(|| {
        UtxoError::SigningError(format!("input index {input_index} out of range"))
    })?;

    let mut prevouts = Vec::with_capacity(36 * tx.input.len());
    let mut sequences = Vec::with_capacity(4 * tx.input.len());
    for txin in &tx.input {
        prevouts.extend(consensus::serialize(&txin.previous_output));
        sequences.extend(consensus::serialize(&txin.sequence));
    }
    let mut outputs = Vec::new();
    for txout in &tx.output {
        outputs.extend(consensus::serialize(txout));
    }

    let mut preimage = Vec::with_capacity(256);
    preimage.extend(consensus::serialize(&tx.version));
    preimage.extend_from_slice(&double_sha256(&prevouts));
    preimage.extend_from_slice(&double_sha256(&sequences));
    preimage.extend(consensus::serialize(&input.previous_output));
    preimage.extend(consensus::serialize(&script_code.to_owned()));
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend(consensus::serialize(&input.sequence));
    preimage.extend_from_slice(&double_sha256(&outputs));
    preimage.extend(consensus::serialize(&tx.lock_time));
    preimage.extend_from_slice(&sighash_type.to_le_bytes());

    Ok(double_sha256(&preimage))
}
