use crate::bitcoin::secp256k1::{ecdsa, All, Message, Secp256k1};
use crate::bitcoin::{Amount, PubkeyHash, PublicKey, Script, Transaction};
use crate::provider::SigningProvider;
use crate::sighash::{signature_hash, SigHashType, SIGHASH_ALL, SIGHASH_FORKID};

/// Checks a signature (sighash byte included) against a public key
pub trait SignatureChecker {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> bool;
}

/// Produces signatures for one input of one transaction
pub trait SignatureCreator {
    fn checker(&self) -> &dyn SignatureChecker;

    /// Signs `script_code` with the private key behind `key_id`, if the provider has it
    fn create_sig(
        &self,
        provider: &dyn SigningProvider,
        key_id: &PubkeyHash,
        script_code: &Script,
    ) -> Option<Vec<u8>>;
}

/// Verifies ECDSA signatures over the digest of a bound input
pub struct TransactionSignatureChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: Amount,
    secp: Secp256k1<All>,
}

impl<'a> TransactionSignatureChecker<'a> {
    pub fn new(tx: &'a Transaction, input_index: usize, amount: Amount) -> Self {
        TransactionSignatureChecker {
            tx,
            input_index,
            amount,
            secp: Secp256k1::new(),
        }
    }
}

impl SignatureChecker for TransactionSignatureChecker<'_> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> bool {
        let Some((hash_type, der)) = sig.split_last() else {
            return false;
        };
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Ok(mut signature) = ecdsa::Signature::from_der_lax(der) else {
            return false;
        };
        signature.normalize_s();
        let sighash = SigHashType::from_u32(*hash_type as u32);
        let Ok(digest) = signature_hash(self.tx, self.input_index, script_code, self.amount, sighash)
        else {
            return false;
        };
        self.secp
            .verify_ecdsa(&Message::from_digest(digest), &signature, &pubkey.inner)
            .is_ok()
    }
}

/// Real signer bound to `tx`, `input_index`, the spent `amount` and a sighash type
pub struct TransactionSignatureCreator<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: Amount,
    sighash_type: SigHashType,
    checker: TransactionSignatureChecker<'a>,
}

impl<'a> TransactionSignatureCreator<'a> {
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        amount: Amount,
        sighash_type: SigHashType,
    ) -> Self {
        TransactionSignatureCreator {
            tx,
            input_index,
            amount,
            sighash_type,
            checker: TransactionSignatureChecker::new(tx, input_index, amount),
        }
    }
}

impl SignatureCreator for TransactionSignatureCreator<'_> {
    fn checker(&self) -> &dyn SignatureChecker {
        &self.checker
    }

    fn create_sig(
        &self,
        provider: &dyn SigningProvider,
        key_id: &PubkeyHash,
        script_code: &Script,
    ) -> Option<Vec<u8>> {
        let key = provider.get_key(key_id)?;
        let digest = signature_hash(
            self.tx,
            self.input_index,
            script_code,
            self.amount,
            self.sighash_type,
        )
        .ok()?;
        let signature = self
            .checker
            .secp
            .sign_ecdsa(&Message::from_digest(digest), &key.inner);
        let mut sig = signature.serialize_der().to_vec();
        sig.push(self.sighash_type.to_byte());
        Some(sig)
    }
}

/// Accepts every signature
#[derive(Debug, Clone, Copy, Default)]
pub struct DummySignatureChecker;

impl SignatureChecker for DummySignatureChecker {
    fn check_sig(&self, _sig: &[u8], _pubkey: &[u8], _script_code: &Script) -> bool {
        true
    }
}

/// Emits DER-shaped placeholder signatures of a fixed size without looking
/// up any key. Used for size estimation and solvability checks.
#[derive(Debug, Clone, Copy)]
pub struct DummySignatureCreator {
    r_len: u8,
    s_len: u8,
}

impl DummySignatureCreator {
    pub const fn new(r_len: u8, s_len: u8) -> Self {
        DummySignatureCreator { r_len, s_len }
    }

    pub fn signature_len(&self) -> usize {
        self.r_len as usize + self.s_len as usize + 7
    }
}

/// 71 byte signatures
pub const DUMMY_SIGNATURE_CREATOR: DummySignatureCreator = DummySignatureCreator::new(32, 32);
/// 72 byte signatures, the largest a low-S signer produces
pub const DUMMY_MAXIMUM_SIGNATURE_CREATOR: DummySignatureCreator =
    DummySignatureCreator::new(33, 32);

impl SignatureCreator for DummySignatureCreator {
    fn checker(&self) -> &dyn SignatureChecker {
        &DummySignatureChecker
    }

    fn create_sig(
        &self,
        _provider: &dyn SigningProvider,
        _key_id: &PubkeyHash,
        _script_code: &Script,
    ) -> Option<Vec<u8>> {
        let r = self.r_len as usize;
        let s = self.s_len as usize;
        let mut sig = vec![0u8; self.signature_len()];
        sig[0] = 0x30;
        sig[1] = self.r_len + self.s_len + 4;
        sig[2] = 0x02;
        sig[3] = self.r_len;
        sig[4] = 0x01;
        sig[4 + r] = 0x02;
        sig[5 + r] = self.s_len;
        sig[6 + r] = 0x01;
        sig[6 + r + s] = (SIGHASH_ALL | SIGHASH_FORKID) as u8;
        Some(sig)
    }
}
