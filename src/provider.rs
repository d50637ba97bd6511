//! Key and script lookup capabilities used by the signer.
//!
//! A [`SigningProvider`] answers four questions by identifier: which script
//! hashes to this id, which public key, which private key, and where the key
//! was derived from. Every lookup is total; `None` means "not known here".

use std::collections::BTreeMap;

use crate::bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint};
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::secp256k1::{Secp256k1, SecretKey};
use crate::bitcoin::{NetworkKind, PrivateKey, PubkeyHash, PublicKey, Script, ScriptBuf, ScriptHash};

/// Master key fingerprint plus the BIP32 path a key was derived along
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyOriginInfo {
    pub fingerprint: Fingerprint,
    pub path: DerivationPath,
}

impl KeyOriginInfo {
    pub fn new(fingerprint: Fingerprint, path: DerivationPath) -> Self {
        KeyOriginInfo { fingerprint, path }
    }

    pub fn from_indices(fingerprint: [u8; 4], indices: &[u32]) -> Self {
        let path: Vec<ChildNumber> = indices.iter().map(|i| ChildNumber::from(*i)).collect();
        KeyOriginInfo {
            fingerprint: Fingerprint::from(fingerprint),
            path: DerivationPath::from(path),
        }
    }

    /// Raw 32-bit indices, hardened bit included
    pub fn indices(&self) -> Vec<u32> {
        self.path.as_ref().iter().map(|c| u32::from(*c)).collect()
    }
}

pub fn key_id(pubkey: &PublicKey) -> PubkeyHash {
    pubkey.pubkey_hash()
}

pub fn script_id(script: &Script) -> ScriptHash {
    ScriptHash::hash(script.as_bytes())
}

pub trait SigningProvider {
    fn get_script(&self, id: &ScriptHash) -> Option<ScriptBuf>;
    fn get_pubkey(&self, id: &PubkeyHash) -> Option<PublicKey>;
    fn get_key(&self, id: &PubkeyHash) -> Option<PrivateKey>;
    fn get_key_origin(&self, id: &PubkeyHash) -> Option<KeyOriginInfo>;
}

impl<T: SigningProvider + ?Sized> SigningProvider for &T {
    fn get_script(&self, id: &ScriptHash) -> Option<ScriptBuf> {
        (**self).get_script(id)
    }

    fn get_pubkey(&self, id: &PubkeyHash) -> Option<PublicKey> {
        (**self).get_pubkey(id)
    }

    fn get_key(&self, id: &PubkeyHash) -> Option<PrivateKey> {
        (**self).get_key(id)
    }

    fn get_key_origin(&self, id: &PubkeyHash) -> Option<KeyOriginInfo> {
        (**self).get_key_origin(id)
    }
}

/// Provider that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DummySigningProvider;

pub const DUMMY_SIGNING_PROVIDER: DummySigningProvider = DummySigningProvider;

impl SigningProvider for DummySigningProvider {
    fn get_script(&self, _id: &ScriptHash) -> Option<ScriptBuf> {
        None
    }

    fn get_pubkey(&self, _id: &PubkeyHash) -> Option<PublicKey> {
        None
    }

    fn get_key(&self, _id: &PubkeyHash) -> Option<PrivateKey> {
        None
    }

    fn get_key_origin(&self, _id: &PubkeyHash) -> Option<KeyOriginInfo> {
        None
    }
}

/// Read-only view over another provider that can withhold private keys and
/// key origins.
///
/// The wrapped provider is borrowed, so it always outlives the view.
pub struct HidingSigningProvider<'a> {
    provider: &'a dyn SigningProvider,
    hide_secret: bool,
    hide_origin: bool,
}

impl<'a> HidingSigningProvider<'a> {
    pub fn new(provider: &'a dyn SigningProvider, hide_secret: bool, hide_origin: bool) -> Self {
        HidingSigningProvider {
            provider,
            hide_secret,
            hide_origin,
        }
    }
}

impl SigningProvider for HidingSigningProvider<'_> {
    fn get_script(&self, id: &ScriptHash) -> Option<ScriptBuf> {
        self.provider.get_script(id)
    }

    fn get_pubkey(&self, id: &PubkeyHash) -> Option<PublicKey> {
        self.provider.get_pubkey(id)
    }

    fn get_key(&self, id: &PubkeyHash) -> Option<PrivateKey> {
        if self.hide_secret {
            return None;
        }
        self.provider.get_key(id)
    }

    fn get_key_origin(&self, id: &PubkeyHash) -> Option<KeyOriginInfo> {
        if self.hide_origin {
            return None;
        }
        self.provider.get_key_origin(id)
    }
}

/// In-memory provider backed by owned maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatSigningProvider {
    pub scripts: BTreeMap<ScriptHash, ScriptBuf>,
    pub pubkeys: BTreeMap<PubkeyHash, PublicKey>,
    pub keys: BTreeMap<PubkeyHash, PrivateKey>,
    pub origins: BTreeMap<PubkeyHash, KeyOriginInfo>,
}

impl FlatSigningProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the private key together with its public key
    pub fn add_key(&mut self, key: PrivateKey) -> PublicKey {
        let secp = Secp256k1::signing_only();
        let pubkey = key.public_key(&secp);
        let id = key_id(&pubkey);
        self.pubkeys.insert(id, pubkey);
        self.keys.insert(id, key);
        pubkey
    }

    pub fn add_pubkey(&mut self, pubkey: PublicKey) -> PubkeyHash {
        let id = key_id(&pubkey);
        self.pubkeys.insert(id, pubkey);
        id
    }

    pub fn add_script(&mut self, script: ScriptBuf) -> ScriptHash {
        let id = script_id(&script);
        self.scripts.insert(id, script);
        id
    }

    pub fn add_key_origin(&mut self, pubkey: PublicKey, origin: KeyOriginInfo) {
        let id = self.add_pubkey(pubkey);
        self.origins.insert(id, origin);
    }

    /// Creates a fresh private key from system entropy and stores it.
    pub fn generate_key(&mut self, compressed: bool) -> Result<PublicKey, getrandom::Error> {
        let secret = loop {
            let mut bytes = [0u8; 32];
            getrandom::getrandom(&mut bytes)?;
            // out-of-range scalars are rejected, draw again
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                break secret;
            }
        };
        let key = if compressed {
            PrivateKey::new(secret, NetworkKind::Main)
        } else {
            PrivateKey::new_uncompressed(secret, NetworkKind::Main)
        };
        log::debug!("generated new signing key");
        Ok(self.add_key(key))
    }
}

impl SigningProvider for FlatSigningProvider {
    fn get_script(&self, id: &ScriptHash) -> Option<ScriptBuf> {
        self.scripts.get(id).cloned()
    }

    fn get_pubkey(&self, id: &PubkeyHash) -> Option<PublicKey> {
        self.pubkeys.get(id).copied()
    }

    fn get_key(&self, id: &PubkeyHash) -> Option<PrivateKey> {
        self.keys.get(id).copied()
    }

    fn get_key_origin(&self, id: &PubkeyHash) -> Option<KeyOriginInfo> {
        self.origins.get(id).cloned()
    }
}

/// Union of two providers. Entries of `b` replace entries of `a` with the same id.
pub fn merge(a: &FlatSigningProvider, b: &FlatSigningProvider) -> FlatSigningProvider {
    let mut ret = a.clone();
    ret.scripts
        .extend(b.scripts.iter().map(|(k, v)| (*k, v.clone())));
    ret.pubkeys.extend(b.pubkeys.iter().map(|(k, v)| (*k, *v)));
    ret.keys.extend(b.keys.iter().map(|(k, v)| (*k, *v)));
    ret.origins
        .extend(b.origins.iter().map(|(k, v)| (*k, v.clone())));
    ret
}
