//! Client-[`Side`] implementation of the _session_.

use std::time::Duration;

use futures_time::time::Duration as Timeout;
use rand::RngCore;
use ssh_packet::{arch::NameList, trans::KexInit};

use super::Side;
use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key, Negociate},
    stream::{Stream, TransportPair},
    Pipe, Result,
};

#[doc(no_inline)]
pub use ssh_packet::Id;

/// A policy deciding whether a server's host key should be trusted.
///
/// Called once per key-exchange, with the key the peer presented in its
/// `SSH_MSG_KEXDH_REPLY`, after its signature over the exchange hash has
/// already been verified — this only decides whether the (cryptographically
/// valid) key itself is one this client is willing to trust.
pub trait HostKeyVerifier: Send + Sync {
    /// Decide whether `key`, presented by `peer`, should be trusted.
    fn verify(&self, peer: &Id, key: &ssh_key::PublicKey) -> bool;
}

impl std::fmt::Debug for dyn HostKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn HostKeyVerifier>")
    }
}

/// Accepts any host key unconditionally.
///
/// # Security
///
/// This defeats the purpose of host-key verification, making the connection
/// vulnerable to machine-in-the-middle attacks. Only use this for testing, or
/// when the transport's authenticity is already established by another means.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl HostKeyVerifier for AcceptAll {
    fn verify(&self, _: &Id, _: &ssh_key::PublicKey) -> bool {
        true
    }
}

/// Rejects every host key unconditionally.
///
/// Useful as a safe default to compose with, or in tests asserting that a
/// code path never reaches key-exchange completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl HostKeyVerifier for RejectAll {
    fn verify(&self, _: &Id, _: &ssh_key::PublicKey) -> bool {
        false
    }
}

/// Trusts only the host keys whose fingerprint appears in the provided set.
#[derive(Debug, Clone)]
pub struct Fingerprints(pub std::collections::HashSet<ssh_key::Fingerprint>);

impl HostKeyVerifier for Fingerprints {
    fn verify(&self, _: &Id, key: &ssh_key::PublicKey) -> bool {
        self.0.contains(&key.fingerprint(ssh_key::HashAlg::Sha256))
    }
}

/// Trusts the first host key seen for a given peer [`Id`], and every
/// subsequent key from a peer that presented a different one, matching the
/// shape of an `~/.ssh/known_hosts` store without touching the filesystem.
///
/// # Security
///
/// This only protects against a key changing *after* a first successful
/// connection, not against an attacker present from the very first contact.
#[derive(Debug, Default)]
pub struct TrustOnFirstUse(std::sync::Mutex<std::collections::HashMap<String, ssh_key::Fingerprint>>);

impl TrustOnFirstUse {
    /// Create an empty trust-on-first-use store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store with a known-good fingerprint for `peer`.
    pub fn pin(&self, peer: impl Into<String>, fingerprint: ssh_key::Fingerprint) {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(peer.into(), fingerprint);
    }
}

impl HostKeyVerifier for TrustOnFirstUse {
    fn verify(&self, peer: &Id, key: &ssh_key::PublicKey) -> bool {
        let fingerprint = key.fingerprint(ssh_key::HashAlg::Sha256);
        let mut store = self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match store.get(&peer.to_string()) {
            Some(pinned) => *pinned == fingerprint,
            None => {
                tracing::info!("Pinning new host key `{fingerprint}` for peer `{peer}`");

                store.insert(peer.to_string(), fingerprint);

                true
            }
        }
    }
}

/// A _client_-side session configuration.
#[derive(Debug, Clone)]
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,

    /// The policy used to verify the peer's host key during key-exchange.
    pub verifier: std::sync::Arc<dyn HostKeyVerifier>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            algorithms: Default::default(),
            verifier: std::sync::Arc::new(AcceptAll),
        }
    }
}

/// Algorithms for a _client_-side session.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server key signature_.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![
                Kex::Curve25519Sha256,
                Kex::Curve25519Sha256Libssh,
                Kex::EcdhSha2NistP256,
                Kex::EcdhSha2NistP384,
                Kex::EcdhSha2NistP521,
                Kex::DiffieHellmanGroup16Sha512,
                Kex::DiffieHellmanGroup14Sha256,
            ],
            keys: vec![
                Key::Ed25519,
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP384,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256,
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Rsa { hash: None },
                Key::Dsa,
            ],
            ciphers: vec![
                Cipher::ChaCha20Poly1305,
                Cipher::Aes256Gcm,
                Cipher::Aes128Gcm,
                Cipher::Aes256Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes128Ctr,
                Cipher::Aes256Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes128Cbc,
                Cipher::TDesCbc,
            ],
            macs: vec![
                Hmac::HmacSha512ETM,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512,
                Hmac::HmacSha256,
                Hmac::HmacSha1ETM,
                Hmac::HmacSha1,
            ],
            compressions: vec![Compress::None],
        }
    }
}

impl Side for Client {
    fn id(&self) -> &Id {
        &self.id
    }

    fn timeout(&self) -> Timeout {
        self.timeout.into()
    }

    fn kexinit(&self) -> KexInit {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: NameList::from_iter(&self.algorithms.kexs),
            server_host_key_algorithms: NameList::from_iter(&self.algorithms.keys),
            encryption_algorithms_client_to_server: NameList::from_iter(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::from_iter(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::from_iter(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::from_iter(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            compression_algorithms_server_to_client: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }

    async fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        kexinit: KexInit<'_>,
        peerkexinit: KexInit<'_>,
        peer_id: &Id,
    ) -> Result<TransportPair> {
        Kex::negociate(&kexinit, &peerkexinit)?
            .as_client(
                stream,
                self.id(),
                peer_id,
                kexinit,
                peerkexinit,
                self.verifier.as_ref(),
            )
            .await
    }
}
