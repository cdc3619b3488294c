use ssh_key::PrivateKey;
use ssh_packet::{arch::NameList, trans::KexInit, Id};
use strum::{AsRefStr, EnumString};

use crate::{
    side::{
        client::{Client, HostKeyVerifier},
        server::Server,
    },
    stream::{Keys, Stream, Transport, TransportPair},
    Error, Pipe, Result,
};

use super::{Cipher, Compress, Hmac, Negociate};

mod curve25519;
mod dh;
mod ecdh_nist;

impl Negociate for Kex {
    const ERR: Error = Error::NoCommonKex;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.kex_algorithms
    }
}

// `diffie-hellman-group-exchange-sha256` additionally negotiates the modulus size over the
// wire (`SSH_MSG_KEX_DH_GEX_REQUEST`/`GROUP`, RFC 4419 §3) before running the same classic DH
// exchange as the fixed groups below. None of the crates this workspace depends on define those
// four group-exchange messages, so there's no wire codec to drive it with; it's left off the
// `Kex` enum rather than guessed at (see DESIGN.md).

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Curve25519 ECDH with sha-2-256 digest.
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,

    /// ECDH over NIST P-256 with sha-2-256 digest.
    #[strum(serialize = "ecdh-sha2-nistp256")]
    EcdhSha2NistP256,

    /// ECDH over NIST P-384 with sha-2-384 digest.
    #[strum(serialize = "ecdh-sha2-nistp384")]
    EcdhSha2NistP384,

    /// ECDH over NIST P-521 with sha-2-512 digest.
    #[strum(serialize = "ecdh-sha2-nistp521")]
    EcdhSha2NistP521,

    /// Classic Diffie-Hellman over the 2048-bit MODP group, with sha-2-256 digest.
    DiffieHellmanGroup14Sha256,

    /// Classic Diffie-Hellman over the 4096-bit MODP group, with sha-2-512 digest.
    DiffieHellmanGroup16Sha512,
}

impl Kex {
    pub(crate) async fn as_client(
        &self,
        stream: &mut Stream<impl Pipe>,
        v_c: &Id,
        v_s: &Id,
        i_c: KexInit<'_>,
        i_s: KexInit<'_>,
        verifier: &dyn HostKeyVerifier,
    ) -> Result<TransportPair> {
        let (client_hmac, server_hmac) = (
            <Hmac as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Hmac as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );
        let (client_compress, server_compress) = (
            <Compress as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Compress as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );
        let (client_cipher, server_cipher) = (
            <Cipher as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Cipher as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );

        // AEAD ciphers fold integrity into the cipher itself (RFC 5647 §5.1, OpenSSH's
        // chacha20-poly1305 `PROTOCOL.chacha20poly1305`); the negotiated MAC is moot.
        let client_hmac = if client_cipher.is_aead() {
            Hmac::Aead
        } else {
            client_hmac
        };
        let server_hmac = if server_cipher.is_aead() {
            Hmac::Aead
        } else {
            server_hmac
        };

        let (client_keys, server_keys) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                curve25519::as_client::<sha2::Sha256>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
            Self::EcdhSha2NistP256 => {
                ecdh_nist::as_client::<p256::NistP256, sha2::Sha256>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
            Self::EcdhSha2NistP384 => {
                ecdh_nist::as_client::<p384::NistP384, sha2::Sha384>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
            Self::EcdhSha2NistP521 => {
                ecdh_nist::as_client::<p521::NistP521, sha2::Sha512>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                dh::as_client::<sha2::Sha256>(
                    stream,
                    &dh::GROUP14,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
            Self::DiffieHellmanGroup16Sha512 => {
                dh::as_client::<sha2::Sha512>(
                    stream,
                    &dh::GROUP16,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    verifier,
                )
                .await?
            }
        };

        Ok(TransportPair {
            rx: Transport {
                chain: server_keys,
                state: None,
                cipher: server_cipher,
                hmac: server_hmac,
                compress: server_compress,
            },
            tx: Transport {
                chain: client_keys,
                state: None,
                cipher: client_cipher,
                hmac: client_hmac,
                compress: client_compress,
            },
        })
    }

    pub(crate) async fn as_server(
        &self,
        stream: &mut Stream<impl Pipe>,
        v_c: &Id,
        v_s: &Id,
        i_c: KexInit<'_>,
        i_s: KexInit<'_>,
        key: &PrivateKey,
    ) -> Result<TransportPair> {
        let (client_hmac, server_hmac) = (
            <Hmac as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Hmac as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );
        let (client_compress, server_compress) = (
            <Compress as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Compress as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );
        let (client_cipher, server_cipher) = (
            <Cipher as Negociate<Client>>::negociate(&i_c, &i_s)?,
            <Cipher as Negociate<Server>>::negociate(&i_c, &i_s)?,
        );

        // AEAD ciphers fold integrity into the cipher itself (RFC 5647 §5.1, OpenSSH's
        // chacha20-poly1305 `PROTOCOL.chacha20poly1305`); the negotiated MAC is moot.
        let client_hmac = if client_cipher.is_aead() {
            Hmac::Aead
        } else {
            client_hmac
        };
        let server_hmac = if server_cipher.is_aead() {
            Hmac::Aead
        } else {
            server_hmac
        };

        let (client_keys, server_keys) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                curve25519::as_server::<sha2::Sha256>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
            Self::EcdhSha2NistP256 => {
                ecdh_nist::as_server::<p256::NistP256, sha2::Sha256>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
            Self::EcdhSha2NistP384 => {
                ecdh_nist::as_server::<p384::NistP384, sha2::Sha384>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
            Self::EcdhSha2NistP521 => {
                ecdh_nist::as_server::<p521::NistP521, sha2::Sha512>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                dh::as_server::<sha2::Sha256>(
                    stream,
                    &dh::GROUP14,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
            Self::DiffieHellmanGroup16Sha512 => {
                dh::as_server::<sha2::Sha512>(
                    stream,
                    &dh::GROUP16,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &client_cipher,
                    &server_cipher,
                    &client_hmac,
                    &server_hmac,
                    key,
                )
                .await?
            }
        };

        Ok(TransportPair {
            rx: Transport {
                chain: client_keys,
                state: None,
                cipher: client_cipher,
                hmac: client_hmac,
                compress: client_compress,
            },
            tx: Transport {
                chain: server_keys,
                state: None,
                cipher: server_cipher,
                hmac: server_hmac,
                compress: server_compress,
            },
        })
    }
}
