use aead::{generic_array::GenericArray, AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Tag};
use chacha20::ChaCha20Legacy;
use cipher::{KeyIvInit as _, StreamCipher as _, StreamCipherSeek as _};
use poly1305::{universal_hash::UniversalHash, Poly1305};
use ssh_packet::{arch::NameList, trans::KexInit};
use strum::{AsRefStr, EnumString};

use crate::{
    side::{client::Client, server::Server},
    Error,
};

use super::Negociate;

// TODO: (optimization) Get rid of this Box<dyn> altogether.
pub type CipherState = Box<dyn std::any::Any + Send + Sync>;

impl Negociate<Client> for Cipher {
    const ERR: Error = Error::NoCommonCipher;

    fn field<'f>(kexinit: &'f KexInit) -> &'f NameList<'f> {
        &kexinit.encryption_algorithms_client_to_server
    }
}

impl Negociate<Server> for Cipher {
    const ERR: Error = Error::NoCommonCipher;

    fn field<'f>(kexinit: &'f KexInit) -> &'f NameList<'f> {
        &kexinit.encryption_algorithms_server_to_client
    }
}

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// ChaCha20-Poly1305 AEAD construction, as used by OpenSSH.
    #[strum(serialize = "chacha20-poly1305@openssh.com")]
    ChaCha20Poly1305,

    /// AES-256 in Galois/Counter Mode (GCM), as an AEAD construction.
    #[strum(serialize = "aes256-gcm@openssh.com")]
    Aes256Gcm,

    /// AES-128 in Galois/Counter Mode (GCM), as an AEAD construction.
    #[strum(serialize = "aes128-gcm@openssh.com")]
    Aes128Gcm,

    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// AES-256 in cipher block chaining (CBC) mode.
    Aes256Cbc,

    /// AES-192 in cipher block chaining (CBC) mode.
    Aes192Cbc,

    /// AES-128 in cipher block chaining (CBC) mode.
    Aes128Cbc,

    /// TripleDES in cipher block chaining (CBC) mode.
    #[strum(serialize = "3des-cbc")]
    TDesCbc,

    /// No cipher algorithm.
    #[default]
    None,
}

/// GCM nonce per [RFC 5647 §7.1](https://datatracker.ietf.org/doc/html/rfc5647#section-7.1):
/// the 4-byte fixed part of the derived IV, followed by an 8-byte invocation counter that
/// starts at the derived IV's own value and increments once per packet.
fn gcm_nonce(iv: &[u8], seq: u32) -> GenericArray<u8, aead::consts::U12> {
    let counter = u64::from_be_bytes(
        iv[4..12]
            .try_into()
            .expect("iv_size() guarantees a 12-byte GCM IV"),
    )
    .wrapping_add(u64::from(seq));

    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&iv[..4]);
    nonce[4..].copy_from_slice(&counter.to_be_bytes());

    GenericArray::clone_from_slice(&nonce)
}

/// Nonce for the legacy (64-bit) ChaCha20 variant used by `chacha20-poly1305@openssh.com`,
/// per [OpenSSH's `PROTOCOL.chacha20poly1305`](https://cvsweb.openbsd.org/cgi-bin/cvsweb/src/usr.bin/ssh/PROTOCOL.chacha20poly1305).
fn chacha_nonce(seq: u32) -> GenericArray<u8, aead::consts::U8> {
    let mut nonce = [0u8; 8];
    nonce[4..].copy_from_slice(&seq.to_be_bytes());

    GenericArray::clone_from_slice(&nonce)
}

/// The payload/MAC-derivation key for `chacha20-poly1305@openssh.com`.
///
/// The companion length-field key occupies the other half of the 64-byte key material but
/// isn't used here: this implementation transforms only the portion of the packet following
/// the length field (the same scope every other cipher in this enum operates on), so the
/// length field is never separately encrypted by this cipher.
fn chacha_payload_key(key: &[u8]) -> &[u8] {
    &key[..32]
}

impl Cipher {
    /// This method is a hack to solve deduplication of the enum
    /// variants and to store the cipher states inside a dynamically
    /// typed `Box<dyn std::any::Any>`.
    fn state<'s, T: cipher::KeyIvInit + Send + Sync + 'static>(
        state: &'s mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
    ) -> &'s mut T {
        state
            .get_or_insert_with(|| {
                Box::new(T::new_from_slices(key, iv).expect("Key derivation failed horribly"))
            })
            .downcast_mut()
            .expect("State changed in the meanwhile")
    }

    fn ctr<C: ctr::cipher::StreamCipher>(cipher: &mut C, buffer: &mut [u8]) -> Result<Option<Tag>> {
        cipher
            .try_apply_keystream(buffer)
            .map_err(|_| Error::Cipher)?;

        Ok(None)
    }

    /// Whether this cipher is an AEAD construction, folding integrity into itself rather
    /// than relying on a separately negotiated MAC (see [`Hmac::Aead`](super::Hmac)).
    pub(crate) fn is_aead(&self) -> bool {
        matches!(
            self,
            Self::ChaCha20Poly1305 | Self::Aes256Gcm | Self::Aes128Gcm
        )
    }

    fn gcm_encrypt<C: AeadInPlace + KeyInit>(
        key: &[u8],
        iv: &[u8],
        seq: u32,
        buffer: &mut [u8],
    ) -> Result<Option<Tag>> {
        let cipher = C::new_from_slice(key).map_err(|_| Error::Cipher)?;
        let nonce = gcm_nonce(iv, seq);

        let tag = cipher
            .encrypt_in_place_detached(&nonce, &[], buffer)
            .map_err(|_| Error::Cipher)?;

        Ok(Some(tag))
    }

    fn gcm_decrypt<C: AeadInPlace + KeyInit>(
        key: &[u8],
        iv: &[u8],
        seq: u32,
        tag: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        let cipher = C::new_from_slice(key).map_err(|_| Error::Cipher)?;
        let nonce = gcm_nonce(iv, seq);
        let tag = Tag::from_slice(tag);

        cipher
            .decrypt_in_place_detached(&nonce, &[], buffer, tag)
            .map_err(|_| Error::Cipher)
    }

    fn chacha_poly1305_key(key: &[u8], nonce: &GenericArray<u8, aead::consts::U8>) -> [u8; 32] {
        let mut cipher = ChaCha20Legacy::new(
            GenericArray::from_slice(chacha_payload_key(key)),
            nonce,
        );

        let mut poly_key = [0u8; 32];
        cipher.apply_keystream(&mut poly_key);

        poly_key
    }

    fn chacha_poly1305_encrypt(key: &[u8], seq: u32, buffer: &mut [u8]) -> Result<Option<Tag>> {
        let nonce = chacha_nonce(seq);
        let poly_key = Self::chacha_poly1305_key(key, &nonce);

        let mut cipher = ChaCha20Legacy::new(
            GenericArray::from_slice(chacha_payload_key(key)),
            &nonce,
        );
        cipher
            .try_seek(64u32)
            .expect("seeking to the second keystream block cannot fail");
        cipher
            .try_apply_keystream(buffer)
            .map_err(|_| Error::Cipher)?;

        let mut mac = Poly1305::new(GenericArray::from_slice(&poly_key));
        mac.update_padded(buffer);
        let tag = mac.finalize();

        Ok(Some(tag))
    }

    fn chacha_poly1305_decrypt(
        key: &[u8],
        seq: u32,
        tag: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        let nonce = chacha_nonce(seq);
        let poly_key = Self::chacha_poly1305_key(key, &nonce);

        let mut mac = Poly1305::new(GenericArray::from_slice(&poly_key));
        mac.update_padded(buffer);
        let expected = mac.finalize();

        if expected.as_slice() != tag {
            return Err(Error::Cipher);
        }

        let mut cipher = ChaCha20Legacy::new(
            GenericArray::from_slice(chacha_payload_key(key)),
            &nonce,
        );
        cipher
            .try_seek(64u32)
            .expect("seeking to the second keystream block cannot fail");
        cipher
            .try_apply_keystream(buffer)
            .map_err(|_| Error::Cipher)
    }

    pub(crate) fn encrypt(
        &mut self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        seq: u32,
        buffer: &mut [u8],
    ) -> Result<Option<Tag>> {
        fn cbc<C: cbc::cipher::BlockEncryptMut>(
            cipher: &mut C,
            buffer: &mut [u8],
        ) -> Result<Option<Tag>> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.encrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.encrypt_block_inout_mut(block);
            }

            Ok(None)
        }

        match self {
            Self::Aes256Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes256>>(state, key, iv),
                buffer,
            ),
            Self::Aes192Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes192>>(state, key, iv),
                buffer,
            ),
            Self::Aes128Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes128>>(state, key, iv),
                buffer,
            ),
            Self::Aes256Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes256>>(state, key, iv),
                buffer,
            ),
            Self::Aes192Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes192>>(state, key, iv),
                buffer,
            ),
            Self::Aes128Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes128>>(state, key, iv),
                buffer,
            ),
            Self::TDesCbc => cbc(
                Self::state::<cbc::Encryptor<des::TdesEde3>>(state, key, iv),
                buffer,
            ),
            Self::ChaCha20Poly1305 => Self::chacha_poly1305_encrypt(key, seq, buffer),
            Self::Aes256Gcm => Self::gcm_encrypt::<Aes256Gcm>(key, iv, seq, buffer),
            Self::Aes128Gcm => Self::gcm_encrypt::<Aes128Gcm>(key, iv, seq, buffer),
            Self::None => Ok(None),
        }
    }

    /// Decrypt `buffer` in place.
    ///
    /// For AEAD ciphers, `tag` must hold the authentication tag read off the wire (stashed
    /// by [`Transport::open`](super::super::Transport::open) beforehand, since it's ETM-like
    /// constructions that get verified ahead of decryption); mismatches surface as
    /// [`Error::Cipher`].
    pub(crate) fn decrypt(
        &mut self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        seq: u32,
        tag: Option<&[u8]>,
        buffer: &mut [u8],
    ) -> Result<()> {
        fn cbc<C: cbc::cipher::BlockDecryptMut>(
            cipher: &mut C,
            buffer: &mut [u8],
        ) -> Result<Option<Tag>> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.decrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.decrypt_block_inout_mut(block);
            }

            Ok(None)
        }

        match self {
            // In CTR mode, encryption and decrytion are the same
            Self::Aes256Ctr | Self::Aes192Ctr | Self::Aes128Ctr => {
                self.encrypt(state, key, iv, seq, buffer).map(drop)
            }
            Self::Aes256Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes256>>(state, key, iv),
                buffer,
            )
            .map(drop),
            Self::Aes192Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes192>>(state, key, iv),
                buffer,
            )
            .map(drop),
            Self::Aes128Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes128>>(state, key, iv),
                buffer,
            )
            .map(drop),
            Self::TDesCbc => cbc(
                Self::state::<cbc::Decryptor<des::TdesEde3>>(state, key, iv),
                buffer,
            )
            .map(drop),
            Self::ChaCha20Poly1305 => {
                Self::chacha_poly1305_decrypt(key, seq, tag.ok_or(Error::Cipher)?, buffer)
            }
            Self::Aes256Gcm => {
                Self::gcm_decrypt::<Aes256Gcm>(key, iv, seq, tag.ok_or(Error::Cipher)?, buffer)
            }
            Self::Aes128Gcm => {
                Self::gcm_decrypt::<Aes128Gcm>(key, iv, seq, tag.ok_or(Error::Cipher)?, buffer)
            }
            Self::None => Ok(()),
        }
    }

    pub(crate) fn block_size(&self) -> usize {
        match self {
            Self::None | Self::TDesCbc { .. } => 8,
            Self::ChaCha20Poly1305 { .. } => 8,
            Self::Aes128Cbc { .. }
            | Self::Aes192Cbc { .. }
            | Self::Aes256Cbc { .. }
            | Self::Aes128Ctr { .. }
            | Self::Aes192Ctr { .. }
            | Self::Aes256Ctr { .. }
            | Self::Aes128Gcm { .. }
            | Self::Aes256Gcm { .. } => 16,
        }
    }

    pub(crate) fn key_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Cbc { .. } | Self::Aes128Ctr { .. } | Self::Aes128Gcm { .. } => 16,
            Self::TDesCbc { .. } | Self::Aes192Cbc { .. } | Self::Aes192Ctr { .. } => 24,
            Self::Aes256Cbc { .. } | Self::Aes256Ctr { .. } | Self::Aes256Gcm { .. } => 32,
            // Two chained 256-bit ChaCha20 keys (length + payload), per the openssh.com variant.
            Self::ChaCha20Poly1305 { .. } => 64,
        }
    }

    pub(crate) fn iv_size(&self) -> usize {
        match self {
            Self::None => 0,
            // Nonce is derived from the packet sequence number, not a key-exchange IV.
            Self::ChaCha20Poly1305 { .. } => 0,
            Self::TDesCbc { .. } => 8,
            Self::Aes128Cbc { .. }
            | Self::Aes192Cbc { .. }
            | Self::Aes256Cbc { .. }
            | Self::Aes128Ctr { .. }
            | Self::Aes192Ctr { .. }
            | Self::Aes256Ctr { .. } => 16,
            // Fixed part + invocation counter, per RFC 5647.
            Self::Aes128Gcm { .. } | Self::Aes256Gcm { .. } => 12,
        }
    }
}
