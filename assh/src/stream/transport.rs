use rand::Rng;
use secrecy::ExposeSecret;
use ssh_packet::{CipherCore, OpeningCipher, Packet, SealingCipher};

use crate::{
    Error, Result,
    stream::algorithm::{self, Cipher, CipherState, Hmac},
};

use super::Keys;

#[derive(Debug, Default)]
pub struct TransportPair {
    pub tx: Transport,
    pub rx: Transport,
}

#[derive(Debug, Default)]
pub struct Transport {
    pub compress: algorithm::Compress,
    pub cipher: algorithm::Cipher,
    pub hmac: algorithm::Hmac,

    pub state: Option<CipherState>,
    pub chain: Keys,

    /// Sequence number of the packet currently being processed, set by the [`Stream`](super::Stream)
    /// right before handing off to this transport so the AEAD ciphers can derive their nonce.
    pub seq: u32,

    /// Scratch space for the wire MAC bytes of an AEAD-sealed packet: stashed by [`Self::open`]
    /// (which, for an AEAD [`Hmac`], can't verify anything on its own) and consumed by
    /// [`Self::decrypt`], which performs the actual authenticated decryption.
    tag: Option<Vec<u8>>,
}

impl Transport {
    pub fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    pub fn decrypt<B: AsMut<[u8]>>(&mut self, mut buf: B) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                self.seq,
                self.tag.take().as_deref(),
                buf.as_mut(),
            )?;
        }

        Ok(())
    }

    pub fn open<B: AsRef<[u8]>>(&mut self, buf: B, mac: Vec<u8>, seq: u32) -> Result<()> {
        self.seq = seq;

        if self.cipher.is_aead() {
            // The tag is verified by `Cipher::decrypt`, atomically with decryption.
            self.tag = Some(mac);
        } else if self.hmac.size() > 0 {
            self.hmac
                .verify(seq, buf.as_ref(), self.chain.hmac.expose_secret(), &mac)?;
        }

        Ok(())
    }

    pub fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>> {
        self.compress.decompress(buf)
    }

    pub fn compress<B: AsRef<[u8]>>(&mut self, buf: B) -> Result<Vec<u8>> {
        self.compress.compress(buf.as_ref())
    }

    fn padding(&self, payload: usize) -> u8 {
        const MIN_PAD_SIZE: usize = 4;
        const MIN_ALIGN: usize = 8;

        let align = self.block_size().max(MIN_ALIGN);

        let size = if self.hmac.etm() {
            std::mem::size_of::<u8>() + payload
        } else {
            std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload
        };
        let padding = align - size % align;

        let padding = if padding < MIN_PAD_SIZE {
            padding + align
        } else {
            padding
        };

        if size + padding < self.block_size().max(Packet::MIN_SIZE) {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }

    pub fn pad(&mut self, mut buf: Vec<u8>) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();

        let padding = self.padding(buf.len());

        // prefix with the size
        let mut padded = vec![padding];
        padded.append(&mut buf);

        // fill with random
        padded.resize_with(padded.len() + padding as usize, || rng.r#gen());

        Ok(padded)
    }

    pub fn encrypt<B: AsMut<[u8]>>(&mut self, mut buf: B) -> Result<()> {
        if self.cipher != Cipher::None {
            let tag = self.cipher.encrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                self.seq,
                buf.as_mut(),
            )?;

            if let Some(tag) = tag {
                self.tag = Some(tag.to_vec());
            }
        }

        Ok(())
    }

    pub fn seal<B: AsRef<[u8]>>(&mut self, buf: B, seq: u32) -> Result<Vec<u8>> {
        self.seq = seq;

        Ok(if self.cipher.is_aead() {
            self.tag.take().unwrap_or_default()
        } else {
            self.hmac
                .sign(seq, buf.as_ref(), self.chain.hmac.expose_secret())
        })
    }
}

impl CipherCore for Transport {
    type Err = Error;
    type Mac = Hmac;

    fn mac(&self) -> &Self::Mac {
        &self.hmac
    }

    fn block_size(&self) -> usize {
        Transport::block_size(self)
    }
}

impl OpeningCipher for Transport {
    fn decrypt<B: AsMut<[u8]>>(&mut self, buf: B) -> Result<(), Self::Err> {
        Transport::decrypt(self, buf)
    }

    fn open<B: AsRef<[u8]>>(&mut self, buf: B, mac: Vec<u8>, seq: u32) -> Result<(), Self::Err> {
        Transport::open(self, buf, mac, seq)
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        Transport::decompress(self, buf)
    }
}

impl SealingCipher for Transport {
    fn compress<B: AsRef<[u8]>>(&mut self, buf: B) -> Result<Vec<u8>, Self::Err> {
        Transport::compress(self, buf)
    }

    fn pad(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        Transport::pad(self, buf)
    }

    fn encrypt<B: AsMut<[u8]>>(&mut self, buf: B) -> Result<(), Self::Err> {
        Transport::encrypt(self, buf)
    }

    fn seal<B: AsRef<[u8]>>(&mut self, buf: B, seq: u32) -> Result<Vec<u8>, Self::Err> {
        Transport::seal(self, buf, seq)
    }
}
