use digest::{Digest, FixedOutputReset};
use num_bigint_dig::BigUint;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use signature::{SignatureEncoding, Signer, Verifier};
use ssh_key::{PrivateKey, Signature};
use ssh_packet::{
    arch::MpInt,
    crypto::exchange,
    trans::{KexdhInit, KexdhReply, KexInit},
    Id,
};

use crate::{
    algorithm::{Cipher, Hmac},
    side::client::HostKeyVerifier,
    stream::Stream,
    Error, Pipe, Result,
};

use super::Keys;

/// A fixed MODP group for the classical (non-ECDH) Diffie-Hellman key-exchange methods.
pub struct Group {
    p: &'static str,
    g: u8,
}

/// The 2048-bit MODP group, used by `diffie-hellman-group14-sha256`.
///
/// See [RFC 3526, section 3](https://datatracker.ietf.org/doc/html/rfc3526#section-3).
pub const GROUP14: Group = Group {
    p: "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
83655D23DCA3AD961C62F356208552BB9ED529077096966D\
670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
15728E5A8AACAA68FFFFFFFFFFFFFFFF",
    g: 2,
};

/// The 4096-bit MODP group, used by `diffie-hellman-group16-sha512`.
///
/// See [RFC 3526, section 5](https://datatracker.ietf.org/doc/html/rfc3526#section-5).
pub const GROUP16: Group = Group {
    p: "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
83655D23DCA3AD961C62F356208552BB9ED529077096966D\
670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64\
ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B\
F12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31\
43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
    g: 2,
};

impl Group {
    fn modulus(&self) -> BigUint {
        BigUint::parse_bytes(self.p.as_bytes(), 16)
            .expect("the hardcoded RFC 3526 MODP group is valid hexadecimal")
    }

    /// Generate a random keypair `(x, g^x mod p)` for this group.
    fn keypair(&self) -> (BigUint, BigUint) {
        let p = self.modulus();
        let g = BigUint::from(self.g);

        // A private exponent as wide as the modulus is overkill but keeps this
        // independent from the group's actual (conjectured) subgroup order.
        let mut bytes = vec![0u8; p.to_bytes_be().len()];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        let x = BigUint::from_bytes_be(&bytes) % (&p - 2u32) + 1u32;
        let public = g.modpow(&x, &p);

        (x, public)
    }
}

/// Reject public values outside `]1, p-1[`, as mandated by RFC 4253 §8.
fn validate(value: &BigUint, p: &BigUint) -> Result<()> {
    if *value <= BigUint::from(1u32) || *value >= p - 1u32 {
        Err(Error::KexError)
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    group: &Group,
    v_c: &Id,
    v_s: &Id,
    i_c: KexInit<'_>,
    i_s: KexInit<'_>,
    client_cipher: &Cipher,
    server_cipher: &Cipher,
    client_hmac: &Hmac,
    server_hmac: &Hmac,
    verifier: &dyn HostKeyVerifier,
) -> Result<(Keys, Keys)> {
    let p = group.modulus();
    let (x, e) = group.keypair();

    stream
        .send(&KexdhInit {
            e: MpInt::positive(e.to_bytes_be()),
        })
        .await?;

    let reply: KexdhReply = stream.recv().await?.to()?;
    let f = BigUint::from_bytes_be(reply.f.as_ref());
    validate(&f, &p)?;

    let secret = f.modpow(&x, &p);
    let secret = SecretBox::new(MpInt::positive(secret.to_bytes_be()).into());

    let k_s = ssh_key::PublicKey::from_bytes(&reply.k_s)?;
    let hash = exchange::Dh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: (&i_c).into(),
        i_s: (&i_s).into(),
        k_s: reply.k_s,
        e: MpInt::positive(e.to_bytes_be()),
        f: reply.f,
        k: secret.expose_secret().as_borrow(),
    }
    .hash::<H>();

    Verifier::verify(&k_s, &hash, &Signature::try_from(reply.signature.as_ref())?)?;

    if !verifier.verify(v_s, &k_s) {
        return Err(Error::HostKeyRejected);
    }

    let session_id = stream.with_session(&hash);

    Ok((
        Keys::as_client::<H>(
            secret.expose_secret(),
            &hash,
            session_id,
            client_cipher,
            client_hmac,
        ),
        Keys::as_server::<H>(
            secret.expose_secret(),
            &hash,
            session_id,
            server_cipher,
            server_hmac,
        ),
    ))
}

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub async fn as_server<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    group: &Group,
    v_c: &Id,
    v_s: &Id,
    i_c: KexInit<'_>,
    i_s: KexInit<'_>,
    client_cipher: &Cipher,
    server_cipher: &Cipher,
    client_hmac: &Hmac,
    server_hmac: &Hmac,
    key: &PrivateKey,
) -> Result<(Keys, Keys)> {
    let p = group.modulus();

    let init: KexdhInit = stream.recv().await?.to()?;
    let e = BigUint::from_bytes_be(init.e.as_ref());
    validate(&e, &p)?;

    let (y, f) = group.keypair();
    let secret = e.modpow(&y, &p);
    let secret = SecretBox::new(MpInt::positive(secret.to_bytes_be()).into());

    let k_s = key.public_key().to_bytes()?;

    let hash = exchange::Dh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: (&i_c).into(),
        i_s: (&i_s).into(),
        k_s: k_s.as_slice().into(),
        e: init.e,
        f: MpInt::positive(f.to_bytes_be()),
        k: secret.expose_secret().as_borrow(),
    }
    .hash::<H>();

    let signature = Signer::sign(key, &hash);

    stream
        .send(&KexdhReply {
            k_s: k_s.into(),
            f: MpInt::positive(f.to_bytes_be()),
            signature: signature.to_vec().into(),
        })
        .await?;

    let session_id = stream.with_session(&hash);

    Ok((
        Keys::as_client::<H>(
            secret.expose_secret(),
            &hash,
            session_id,
            client_cipher,
            client_hmac,
        ),
        Keys::as_server::<H>(
            secret.expose_secret(),
            &hash,
            session_id,
            server_cipher,
            server_hmac,
        ),
    ))
}
