use digest::{Digest, FixedOutputReset};
use elliptic_curve::{
    ecdh::{diffie_hellman, EphemeralSecret},
    sec1::{ModulusSize, ToEncodedPoint},
    Curve, CurveArithmetic, FieldBytesSize, PublicKey as CurvePublicKey,
};
use secrecy::{ExposeSecret, SecretBox};
use signature::{SignatureEncoding, Signer, Verifier};
use ssh_key::{PrivateKey, Signature};
use ssh_packet::{
    arch::MpInt,
    crypto::exchange,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id,
};

use crate::{
    algorithm::{Cipher, Hmac},
    side::client::HostKeyVerifier,
    stream::Stream,
    Error, Pipe, Result,
};

use super::Keys;

fn decode_point<C>(bytes: &[u8]) -> Result<CurvePublicKey<C>>
where
    C: Curve + CurveArithmetic,
    FieldBytesSize<C>: ModulusSize,
{
    CurvePublicKey::<C>::from_sec1_bytes(bytes).map_err(|_| Error::KexError)
}

#[allow(clippy::too_many_arguments)] // The key exchange requires all of these informations
pub async fn as_client<C, H>(
    stream: &mut Stream<impl Pipe>,
    v_c: &Id,
    v_s: &Id,
    i_c: KexInit<'_>,
    i_s: KexInit<'_>,
    client_cipher: &Cipher,
    server_cipher: &Cipher,
    client_hmac: &Hmac,
    server_hmac: &Hmac,
    verifier: &dyn HostKeyVerifier,
) -> Result<(Keys, Keys)>
where
    C: Curve + CurveArithmetic,
    FieldBytesSize<C>: ModulusSize,
    H: Digest + FixedOutputReset,
{
    let e_c = EphemeralSecret::<C>::random(&mut rand::rngs::OsRng);
    let q_c = CurvePublicKey::<C>::from(&e_c).to_encoded_point(false);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_bytes().into(),
        })
        .await?;

    let ecdh: KexEcdhReply = stream.recv().await?.to()?;
    let q_s = decode_point::<C>(ecdh.q_s.as_ref())?;

    let secret = diffie_hellman(e_c.as_nonzero_scalar(), q_s.as_affine());
    let secret = SecretBox::new(MpInt::positive(secret.raw_secret_bytes()).into());

    let k_s = ssh_key::PublicKey::from_bytes(&ecdh.k_s)?;
    let hash = exchange::Ecdh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: (&i_c).into(),
        i_s: (&i_s).into(),
        k_s: ecdh.k_s,
        q_c: q_c.as_bytes().into(),
        q_s: ecdh.q_s,
        k: secret.expose_secret().as_borrow(),
    }
    .hash::<H>();

    Verifier::verify(&k_s, &hash, &Signature::try_from(ecdh.signature.as_ref())?)?;

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
pub async fn as_server<C, H>(
    stream: &mut Stream<impl Pipe>,
    v_c: &Id,
    v_s: &Id,
    i_c: KexInit<'_>,
    i_s: KexInit<'_>,
    client_cipher: &Cipher,
    server_cipher: &Cipher,
    client_hmac: &Hmac,
    server_hmac: &Hmac,
    key: &PrivateKey,
) -> Result<(Keys, Keys)>
where
    C: Curve + CurveArithmetic,
    FieldBytesSize<C>: ModulusSize,
    H: Digest + FixedOutputReset,
{
    let ecdh: KexEcdhInit = stream.recv().await?.to()?;

    let e_s = EphemeralSecret::<C>::random(&mut rand::rngs::OsRng);
    let q_s = CurvePublicKey::<C>::from(&e_s).to_encoded_point(false);

    let q_c = decode_point::<C>(ecdh.q_c.as_ref())?;

    let secret = diffie_hellman(e_s.as_nonzero_scalar(), q_c.as_affine());
    let secret = SecretBox::new(MpInt::positive(secret.raw_secret_bytes()).into());

    let k_s = key.public_key().to_bytes()?;

    let hash = exchange::Ecdh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: (&i_c).into(),
        i_s: (&i_s).into(),
        k_s: k_s.as_slice().into(),
        q_c: ecdh.q_c,
        q_s: q_s.as_bytes().into(),
        k: secret.expose_secret().as_borrow(),
    }
    .hash::<H>();

    let signature = Signer::sign(key, &hash);

    stream
        .send(&KexEcdhReply {
            k_s: k_s.into(),
            q_s: q_s.as_bytes().into(),
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
