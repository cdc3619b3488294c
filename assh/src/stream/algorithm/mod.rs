//! Supported algorithms for **compression**, **encryption**, **integrity** and **key-exchange**.

// TODO: (feature) Gate insecure algorithms behind an `insecure` feature flag.

mod cipher;
pub use cipher::Cipher;
pub(super) use cipher::CipherState;

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;

pub(crate) mod key;
pub use key::Key;

use std::str::FromStr;

use ssh_packet::{arch::NameList, trans::KexInit};

use crate::{Error, Result};

/// Negotiate one of this crate's algorithm enums out of a pair of [`KexInit`]s.
///
/// `M` selects which direction of the exchange to read the candidate list
/// from (see [`side::client::Client`](crate::side::client::Client) and
/// [`side::server::Server`](crate::side::server::Server)); algorithms that
/// aren't direction-dependent (such as [`Kex`]) leave it as `()`.
pub(crate) trait Negociate<M = ()>: FromStr + Sized {
    /// The error to raise when no algorithm in common could be found.
    const ERR: Error;

    /// Extract the relevant [`NameList`] of candidates from a [`KexInit`].
    fn field<'f>(kexinit: &'f KexInit) -> &'f NameList<'f>;

    /// Pick the first of the local preferences also supported by the peer.
    fn negociate(ours: &KexInit, theirs: &KexInit) -> Result<Self> {
        Self::field(ours)
            .preferred_in(Self::field(theirs))
            .ok_or(Self::ERR)?
            .parse()
            .map_err(|_| Self::ERR)
    }
}
