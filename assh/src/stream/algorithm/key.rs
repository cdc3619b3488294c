pub use ssh_key::Algorithm as Key;
use ssh_packet::{arch::NameList, trans::KexInit};

use crate::Error;

use super::Negociate;

impl Negociate for Key {
    const ERR: Error = Error::NoCommonKey;

    fn field<'f>(kexinit: &'f KexInit) -> &'f NameList<'f> {
        &kexinit.server_host_key_algorithms
    }
}
