use std::sync::Arc;

use ssh_key::PrivateKey;
use ssh_packet::userauth;

/// A callback answering the prompts of a `keyboard-interactive` exchange.
pub trait Prompter: Send + Sync {
    /// Produce one answer per prompt in `prompts`, in order.
    fn respond(&self, name: &str, instruction: &str, prompts: &[(String, bool)]) -> Vec<String>;
}

impl<F> Prompter for F
where
    F: Fn(&str, &str, &[(String, bool)]) -> Vec<String> + Send + Sync,
{
    fn respond(&self, name: &str, instruction: &str, prompts: &[(String, bool)]) -> Vec<String> {
        self(name, instruction, prompts)
    }
}

/// Possible authentication methods in the SSH protocol.
#[derive(Debug, PartialEq, Eq)]
pub enum Method {
    /// The SSH `none` authentication method.
    None,

    /// The SSH `publickey` authentication method.
    Publickey { key: Box<PrivateKey> },

    /// The SSH `password` authentication method.
    Password { password: String },

    /// The SSH `keyboard-interactive` authentication method.
    KeyboardInteractive {
        #[doc(hidden)]
        prompter: KbdInteractive,
    },
}

/// Newtype wrapping a [`Prompter`] so [`Method`] can derive `PartialEq`/`Eq`/`Debug`
/// by comparing pointer identity rather than behavior.
#[derive(Clone)]
pub struct KbdInteractive(pub Arc<dyn Prompter>);

impl std::fmt::Debug for KbdInteractive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn Prompter>")
    }
}

impl PartialEq for KbdInteractive {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for KbdInteractive {}

impl std::hash::Hash for Method {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);

        // Allow keys with different fingerprints to exist alongside
        if let Self::Publickey { key } = self {
            key.fingerprint(ssh_key::HashAlg::Sha256)
                .as_bytes()
                .hash(state);
        }
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        match self {
            Self::None { .. } => userauth::Method::NONE,
            Self::Publickey { .. } => userauth::Method::PUBLICKEY,
            Self::Password { .. } => userauth::Method::PASSWORD,
            Self::KeyboardInteractive { .. } => userauth::Method::KEYBOARD_INTERACTIVE,
        }
    }
}
