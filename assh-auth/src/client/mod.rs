//! Authentication _client_ mechanics.

use std::sync::Arc;

use hashbrown::HashSet;

use assh::{service::Request, side::Side, Error, Pipe, Result, Session};
use ssh_packet::{
    arch::{self, Ascii, Utf8},
    crypto::signature,
    trans::DisconnectReason,
    userauth, Packet,
};

mod method;
use method::{KbdInteractive, Method, Prompter};

// TODO: (feature) Add hostbased authentication.
// TODO: (compliance) Handle the SSH banner in the `request` side.

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

/// The authentication service [`Request`] for sessions.
pub struct Auth<R> {
    username: Utf8<'static>,
    service: R,

    methods: HashSet<Method>,
    new_password: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl<R: std::fmt::Debug> std::fmt::Debug for Auth<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("username", &self.username)
            .field("service", &self.service)
            .field("methods", &self.methods)
            .field("new_password", &self.new_password.is_some())
            .finish()
    }
}

impl<R: Request> Auth<R> {
    /// Create an [`Auth`] layer for the provided _username_, to access the provided _service_.
    ///
    /// # Note
    /// 1. The layer always starts with the `none` authentication method
    ///    to discover the methods available on the server.
    /// 2. While the `publickey` method allows for multiple keys,
    ///    the `password` method will only keep the last one provided to [`Self::password`].
    pub fn new(username: impl Into<Utf8<'static>>, service: R) -> Self {
        Self {
            username: username.into(),
            service,

            methods: Default::default(),
            new_password: None,
        }
    }

    /// Attempt to authenticate with the `password` method.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.methods.replace(Method::Password {
            password: password.into(),
        });

        self
    }

    /// Provide a callback producing a new password, invoked if the server answers a
    /// `password` attempt with `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ`.
    ///
    /// Absent this callback, a change request is treated as a hard failure for the
    /// `password` method, matching the ambiguity this crate preserves rather than
    /// guessing a password on the caller's behalf.
    pub fn on_password_change(mut self, new_password: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.new_password = Some(Arc::new(new_password));

        self
    }

    /// Attempt to authenticate with the `publickey` method.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.methods.replace(Method::Publickey {
            key: key.into().into(),
        });

        self
    }

    /// Attempt to authenticate with the `keyboard-interactive` method, answering
    /// prompts via the supplied [`Prompter`].
    pub fn keyboard_interactive(mut self, prompter: impl Prompter + 'static) -> Self {
        self.methods.replace(Method::KeyboardInteractive {
            prompter: KbdInteractive(Arc::new(prompter)),
        });

        self
    }

    fn next_method(&mut self, continue_with: &arch::NameList) -> Option<Method> {
        self.methods
            .extract_if(|m| continue_with.into_iter().any(|method| m.as_ref() == &*method))
            .next()
    }

    async fn attempt_method<IO: Pipe, S: Side>(
        &mut self,
        session: &mut Session<IO, S>,
        method: &Method,
    ) -> Result<Packet> {
        let build = |method| userauth::Request {
            username: self.username.clone(),
            service_name: R::SERVICE_NAME,
            method,
        };

        match method {
            Method::None => {
                session.send(&build(userauth::Method::None)).await?;

                session.recv().await
            }
            Method::Publickey { key } => {
                let algorithm = key.algorithm();

                // Probe the server to know if this algorithm is implemented.
                session
                    .send(&build(userauth::Method::Publickey {
                        algorithm: algorithm.as_str().as_bytes().into(),
                        blob: key.public_key().to_bytes()?.into(),
                        signature: None,
                    }))
                    .await?;

                let response = session.recv().await?;
                if let Ok(userauth::PkOk { algorithm, blob }) = response.to() {
                    // Actually sign the message with the key to perform real authentication.
                    let signature = signature::Publickey {
                        session_id: session
                            .session_id()
                            .expect("authentication attempted before key-exchange")
                            .into(),
                        username: self.username.as_borrow(),
                        service_name: R::SERVICE_NAME,
                        algorithm: algorithm.as_borrow(),
                        blob: blob.as_borrow(),
                    }
                    .sign(key.as_ref());

                    session
                        .send(&build(userauth::Method::Publickey {
                            algorithm,
                            blob,
                            signature: Some(signature.as_bytes().into()),
                        }))
                        .await?;

                    session.recv().await
                } else {
                    Ok(response)
                }
            }
            Method::Password { password } => {
                session
                    .send(&build(userauth::Method::Password {
                        password: password.as_str().into(),
                        new: None,
                    }))
                    .await?;

                let response = session.recv().await?;
                if response.to::<userauth::PasswdChangereq>().is_ok() {
                    match &self.new_password {
                        Some(new_password) => {
                            let new_password = new_password();

                            session
                                .send(&build(userauth::Method::Password {
                                    password: password.as_str().into(),
                                    new: Some(new_password.as_str().into()),
                                }))
                                .await?;

                            session.recv().await
                        }
                        // No new-password callback is configured: treat the server's change
                        // request as a hard failure for this method rather than guessing one.
                        None => Err(Error::UnexpectedMessage),
                    }
                } else {
                    Ok(response)
                }
            }
            Method::KeyboardInteractive { prompter } => {
                session
                    .send(&build(userauth::Method::KeyboardInteractive {
                        language: Default::default(),
                        submethods: Default::default(),
                    }))
                    .await?;

                let mut response = session.recv().await?;

                while let Ok(userauth::InfoRequest {
                    name,
                    instruction,
                    prompts,
                    ..
                }) = response.to()
                {
                    let prompts: Vec<(String, bool)> = prompts
                        .into_iter()
                        .map(|prompt| ((*prompt.prompt).to_string(), *prompt.echo))
                        .collect();

                    let answers = prompter.0.respond(&name, &instruction, &prompts);

                    session
                        .send(&userauth::InfoResponse {
                            responses: answers
                                .into_iter()
                                .map(|answer| answer.into())
                                .collect(),
                        })
                        .await?;

                    response = session.recv().await?;
                }

                Ok(response)
            }
        }
    }
}

impl<R: Request> Request for Auth<R> {
    type Err = R::Err;
    type Ok<IO: Pipe, S: Side> = R::Ok<IO, S>;

    const SERVICE_NAME: Ascii<'static> = crate::SERVICE_NAME;

    async fn on_accept<IO, S>(
        &mut self,
        mut session: Session<IO, S>,
    ) -> Result<Self::Ok<IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        let mut method = Method::None;

        loop {
            let response = self.attempt_method(&mut session, &method).await?;

            if response.to::<userauth::Success>().is_ok() {
                break self.service.on_accept(session).await;
            } else if let Ok(userauth::Failure {
                continue_with,
                partial_success,
            }) = response.to()
            {
                if *partial_success {
                    tracing::debug!(
                        "Method `{}` succeeded as part of a multi-step authentication, server requires further methods from `{continue_with:?}`",
                        method.as_ref(),
                    );
                }

                if let Some(next) = self.next_method(&continue_with) {
                    method = next;
                } else {
                    break Err(Error::from(
                        session
                            .disconnect(
                                DisconnectReason::NoMoreAuthMethodsAvailable,
                                "Exhausted available authentication methods",
                            )
                            .await,
                    )
                    .into());
                };
            } else {
                break Err(Error::from(
                    session
                        .disconnect(
                            DisconnectReason::ProtocolError,
                            format!(
                                "Unexpected message in the context of the `{}` service request",
                                Self::SERVICE_NAME
                            ),
                        )
                        .await,
                )
                .into());
            }
        }
    }
}
