//! A dummy subservice to test for authentication success.

use assh::{side::Side, Pipe, Result, Session};

const SERVICE_NAME: &str = "dummy-service@assh.rs";

use std::{rc::Rc, sync::atomic::AtomicBool};

#[derive(Debug, Default, Clone)]
pub struct Cookie {
    flag: Rc<AtomicBool>,
}

impl Cookie {
    pub fn is_flagged(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl assh::service::Request for Cookie {
    const SERVICE_NAME: &'static str = SERVICE_NAME;

    type Err = assh::Error;
    type Ok<I: Pipe, S: Side> = ();

    async fn on_accept<I, S>(&mut self, _: Session<I, S>) -> Result<Self::Ok<I, S>, Self::Err>
    where
        I: Pipe,
        S: Side,
    {
        self.flag.store(true, std::sync::atomic::Ordering::Relaxed);

        Ok(())
    }
}

impl assh::service::Handler for Cookie {
    type Err = assh::Error;
    type Ok<I: Pipe, S: Side> = ();

    const SERVICE_NAME: &'static str = SERVICE_NAME;

    async fn on_request<I, S>(&mut self, _: Session<I, S>) -> Result<Self::Ok<I, S>, Self::Err>
    where
        I: Pipe,
        S: Side,
    {
        self.flag.store(true, std::sync::atomic::Ordering::Relaxed);

        Ok(())
    }
}
