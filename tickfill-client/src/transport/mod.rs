use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tickfill_shared::{FrameError, Packet, Request};

mod tcp;

pub use tcp::*;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("no response received within {0}ms")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed response: {0}")]
    Malformed(#[from] FrameError),
    #[error("sequence {0} cannot be requested, no request was sent")]
    Unencodable(i32),
}

impl RequestError {
    pub(crate) fn timeout(timeout: Duration) -> Self {
        Self::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }
}

/// A single request/response exchange with the exchange server.
///
/// Every call owns its connection for the duration of the call only.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for exactly one packet, giving up after `timeout`.
    async fn send_and_await_one(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Packet, RequestError>;

    /// Sends `request` and collects every packet until the server closes the connection.
    async fn send_and_await_all(&self, request: Request) -> Result<Vec<Packet>, RequestError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_and_await_one(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Packet, RequestError> {
        (**self).send_and_await_one(request, timeout).await
    }

    async fn send_and_await_all(&self, request: Request) -> Result<Vec<Packet>, RequestError> {
        (**self).send_and_await_all(request).await
    }
}
