//! Receive-with-timeout for tokio channels
use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc::Receiver;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecvTimeoutError {
    #[error("timed out waiting for message")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Channel receivers that give up waiting after a timeout
pub trait TimeoutReceiver<T> {
    fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<T, RecvTimeoutError>> + Send;
}

impl<T> TimeoutReceiver<T> for Receiver<T>
where
    T: Send + Sync,
{
    async fn recv_timeout(&mut self, duration: Duration) -> Result<T, RecvTimeoutError> {
        match tokio::time::timeout(duration, self.recv()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(RecvTimeoutError::Closed),
            Err(_) => Err(RecvTimeoutError::Timeout),
        }
    }
}
