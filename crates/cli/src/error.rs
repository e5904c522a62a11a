use crate::signals::SignalEvent;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[source] io::Error),

    #[error("failed to forward signal event: {0}")]
    SendSignal(#[from] flume::SendError<SignalEvent>),
}
