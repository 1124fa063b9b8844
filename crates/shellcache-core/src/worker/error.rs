use thiserror::Error;

use crate::net::FetchError;

use super::WorkerState;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid worker state transition: {from} -> {to}")]
    InvalidStateTransition { from: WorkerState, to: WorkerState },

    #[error("Network request failed: {0}")]
    Network(#[from] FetchError),
}
