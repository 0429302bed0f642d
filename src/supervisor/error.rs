use thiserror::Error;

use crate::sequence::SequenceError;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("argument resolution failed: `{0}`")]
    Sequence(#[from] SequenceError),

    #[error("cannot install signal handler: `{0}`")]
    SignalHandler(#[from] ctrlc::Error),

    #[error("cannot spawn keep-alive thread: `{0}`")]
    Thread(#[from] std::io::Error),
}
