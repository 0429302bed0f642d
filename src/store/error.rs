use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MONGODB_URI environment variable is not set")]
    MissingUri,

    #[error("store driver error: `{0}`")]
    Driver(#[from] mongodb::error::Error),

    #[error("store rejected the write: `{0}`")]
    Rejected(String),
}
