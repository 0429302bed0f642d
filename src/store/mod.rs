mod batcher;
mod error;
mod mongo;

pub use batcher::{
    BatcherHandle, MessageBatcher, MAX_FLUSH_GRACE, MAX_PER_REQUEST, STORE_INTERVAL,
};
pub use error::StoreError;
pub use mongo::{MongoStore, MONGODB_URI_ENV};

use mongodb::bson::{Bson, Document};

/// One document per hive run.
pub const RUN_COLLECTION: &str = "hive_runs";
/// The message stream, each document referencing its run.
pub const MESSAGE_COLLECTION: &str = "hive_messages";

/// The document store the batcher writes through. Both operations may block
/// up to the driver's bounded timeout.
pub trait DocumentStore: Send + Sync + 'static {
    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;

    /// Bulk insert preserving the order of `documents`. Returns the
    /// assigned ids in the same order.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>, StoreError>;
}
