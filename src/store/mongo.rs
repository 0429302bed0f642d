use std::time::Duration;

use mongodb::bson::{Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::sync::{Client, Database};

use super::error::StoreError;
use super::DocumentStore;

pub const MONGODB_URI_ENV: &str = "MONGODB_URI";

/// Used when the connection string names no database.
const DEFAULT_DATABASE: &str = "hive";

/// Bound on server selection so a dead store cannot stall the batcher past
/// its tick cadence for long.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connects using `MONGODB_URI`. A `.env` file, if any, is expected to
    /// have been loaded by the caller already.
    pub fn from_env() -> Result<Self, StoreError> {
        let uri = std::env::var(MONGODB_URI_ENV).map_err(|_| StoreError::MissingUri)?;
        Self::connect(&uri)
    }

    pub fn connect(uri: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).run()?;
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        Ok(Self { database })
    }
}

impl DocumentStore for MongoStore {
    fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let result = self
            .database
            .collection::<Document>(collection)
            .insert_one(document)
            .run()?;
        Ok(result.inserted_id)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let result = self
            .database
            .collection::<Document>(collection)
            .insert_many(documents)
            .run()?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(position, _)| *position);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }
}
