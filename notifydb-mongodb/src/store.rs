use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, Credential, FindOptions as MongoFindOptions, IndexOptions},
};
use std::time::Duration;
use tracing::{debug, info};

use notifydb_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoreSession},
    collection::{PRIMARY_INDEX, set_update},
    config::DatabaseConfig,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::FindOptions,
};

const NAMESPACE_NOT_FOUND: i32 = 26;
const DUPLICATE_KEY: i32 = 11000;

/// Maps a driver error, reporting lost connectivity as a connection error.
fn map_error(operation: &'static str, collection: &str, err: MongoError) -> DocumentStoreError {
    match *err.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => DocumentStoreError::Connection(err.to_string()),
        _ => DocumentStoreError::store(operation, collection, err),
    }
}

fn is_namespace_not_found(err: &MongoError) -> bool {
    matches!(&*err.kind, ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND)
}

/// True when an insert collided with an existing `_id`, as opposed to a secondary unique index.
fn is_duplicate_identifier(err: &MongoError) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write))
            if write.code == DUPLICATE_KEY && names_primary_index(&write.message)
    )
}

// E11000 duplicate key error collection: db.message index: _id_ dup key: { ... }
fn names_primary_index(message: &str) -> bool {
    message
        .split_once("index: ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        == Some(PRIMARY_INDEX)
}

/// A connection to a MongoDB deployment, scoped to one database.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Session = MongoDbSession;

    async fn session(&self) -> DocumentStoreResult<Self::Session> {
        Ok(MongoDbSession {
            database: self.client.database(&self.database),
        })
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

/// A lightweight handle on the shared client's connection pool.
///
/// Dropping the session returns nothing to the pool explicitly; the driver checks connections
/// back in after every command.
#[derive(Debug, Clone)]
pub struct MongoDbSession {
    database: Database,
}

impl MongoDbSession {
    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl StoreSession for MongoDbSession {
    async fn count_documents(&self, collection: &str, filter: &Document) -> DocumentStoreResult<u64> {
        self.collection(collection)
            .count_documents(filter.clone())
            .await
            .map_err(|e| map_error("count", collection, e))
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut find_options = MongoFindOptions::default();

        if options.skip > 0 {
            find_options.skip = Some(options.skip);
        }
        if let Some(limit) = options.limit {
            find_options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(sort) = &options.sort {
            find_options.sort = Some(doc! { sort.field.clone(): sort.direction.as_i32() });
        }

        self.collection(collection)
            .find(filter.clone())
            .with_options(find_options)
            .await
            .map_err(|e| map_error("find", collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| map_error("find", collection, e))
    }

    async fn insert_document(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        let id = document.get_object_id(ID_FIELD).ok();

        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| match id {
                Some(id) if is_duplicate_identifier(&e) => DocumentStoreError::DocumentAlreadyExists {
                    collection: collection.to_string(),
                    id: id.to_hex(),
                },
                _ => map_error("insert", collection, e),
            })?;

        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<Option<Document>> {
        self.collection(collection)
            .find_one(doc! { ID_FIELD: id })
            .await
            .map_err(|e| map_error("find_by_id", collection, e))
    }

    async fn replace_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> DocumentStoreResult<bool> {
        let result = self
            .collection(collection)
            .replace_one(doc! { ID_FIELD: id }, document)
            .await
            .map_err(|e| map_error("replace", collection, e))?;

        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { ID_FIELD: id })
            .await
            .map_err(|e| map_error("delete", collection, e))?;

        Ok(result.deleted_count > 0)
    }

    async fn update_many(
        &self,
        collection: &str,
        selector: &Document,
        set: Document,
    ) -> DocumentStoreResult<u64> {
        let result = self
            .collection(collection)
            .update_many(selector.clone(), set_update(set))
            .await
            .map_err(|e| map_error("update", collection, e))?;

        Ok(result.matched_count)
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<String> {
        let result = self
            .collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(unique).build())
                    .build(),
            )
            .await
            .map_err(|e| map_error("create_index", collection, e))?;

        Ok(result.index_name)
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        match self.collection(collection).list_index_names().await {
            Ok(names) => Ok(names),
            Err(e) if is_namespace_not_found(&e) => {
                debug!(collection, "collection does not exist yet, no indexes");
                Ok(vec![])
            }
            Err(e) => Err(map_error("list_indexes", collection, e)),
        }
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        self.collection(collection)
            .drop_index(name)
            .await
            .map_err(|e| map_error("drop_index", collection, e))
    }
}

/// Builder for [`MongoDbStore`] connections.
///
/// Building parses the connection string, applies credentials and timeouts, then verifies the
/// deployment with a `ping` so an unreachable server or bad credentials fail right away.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    auth_db: String,
    credential: Option<Credential>,
    timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            auth_db: "admin".to_string(),
            credential: None,
            timeout: None,
        }
    }

    /// Builds the connection settings from a [`DatabaseConfig`].
    ///
    /// Credentials are only applied when a user name is configured.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let builder = Self::new(&format!("mongodb://{}", config.address()), &config.database)
            .with_timeout(config.timeout());

        if config.user.is_empty() {
            Self {
                auth_db: config.auth_db.clone(),
                ..builder
            }
        } else {
            builder.with_credentials(&config.user, &config.pass, &config.auth_db)
        }
    }

    /// Authenticates as `user` against the `auth_db` database.
    pub fn with_credentials(mut self, user: &str, pass: &str, auth_db: &str) -> Self {
        self.credential = Some(
            Credential::builder()
                .username(user.to_string())
                .password(pass.to_string())
                .source(auth_db.to_string())
                .build(),
        );
        self.auth_db = auth_db.to_string();
        self
    }

    /// Sets both the connect and the server selection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    async fn client_options(&self) -> DocumentStoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        if let Some(credential) = &self.credential {
            options.credential = Some(credential.clone());
        }
        if let Some(timeout) = self.timeout {
            options.connect_timeout = Some(timeout);
            options.server_selection_timeout = Some(timeout);
        }

        Ok(options)
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(&self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(self.client_options().await?)
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        client
            .database(&self.auth_db)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Connection(format!("ping failed: {e}")))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_primary_index_collisions_are_duplicate_identifiers() {
        assert!(names_primary_index(
            "E11000 duplicate key error collection: notification.message index: _id_ dup key: { _id: ObjectId('65f0c0ffee00000000000001') }"
        ));
        assert!(!names_primary_index(
            "E11000 duplicate key error collection: notification.userdevicetoken index: token_1 dup key: { token: \"abc\" }"
        ));
        assert!(!names_primary_index("E11000 duplicate key error"));
    }

    #[test]
    fn from_config_without_user_skips_credentials() {
        let builder = MongoDbStoreBuilder::from_config(&DatabaseConfig::default());

        assert_eq!(builder.dsn(), "mongodb://localhost:27017");
        assert_eq!(builder.database(), "notification");
        assert!(builder.credential.is_none());
        assert_eq!(builder.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn from_config_with_user_authenticates_against_auth_db() {
        let config = DatabaseConfig {
            host: "db.internal".into(),
            port: 27018,
            user: "notifier".into(),
            pass: "secret".into(),
            auth_db: "users".into(),
            connect_timeout: 5,
            ..DatabaseConfig::default()
        };

        let builder = MongoDbStoreBuilder::from_config(&config);
        let credential = builder.credential.clone().unwrap();

        assert_eq!(builder.dsn(), "mongodb://db.internal:27018");
        assert_eq!(credential.username.as_deref(), Some("notifier"));
        assert_eq!(credential.source.as_deref(), Some("users"));
        assert_eq!(builder.auth_db, "users");
        assert_eq!(builder.timeout, Some(Duration::from_secs(5)));
    }
}
