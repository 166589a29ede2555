//! Aurora PostgreSQL + pgvector access.
//!
//! Insert and search statements are not authored here; the platform uploads
//! them as templates with `$1..$n` placeholders. [`ItemStore`] documents the
//! binding contract for template authors; [`VectorStore`] is the live
//! implementation the Lambda binaries use, acquired inside one invocation
//! and released when it goes out of scope, on success and failure paths
//! alike.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::error;

use crate::error::{Error, Result};

/// Secrets Manager secret holding the cluster credentials.
const CREDENTIALS_SECRET_ID: &str = "AuroraClusterCredentials";

const DEFAULT_PORT: u16 = 5432;

/// Credentials for the database cluster.
#[derive(Clone, Deserialize)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

/// Fetches the cluster credentials from Secrets Manager.
///
/// Runs at cold-start; a missing or malformed secret is a configuration
/// error.
pub async fn fetch_credentials(
    client: &aws_sdk_secretsmanager::Client,
) -> Result<DbCredentials> {
    let output = client
        .get_secret_value()
        .secret_id(CREDENTIALS_SECRET_ID)
        .send()
        .await
        .map_err(|e| {
            Error::Config(format!("cannot fetch database credentials: {e}"))
        })?;
    let secret = output.secret_string().ok_or_else(|| {
        Error::Config("database credentials secret is empty".to_string())
    })?;
    serde_json::from_str(secret).map_err(|e| {
        Error::Config(format!("database credentials are not valid JSON: {e}"))
    })
}

/// The vector store operations the request pipeline needs.
///
/// The binding order of the externally supplied templates is the contract:
///
/// - search: `$1` = embedding (text form, cast with `$1::vector`),
///   `$2` = `num_items` (bound as `bigint`, so `LIMIT $2` works directly),
///   `$3..` = the additional parameters, in order, bound as text;
/// - insert: `$1` = item text, `$2` = embedding (text form, cast with
///   `$2::vector`), `$3..` = the additional parameters, in order, bound as
///   text.
#[async_trait]
pub trait ItemStore {
    /// Runs a similarity search, returning rows with `id`, `distance` and
    /// `description` columns.
    async fn search(
        &self,
        template: &str,
        embedding: &[f32],
        num_items: u32,
        additional: &[String],
    ) -> Result<Vec<SearchResult>>;

    /// Inserts one item.
    async fn insert(
        &self,
        template: &str,
        text: &str,
        embedding: &[f32],
        additional: &[String],
    ) -> Result<()>;
}

/// One similarity-search match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: i64,
    /// Squared distance to the query embedding; lower is closer.
    pub distance: f64,
    pub description: String,
}

/// A live connection to one cluster endpoint.
pub struct VectorStore {
    client: tokio_postgres::Client,
    connection: tokio::task::JoinHandle<()>,
}

impl VectorStore {
    /// Connects to a reader or writer endpoint.
    pub async fn connect(
        host: &str,
        database: &str,
        credentials: &DbCredentials,
    ) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .port(DEFAULT_PORT)
            .user(&credentials.username)
            .password(&credentials.password)
            .dbname(database);
        let (client, connection) =
            config.connect(NoTls).await.map_err(|e| {
                Error::upstream(format!("cannot connect to {host}: {e}"))
            })?;
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("database connection error: {e}");
            }
        });
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl ItemStore for VectorStore {
    async fn search(
        &self,
        template: &str,
        embedding: &[f32],
        num_items: u32,
        additional: &[String],
    ) -> Result<Vec<SearchResult>> {
        let embedding = vector_literal(embedding);
        let num_items = i64::from(num_items);
        let mut params: Vec<&(dyn ToSql + Sync)> =
            vec![&embedding, &num_items];
        params.extend(
            additional.iter().map(|a| a as &(dyn ToSql + Sync)),
        );
        let rows = self
            .client
            .query(template, &params)
            .await
            .map_err(|e| Error::upstream(format!("search failed: {e}")))?;
        rows.iter()
            .map(|row| {
                Ok(SearchResult {
                    id: row.try_get("id").map_err(Error::upstream)?,
                    distance: row
                        .try_get("distance")
                        .map_err(Error::upstream)?,
                    description: row
                        .try_get("description")
                        .map_err(Error::upstream)?,
                })
            })
            .collect()
    }

    async fn insert(
        &self,
        template: &str,
        text: &str,
        embedding: &[f32],
        additional: &[String],
    ) -> Result<()> {
        let embedding = vector_literal(embedding);
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&text, &embedding];
        params.extend(
            additional.iter().map(|a| a as &(dyn ToSql + Sync)),
        );
        self.client
            .execute(template, &params)
            .await
            .map_err(|e| Error::upstream(format!("insert failed: {e}")))?;
        Ok(())
    }
}

impl Drop for VectorStore {
    fn drop(&mut self) {
        // Dropping the client ends the session; the driver task just needs
        // to stop polling.
        self.connection.abort();
    }
}

/// Text form pgvector accepts for a vector value.
fn vector_literal(embedding: &[f32]) -> String {
    let elements: Vec<String> =
        embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", elements.join(","))
}
