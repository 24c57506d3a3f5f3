// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::types::Oid;
use tracing::debug;

use crate::{PostgresError, Query};

/// The reconciler's execution contract against one database.
///
/// `exec_tx` is the only mutating entry point. Statement sequences handed to
/// it depend on session state established by their first statement, so the
/// implementation must execute them in order, on one session, inside one
/// transaction. Atomicity of a partially failed sequence is delegated to the
/// server's transaction rollback.
#[async_trait]
pub trait Handle: fmt::Debug + Send + Sync {
    /// Runs a query returning a single row with a single boolean column.
    async fn scan_bool(&self, query: &Query) -> Result<bool, PostgresError>;

    /// Runs a query returning at most one row with a single OID column.
    /// `None` means no row matched, which is data, not an error.
    async fn scan_oid(&self, query: &Query) -> Result<Option<Oid>, PostgresError>;

    /// Executes the statements in order inside a single transaction.
    async fn exec_tx(&self, queries: &[Query]) -> Result<(), PostgresError>;
}

#[async_trait]
impl<H: Handle + ?Sized> Handle for Arc<H> {
    async fn scan_bool(&self, query: &Query) -> Result<bool, PostgresError> {
        (**self).scan_bool(query).await
    }

    async fn scan_oid(&self, query: &Query) -> Result<Option<Oid>, PostgresError> {
        (**self).scan_oid(query).await
    }

    async fn exec_tx(&self, queries: &[Query]) -> Result<(), PostgresError> {
        (**self).exec_tx(queries).await
    }
}

/// A pooled connection to one PostgreSQL database.
pub struct PgHandle {
    pool: Pool,
}

// Verb invocations for one object are sequential, so a single connection
// with one spare covers a pass.
const POOL_SIZE: usize = 2;

impl PgHandle {
    /// Builds a handle whose connections use the given configuration.
    pub fn connect(
        config: tokio_postgres::Config,
        tls: MakeTlsConnector,
    ) -> Result<PgHandle, PostgresError> {
        let manager = Manager::from_config(
            config,
            tls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(POOL_SIZE)
            .build()
            .map_err(|e| PostgresError::Generic(e.into()))?;
        Ok(PgHandle { pool })
    }
}

impl fmt::Debug for PgHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgHandle").finish_non_exhaustive()
    }
}

#[async_trait]
impl Handle for PgHandle {
    async fn scan_bool(&self, query: &Query) -> Result<bool, PostgresError> {
        let client = self.pool.get().await?;
        let row = client.query_one(query.sql(), &query.params()).await?;
        Ok(row.try_get(0)?)
    }

    async fn scan_oid(&self, query: &Query) -> Result<Option<Oid>, PostgresError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(query.sql(), &query.params()).await?;
        row.map(|r| r.try_get(0)).transpose().map_err(Into::into)
    }

    async fn exec_tx(&self, queries: &[Query]) -> Result<(), PostgresError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        for query in queries {
            debug!(sql = query.sql(), "executing statement in transaction");
            tx.execute(query.sql(), &query.params()).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
