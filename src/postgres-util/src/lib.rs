// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! PostgreSQL utility library.
//!
//! Connection configuration, TLS setup, identifier quoting, and the
//! [`Handle`] execution contract the default-privilege reconciler runs its
//! catalog probes and DDL through.

mod config;
mod handle;
mod query;
mod tls;

pub use config::{ConnectionParams, parse_ssl_mode};
pub use handle::{Handle, PgHandle};
pub use query::Query;
pub use tls::make_tls;

/// An error interacting with a PostgreSQL server.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Any other error we bail on.
    #[error(transparent)]
    Generic(#[from] anyhow::Error),
    /// A tokio-postgres driver error.
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
    /// Error checking a connection out of the pool.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// Error setting up postgres ssl.
    #[error(transparent)]
    OpenSsl(#[from] openssl::error::ErrorStack),
    /// No role with the given name exists in the cluster.
    #[error("could not find oid for role {role}")]
    RoleNotFound {
        /// The role name that failed to resolve.
        role: String,
    },
}

/// Quotes a PostgreSQL identifier, matching the semantics of the server's
/// `quote_ident`: the name is wrapped in double quotes and any embedded
/// double quote is doubled.
pub fn quote_identifier(identifier: &str) -> String {
    let mut escaped = identifier.replace('"', "\"\"");
    escaped.insert(0, '"');
    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {

    use super::quote_identifier;

    #[test]
    fn test_identifier_quoting() {
        let expected = vec![r#""a""#, r#""naughty""sql""#, r#"""";naughty;sql;""""#];
        let input = ["a", r#"naughty"sql"#, r#"";naughty;sql;""#]
            .iter()
            .map(|raw_str| quote_identifier(raw_str))
            .collect::<Vec<_>>();
        assert_eq!(expected, input);
    }
}
