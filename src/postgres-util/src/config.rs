// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use anyhow::anyhow;
use tokio_postgres::config::SslMode;

use crate::tls::make_tls;
use crate::{PgHandle, PostgresError};

// Key names in the connection credential map handed down by the control
// plane's secret store.
const ENDPOINT_KEY: &str = "endpoint";
const PORT_KEY: &str = "port";
const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

/// Connection parameters for one PostgreSQL server, independent of the
/// database a handle ends up bound to.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub ssl_mode: SslMode,
}

impl ConnectionParams {
    /// Assembles parameters from a credential map.
    ///
    /// The map carries raw bytes as delivered by the secret store; all four
    /// keys are required and must be UTF-8.
    pub fn from_credentials(
        credentials: &BTreeMap<String, Vec<u8>>,
        ssl_mode: SslMode,
    ) -> Result<ConnectionParams, PostgresError> {
        let field = |key: &str| -> Result<String, PostgresError> {
            let raw = credentials
                .get(key)
                .ok_or_else(|| anyhow!("connection credentials missing key {key:?}"))?;
            let value = String::from_utf8(raw.clone())
                .map_err(|_| anyhow!("connection credential {key:?} is not valid UTF-8"))?;
            Ok(value)
        };

        let port = field(PORT_KEY)?;
        let port = port
            .parse::<u16>()
            .map_err(|_| anyhow!("connection credential \"port\" is not a port number: {port}"))?;

        Ok(ConnectionParams {
            host: field(ENDPOINT_KEY)?,
            port,
            user: field(USERNAME_KEY)?,
            password: field(PASSWORD_KEY)?,
            ssl_mode,
        })
    }

    /// The driver configuration for a connection to the named database.
    pub fn pg_config(&self, database: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(database)
            .ssl_mode(self.ssl_mode);
        config
    }

    /// Builds a pooled handle bound to the named database.
    pub fn connect(&self, database: &str) -> Result<PgHandle, PostgresError> {
        let config = self.pg_config(database);
        let tls = make_tls(&config)?;
        PgHandle::connect(config, tls)
    }
}

/// Parses the libpq-style `sslmode` string the provider configuration
/// carries. An empty string means the libpq default, `prefer`.
pub fn parse_ssl_mode(mode: &str) -> Result<SslMode, PostgresError> {
    match mode {
        "" | "prefer" => Ok(SslMode::Prefer),
        "disable" => Ok(SslMode::Disable),
        "require" => Ok(SslMode::Require),
        "verify-ca" => Ok(SslMode::VerifyCa),
        "verify-full" => Ok(SslMode::VerifyFull),
        other => Err(PostgresError::Generic(anyhow!(
            "unsupported sslmode {other:?}"
        ))),
    }
}
