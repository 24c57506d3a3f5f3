// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::borrow::Cow;
use std::fmt;

use tokio_postgres::types::ToSql;

/// A SQL statement and the positional parameters bound to it.
///
/// User-controlled values only ever travel as parameters; the only dynamic
/// content permitted in the statement text itself is identifiers that have
/// been through [`quote_identifier`](crate::quote_identifier) and privilege
/// tokens validated upstream.
pub struct Query {
    sql: Cow<'static, str>,
    params: Vec<Box<dyn ToSql + Send + Sync>>,
}

impl Query {
    /// Creates a query with no parameters.
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Query {
        Query {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends a positional parameter.
    pub fn bind<P>(mut self, param: P) -> Query
    where
        P: ToSql + Send + Sync + 'static,
    {
        self.params.push(Box::new(param));
        self
    }

    /// The statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Borrows the parameters in the form the driver expects.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("params", &self.params.len())
            .finish()
    }
}
