// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use defacl_postgres_util::{ConnectionParams, PgHandle};

use crate::external::DefaultPrivilegeClient;
use crate::types::DefaultPrivilegeGrant;
use crate::ReconcileError;

/// Builds the per-pass database handles for a declared grant.
///
/// Role identities are cluster-global while default-ACL state is
/// per-database, so every pass gets two handles: one bound to the provider
/// default database for identity lookups, and one bound to the grant's
/// target database for the ACL probe and all DDL. The handles are owned by
/// the returned client for exactly one reconciliation pass and never shared
/// across objects.
#[derive(Debug, Clone)]
pub struct Connector {
    params: ConnectionParams,
    default_database: String,
}

impl Connector {
    pub fn new(params: ConnectionParams, default_database: impl Into<String>) -> Connector {
        Connector {
            params,
            default_database: default_database.into(),
        }
    }

    /// Selects the target database for this grant and connects both
    /// handles.
    pub fn connect(
        &self,
        grant: &DefaultPrivilegeGrant,
    ) -> Result<DefaultPrivilegeClient<PgHandle>, ReconcileError> {
        let target_database = self.target_database(grant)?;

        let identity = self
            .params
            .connect(&self.default_database)
            .map_err(|source| ReconcileError::Connect {
                database: self.default_database.clone(),
                source,
            })?;
        let target =
            self.params
                .connect(&target_database)
                .map_err(|source| ReconcileError::Connect {
                    database: target_database.clone(),
                    source,
                })?;

        Ok(DefaultPrivilegeClient::new(identity, target, target_database))
    }

    /// The database the grant's DDL runs in: the declared database when one
    /// is set, the provider default otherwise.
    ///
    /// A declared database that is still an unresolved reference is a
    /// validation failure, not an invitation to fall back to the default.
    fn target_database(&self, grant: &DefaultPrivilegeGrant) -> Result<String, ReconcileError> {
        match &grant.params.database {
            None => Ok(self.default_database.clone()),
            Some(value) => Ok(value
                .literal()
                .ok_or(ReconcileError::NoDatabase)?
                .to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {

    use defacl_controller_types::{NameRef, ObjectRef};
    use defacl_postgres_util::ConnectionParams;
    use tokio_postgres::config::SslMode;

    use super::Connector;
    use crate::types::{DefaultPrivilegeGrant, GrantParameters};
    use crate::ReconcileError;

    fn connector() -> Connector {
        let params = ConnectionParams {
            host: "pg.internal".into(),
            port: 5432,
            user: "admin".into(),
            password: "hunter2".into(),
            ssl_mode: SslMode::Prefer,
        };
        Connector::new(params, "postgres")
    }

    fn grant(database: Option<NameRef>) -> DefaultPrivilegeGrant {
        DefaultPrivilegeGrant::new(GrantParameters {
            database,
            ..GrantParameters::default()
        })
    }

    #[test]
    fn test_target_database_selection() {
        let connector = connector();

        let declared = grant(Some(NameRef::Literal("orders".into())));
        assert_eq!(connector.target_database(&declared).unwrap(), "orders");

        let defaulted = grant(None);
        assert_eq!(connector.target_database(&defaulted).unwrap(), "postgres");
    }

    #[test]
    fn test_unresolved_database_is_a_validation_failure() {
        let connector = connector();
        let unresolved = grant(Some(NameRef::Reference(ObjectRef {
            name: "orders-db".into(),
        })));
        assert!(matches!(
            connector.target_database(&unresolved),
            Err(ReconcileError::NoDatabase)
        ));
    }
}
