// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use tracing::debug;

use defacl_controller_types::{
    Condition, Creation, ExternalClient, Managed, Observation, Update,
};
use defacl_postgres_util::Handle;

use crate::types::DefaultPrivilegeGrant;
use crate::{catalog, statements, ReconcileError};

/// Reconciles one declared grant against the cluster.
///
/// `identity` is bound to the provider default database and serves the
/// cluster-wide role catalog; `target` is bound to the database the grant's
/// DDL runs in. The target database name is fixed at connect time so the
/// delete path can re-probe its existence without consulting the
/// declaration again.
#[derive(Debug)]
pub struct DefaultPrivilegeClient<H> {
    identity: H,
    target: H,
    target_database: String,
}

impl<H: Handle> DefaultPrivilegeClient<H> {
    pub fn new(identity: H, target: H, target_database: impl Into<String>) -> Self {
        DefaultPrivilegeClient {
            identity,
            target,
            target_database: target_database.into(),
        }
    }

    fn grant<'a>(
        &self,
        mg: &'a mut dyn Managed,
    ) -> Result<&'a mut DefaultPrivilegeGrant, ReconcileError> {
        mg.as_any_mut()
            .downcast_mut()
            .ok_or(ReconcileError::WrongKind)
    }
}

#[async_trait]
impl<H: Handle> ExternalClient for DefaultPrivilegeClient<H> {
    type Error = ReconcileError;

    async fn observe(&self, mg: &mut dyn Managed) -> Result<Observation, ReconcileError> {
        let grant = self.grant(mg)?;
        let role = grant.params.role().ok_or(ReconcileError::NoRole)?.to_owned();
        let owner = grant
            .params
            .owner()
            .ok_or(ReconcileError::NoOwner)?
            .to_owned();

        let role_oid = catalog::role_oid(&self.identity, &role)
            .await
            .map_err(|source| ReconcileError::SelectRoleId {
                role: role.clone(),
                source,
            })?;
        let owner_oid = catalog::role_oid(&self.identity, &owner)
            .await
            .map_err(|source| ReconcileError::SelectRoleId {
                role: owner.clone(),
                source,
            })?;

        let exists = catalog::default_acl_exists(&self.target, owner_oid, role_oid)
            .await
            .map_err(ReconcileError::SelectDefaultPrivileges)?;

        if !exists {
            debug!(role = %role, owner = %owner, "no matching default-ACL entry");
            return Ok(Observation {
                resource_exists: false,
                ..Default::default()
            });
        }

        // An existing grant has no way of being out of date: the next
        // install pass revokes everything and regrants, so existence is
        // the whole observation.
        grant.set_condition(Condition::available());

        Ok(Observation {
            resource_exists: true,
            resource_up_to_date: true,
            resource_late_initialized: false,
        })
    }

    async fn create(&self, mg: &mut dyn Managed) -> Result<Creation, ReconcileError> {
        let grant = self.grant(mg)?;
        grant.set_condition(Condition::creating());

        let queries = statements::install_statements(&grant.params)?;
        debug!(database = %self.target_database, "installing default-privilege grant");
        self.target
            .exec_tx(&queries)
            .await
            .map_err(ReconcileError::CreateDefaultPrivileges)?;

        Ok(Creation)
    }

    async fn update(&self, mg: &mut dyn Managed) -> Result<Update, ReconcileError> {
        // Nothing to do: an existing grant always observes as up to date,
        // and drift converges through the install sequence's unconditional
        // revoke-then-grant when the host framework re-runs create.
        self.grant(mg)?;
        Ok(Update)
    }

    async fn delete(&self, mg: &mut dyn Managed) -> Result<(), ReconcileError> {
        let grant = self.grant(mg)?;
        grant.set_condition(Condition::deleting());

        // The database may have been dropped out-of-band since the last
        // observation, in which case there is nothing left to revoke.
        let database_exists = catalog::database_exists(&self.identity, &self.target_database)
            .await
            .map_err(ReconcileError::RevokeDefaultPrivileges)?;
        if !database_exists {
            debug!(database = %self.target_database, "database is gone, nothing to revoke");
            return Ok(());
        }

        let queries = statements::revoke_statements(&grant.params)?;
        debug!(database = %self.target_database, "revoking default-privilege grant");
        self.target
            .exec_tx(&queries)
            .await
            .map_err(ReconcileError::RevokeDefaultPrivileges)?;

        Ok(())
    }
}
