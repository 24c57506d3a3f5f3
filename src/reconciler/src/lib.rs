// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Reconciles declared PostgreSQL default-privilege grants.
//!
//! A [`DefaultPrivilegeGrant`] declares that a role should receive a set of
//! privileges on all future tables created by an owner role in one schema
//! of one database. Each reconciliation pass resolves indirect references
//! to literals, maps the role names to cluster OIDs, probes the target
//! database's default-ACL catalog, and then installs or revokes the grant
//! through an ordered statement sequence executed in a single transaction.
//!
//! The control-plane framework drives the pass through the four verbs of
//! [`ExternalClient`](defacl_controller_types::ExternalClient); everything
//! here is synchronous with respect to one declared object, and the
//! framework owns scheduling, retry, and status persistence.

use defacl_controller_types::ResolveError;
use defacl_postgres_util::PostgresError;

mod catalog;
mod connect;
mod external;
mod statements;
mod types;

pub use catalog::{database_exists, default_acl_exists, role_oid};
pub use connect::Connector;
pub use external::DefaultPrivilegeClient;
pub use types::{
    DefaultPrivilegeGrant, GrantParameters, Privilege, Privileges, resolve_references,
};

/// An error reconciling a default-privilege grant.
///
/// Every variant that crosses the verb boundary names the stage that
/// failed, so an operator can tell a role-resolution failure from a failed
/// grant without reading SQL. Validation variants fire before any query is
/// issued.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The host framework routed an object of another kind here.
    #[error("managed resource is not a DefaultPrivilegeGrant")]
    WrongKind,
    #[error("role not passed or could not be resolved")]
    NoRole,
    #[error("owner not passed or could not be resolved")]
    NoOwner,
    #[error("schema not passed or could not be resolved")]
    NoSchema,
    #[error("database not passed or could not be resolved")]
    NoDatabase,
    #[error("privileges not passed")]
    NoPrivileges,
    /// A privilege token failed the allow-list check.
    #[error("invalid privilege {token:?}: expected an uppercase keyword")]
    InvalidPrivilege { token: String },
    #[error("cannot resolve {field}: {source}")]
    ResolveReference {
        field: &'static str,
        #[source]
        source: ResolveError,
    },
    #[error("cannot select role id for {role}: {source}")]
    SelectRoleId {
        role: String,
        #[source]
        source: PostgresError,
    },
    #[error("cannot select default privileges: {0}")]
    SelectDefaultPrivileges(#[source] PostgresError),
    #[error("cannot create default privileges: {0}")]
    CreateDefaultPrivileges(#[source] PostgresError),
    #[error("cannot revoke default privileges: {0}")]
    RevokeDefaultPrivileges(#[source] PostgresError),
    #[error("cannot connect to database {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: PostgresError,
    },
}
