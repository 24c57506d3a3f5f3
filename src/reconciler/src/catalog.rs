// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Read-only catalog probes.
//!
//! Role identities live in the cluster-wide catalog and are probed through
//! the identity-scope handle; default-ACL state is per-database and is
//! probed through the target-database handle. None of these queries have
//! side effects.

use defacl_postgres_util::{Handle, PostgresError, Query};
use tokio_postgres::types::Oid;

/// Maps a role name to its cluster-wide OID.
pub async fn role_oid<H>(handle: &H, name: &str) -> Result<Oid, PostgresError>
where
    H: Handle + ?Sized,
{
    let query = Query::new("SELECT oid FROM pg_roles WHERE rolname = $1").bind(name.to_owned());
    match handle.scan_oid(&query).await? {
        Some(oid) => Ok(oid),
        None => Err(PostgresError::RoleNotFound {
            role: name.to_owned(),
        }),
    }
}

/// Whether the named database still exists. The delete path re-probes this
/// rather than trusting an earlier observation, because the database may
/// have been dropped out-of-band between verbs.
pub async fn database_exists<H>(handle: &H, name: &str) -> Result<bool, PostgresError>
where
    H: Handle + ?Sized,
{
    let query = Query::new(
        "SELECT EXISTS (SELECT datname FROM pg_catalog.pg_database WHERE datname = $1)",
    )
    .bind(name.to_owned());
    handle.scan_bool(&query).await
}

/// Whether a default-ACL entry for future tables exists with `owner` as
/// grantor and `role` as grantee, within the public namespace.
///
/// Absence is a normal outcome, not an error: it is the signal that the
/// grant still needs creating.
pub async fn default_acl_exists<H>(
    handle: &H,
    owner: Oid,
    role: Oid,
) -> Result<bool, PostgresError>
where
    H: Handle + ?Sized,
{
    let query = Query::new(
        "SELECT EXISTS (
            SELECT 1 FROM (
                SELECT defaclnamespace, (aclexplode(defaclacl)).* FROM pg_default_acl
                WHERE defaclobjtype = 'r'
            ) AS t (namespace, grantor_oid, grantee_oid, prtype, grantable)
            JOIN pg_namespace ON pg_namespace.oid = namespace
            WHERE grantee_oid = $1 AND nspname = 'public' AND grantor_oid = $2
        )",
    )
    .bind(role)
    .bind(owner);
    handle.scan_bool(&query).await
}
