// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Builds the ordered statement sequences that install or revoke a grant.
//!
//! Default-ACL changes are only settable under the owning role's session
//! identity, so every sequence starts with `SET ROLE` and the statements
//! that follow depend on it. A sequence must therefore execute in order,
//! on one session, inside one transaction; callers hand the whole list to
//! [`Handle::exec_tx`](defacl_postgres_util::Handle) and never execute a
//! statement from it independently.

use defacl_postgres_util::{quote_identifier, Query};

use crate::types::GrantParameters;
use crate::ReconcileError;

/// The statements that install the declared grant.
///
/// Previously granted table default privileges are revoked unconditionally
/// before the grant, which makes the sequence converge to the declaration
/// from any prior state and keeps repeat runs idempotent.
pub(crate) fn install_statements(params: &GrantParameters) -> Result<Vec<Query>, ReconcileError> {
    let role = params.role().ok_or(ReconcileError::NoRole)?;
    let schema = params.schema().ok_or(ReconcileError::NoSchema)?;
    let owner = params.owner().ok_or(ReconcileError::NoOwner)?;
    if params.privileges.is_empty() {
        return Err(ReconcileError::NoPrivileges);
    }

    let role = quote_identifier(role);
    let schema = quote_identifier(schema);
    let owner = quote_identifier(owner);
    let privileges = params.privileges.to_clause();

    Ok(vec![
        Query::new(format!("SET ROLE {owner}")),
        Query::new(format!(
            "ALTER DEFAULT PRIVILEGES FOR ROLE {owner} IN SCHEMA {schema} \
             REVOKE ALL ON TABLES FROM {role}"
        )),
        Query::new(format!(
            "ALTER DEFAULT PRIVILEGES FOR ROLE {owner} IN SCHEMA {schema} \
             GRANT {privileges} ON TABLES TO {role}"
        )),
    ])
}

/// The statements that remove every table default privilege the rule's
/// role holds in the schema. Privileges are irrelevant to a full revoke,
/// so only the identity fields are required.
pub(crate) fn revoke_statements(params: &GrantParameters) -> Result<Vec<Query>, ReconcileError> {
    let role = params.role().ok_or(ReconcileError::NoRole)?;
    let schema = params.schema().ok_or(ReconcileError::NoSchema)?;
    let owner = params.owner().ok_or(ReconcileError::NoOwner)?;

    let role = quote_identifier(role);
    let schema = quote_identifier(schema);
    let owner = quote_identifier(owner);

    Ok(vec![
        Query::new(format!("SET ROLE {owner}")),
        Query::new(format!(
            "ALTER DEFAULT PRIVILEGES FOR ROLE {owner} IN SCHEMA {schema} \
             REVOKE ALL ON TABLES FROM {role}"
        )),
    ])
}
