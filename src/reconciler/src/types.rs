// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use defacl_controller_types::{
    Condition, Managed, NameRef, ReferenceKind, ReferenceResolver, ResolutionRequest,
    ResourceStatus,
};

use crate::ReconcileError;

/// A single privilege token, e.g. `SELECT` or `ALL`.
///
/// Tokens are validated on construction against the allow-listed pattern
/// (non-empty, ASCII uppercase only) so that by the time one is rendered
/// into a grant statement it cannot carry anything but a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Privilege(String);

impl Privilege {
    pub fn new(token: impl Into<String>) -> Result<Privilege, ReconcileError> {
        let token = token.into();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ReconcileError::InvalidPrivilege { token });
        }
        Ok(Privilege(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Privilege {
    type Error = ReconcileError;

    fn try_from(token: String) -> Result<Privilege, ReconcileError> {
        Privilege::new(token)
    }
}

impl From<Privilege> for String {
    fn from(privilege: Privilege) -> String {
        privilege.0
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The privilege set granted on future tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privileges(Vec<Privilege>);

impl Privileges {
    pub fn new(privileges: Vec<Privilege>) -> Privileges {
        Privileges(privileges)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The comma-separated privilege clause of the grant statement.
    pub(crate) fn to_clause(&self) -> String {
        self.0
            .iter()
            .map(Privilege::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<Privilege> for Privileges {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Privileges {
        Privileges(iter.into_iter().collect())
    }
}

/// Desired state of one default-privilege grant.
///
/// `role`, `owner`, and `database` may arrive as references to other
/// declared objects; [`resolve_references`] turns them into literals
/// before any verb logic runs. A field that is still indirect when a verb
/// needs it counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrantParameters {
    /// Role the privileges are granted to.
    pub role: Option<NameRef>,
    /// Role whose future-created tables the grant applies to. The install
    /// and revoke sequences run under this role's session identity.
    pub owner: Option<NameRef>,
    /// Schema the rule applies within.
    pub schema: Option<String>,
    /// Database the statements execute against. Falls back to the
    /// provider default database when unset.
    pub database: Option<NameRef>,
    /// Privileges granted on tables the owner will create.
    pub privileges: Privileges,
}

impl GrantParameters {
    pub fn role(&self) -> Option<&str> {
        self.role.as_ref().and_then(NameRef::literal)
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_ref().and_then(NameRef::literal)
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_ref().and_then(NameRef::literal)
    }
}

/// A declared default-privilege grant and its observed status.
///
/// Identity is the (database, schema, owner, role) tuple; the privilege
/// set is a value. Changing privileges on an existing tuple converges via
/// the install sequence's unconditional revoke-then-grant, never a partial
/// diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultPrivilegeGrant {
    pub params: GrantParameters,
    pub status: ResourceStatus,
}

impl DefaultPrivilegeGrant {
    pub const KIND: &'static str = "DefaultPrivilegeGrant";

    pub fn new(params: GrantParameters) -> DefaultPrivilegeGrant {
        DefaultPrivilegeGrant {
            params,
            status: ResourceStatus::default(),
        }
    }
}

impl Managed for DefaultPrivilegeGrant {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn set_condition(&mut self, condition: Condition) {
        self.status.set_condition(condition);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Resolves the grant's indirect `database`, `role`, and `owner` fields
/// into literals, in place.
///
/// Runs once per reconciliation pass, before any verb. Every present field
/// is round-tripped through the resolver, literals included, so the
/// collaborator remains the single authority on names; errors are wrapped
/// naming the field that failed.
pub async fn resolve_references(
    grant: &mut DefaultPrivilegeGrant,
    resolver: &dyn ReferenceResolver,
) -> Result<(), ReconcileError> {
    resolve_field(
        &mut grant.params.database,
        "database",
        ReferenceKind::Database,
        resolver,
    )
    .await?;
    resolve_field(&mut grant.params.role, "role", ReferenceKind::Role, resolver).await?;
    resolve_field(
        &mut grant.params.owner,
        "owner",
        ReferenceKind::Role,
        resolver,
    )
    .await?;
    Ok(())
}

async fn resolve_field(
    field: &mut Option<NameRef>,
    name: &'static str,
    to: ReferenceKind,
    resolver: &dyn ReferenceResolver,
) -> Result<(), ReconcileError> {
    if let Some(value) = field {
        let response = resolver
            .resolve(ResolutionRequest {
                value: value.clone(),
                to,
            })
            .await
            .map_err(|source| ReconcileError::ResolveReference {
                field: name,
                source,
            })?;
        *field = Some(NameRef::Literal(response.resolved));
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::{Privilege, Privileges};

    #[test]
    fn test_privilege_allow_list() {
        for token in ["SELECT", "INSERT", "UPDATE", "DELETE", "ALL"] {
            assert!(Privilege::new(token).is_ok(), "{token} must be accepted");
        }
        for token in ["", "select", "Select", "ALL PRIVILEGES", "A;DROP", "A B"] {
            assert!(Privilege::new(token).is_err(), "{token:?} must be rejected");
        }
    }

    #[test]
    fn test_privilege_clause() {
        let privileges: Privileges = ["SELECT", "INSERT"]
            .iter()
            .map(|t| Privilege::new(*t).unwrap())
            .collect();
        assert_eq!(privileges.to_clause(), "SELECT,INSERT");
    }
}
