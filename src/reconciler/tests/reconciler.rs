// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Drives the four reconciliation verbs against scripted handles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use defacl_controller_types::{
    Condition, ConditionStatus, ConditionType, ExternalClient, Managed, NameRef, ObjectRef,
    ReferenceResolver, ResolutionRequest, ResolutionResponse, ResolveError,
};
use defacl_postgres_util::{Handle, PostgresError, Query};
use defacl_reconciler::{
    DefaultPrivilegeClient, DefaultPrivilegeGrant, GrantParameters, Privilege, Privileges,
    ReconcileError, resolve_references,
};
use tokio_postgres::types::Oid;

/// A handle that answers scans from a script and records every transaction
/// it is asked to execute.
#[derive(Debug, Default)]
struct MockHandle {
    bools: Mutex<VecDeque<bool>>,
    oids: Mutex<VecDeque<Option<Oid>>>,
    scans: Mutex<Vec<String>>,
    transactions: Mutex<Vec<Vec<String>>>,
    fail_scan: Mutex<bool>,
    fail_exec: Mutex<bool>,
}

impl MockHandle {
    fn with_oids(self, oids: impl IntoIterator<Item = Option<Oid>>) -> Self {
        self.oids.lock().unwrap().extend(oids);
        self
    }

    fn with_bools(self, bools: impl IntoIterator<Item = bool>) -> Self {
        self.bools.lock().unwrap().extend(bools);
        self
    }

    fn failing_scan(self) -> Self {
        *self.fail_scan.lock().unwrap() = true;
        self
    }

    fn failing_exec(self) -> Self {
        *self.fail_exec.lock().unwrap() = true;
        self
    }

    fn transactions(&self) -> Vec<Vec<String>> {
        self.transactions.lock().unwrap().clone()
    }

    fn scans(&self) -> Vec<String> {
        self.scans.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handle for MockHandle {
    async fn scan_bool(&self, query: &Query) -> Result<bool, PostgresError> {
        self.scans.lock().unwrap().push(query.sql().to_owned());
        if *self.fail_scan.lock().unwrap() {
            return Err(PostgresError::Generic(anyhow::anyhow!("boom")));
        }
        let result = self.bools.lock().unwrap().pop_front();
        Ok(result.expect("unexpected scan_bool"))
    }

    async fn scan_oid(&self, query: &Query) -> Result<Option<Oid>, PostgresError> {
        self.scans.lock().unwrap().push(query.sql().to_owned());
        let result = self.oids.lock().unwrap().pop_front();
        Ok(result.expect("unexpected scan_oid"))
    }

    async fn exec_tx(&self, queries: &[Query]) -> Result<(), PostgresError> {
        if *self.fail_exec.lock().unwrap() {
            return Err(PostgresError::Generic(anyhow::anyhow!("boom")));
        }
        self.transactions
            .lock()
            .unwrap()
            .push(queries.iter().map(|q| q.sql().to_owned()).collect());
        Ok(())
    }
}

/// A declared object of some other kind, for wrong-kind routing tests.
#[derive(Debug, Default)]
struct SomethingElse;

impl Managed for SomethingElse {
    fn kind(&self) -> &'static str {
        "SomethingElse"
    }

    fn set_condition(&mut self, _condition: Condition) {}

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

struct Harness {
    client: DefaultPrivilegeClient<Arc<MockHandle>>,
    identity: Arc<MockHandle>,
    target: Arc<MockHandle>,
}

fn harness(identity: MockHandle, target: MockHandle) -> Harness {
    let identity = Arc::new(identity);
    let target = Arc::new(target);
    Harness {
        client: DefaultPrivilegeClient::new(Arc::clone(&identity), Arc::clone(&target), "orders"),
        identity,
        target,
    }
}

fn grant() -> DefaultPrivilegeGrant {
    DefaultPrivilegeGrant::new(GrantParameters {
        role: Some(NameRef::Literal("reporting".into())),
        owner: Some(NameRef::Literal("app".into())),
        schema: Some("public".into()),
        database: Some(NameRef::Literal("orders".into())),
        privileges: Privileges::new(vec![Privilege::new("ALL").unwrap()]),
    })
}

fn ready_reason(grant: &DefaultPrivilegeGrant) -> Option<&str> {
    grant
        .status
        .condition(ConditionType::Ready)
        .map(|c| c.reason.as_str())
}

const INSTALL_SEQUENCE: [&str; 3] = [
    r#"SET ROLE "app""#,
    r#"ALTER DEFAULT PRIVILEGES FOR ROLE "app" IN SCHEMA "public" REVOKE ALL ON TABLES FROM "reporting""#,
    r#"ALTER DEFAULT PRIVILEGES FOR ROLE "app" IN SCHEMA "public" GRANT ALL ON TABLES TO "reporting""#,
];

#[tokio::test]
async fn observe_reports_missing_grant() {
    let h = harness(
        MockHandle::default().with_oids([Some(11), Some(7)]),
        MockHandle::default().with_bools([false]),
    );
    let mut grant = grant();

    let observation = h.client.observe(&mut grant).await.unwrap();

    assert!(!observation.resource_exists);
    assert!(!observation.resource_up_to_date);
    // Absence is not a fault and must not touch the status.
    assert_eq!(ready_reason(&grant), None);
}

#[tokio::test]
async fn observe_reports_existing_grant_as_synced() {
    let h = harness(
        MockHandle::default().with_oids([Some(11), Some(7)]),
        MockHandle::default().with_bools([true]),
    );
    let mut grant = grant();

    let observation = h.client.observe(&mut grant).await.unwrap();

    assert!(observation.resource_exists);
    assert!(observation.resource_up_to_date);
    assert!(!observation.resource_late_initialized);
    let ready = grant.status.condition(ConditionType::Ready).unwrap();
    assert_eq!(ready.status, ConditionStatus::True);
    assert_eq!(ready.reason, "Available");
}

#[tokio::test]
async fn observe_routes_probes_to_the_right_handles() {
    let h = harness(
        MockHandle::default().with_oids([Some(11), Some(7)]),
        MockHandle::default().with_bools([true]),
    );
    let mut grant = grant();

    h.client.observe(&mut grant).await.unwrap();

    // Role lookups are cluster-wide; the ACL probe is per-database.
    let identity_scans = h.identity.scans();
    assert_eq!(identity_scans.len(), 2);
    assert!(identity_scans.iter().all(|sql| sql.contains("pg_roles")));
    let target_scans = h.target.scans();
    assert_eq!(target_scans.len(), 1);
    assert!(target_scans[0].contains("pg_default_acl"));
}

#[tokio::test]
async fn observe_requires_resolved_role_and_owner() {
    let h = harness(MockHandle::default(), MockHandle::default());

    let mut no_role = grant();
    no_role.params.role = None;
    assert!(matches!(
        h.client.observe(&mut no_role).await,
        Err(ReconcileError::NoRole)
    ));

    let mut no_owner = grant();
    no_owner.params.owner = None;
    assert!(matches!(
        h.client.observe(&mut no_owner).await,
        Err(ReconcileError::NoOwner)
    ));

    // Validation fails before any probe is issued.
    assert!(h.identity.scans().is_empty());
}

#[tokio::test]
async fn observe_names_the_role_that_failed_to_resolve() {
    let h = harness(
        MockHandle::default().with_oids([Some(11), None]),
        MockHandle::default(),
    );
    let mut grant = grant();

    let err = h.client.observe(&mut grant).await.unwrap_err();
    match err {
        ReconcileError::SelectRoleId { role, source } => {
            assert_eq!(role, "app");
            assert!(matches!(source, PostgresError::RoleNotFound { .. }));
        }
        other => panic!("expected SelectRoleId, got {other:?}"),
    }
}

#[tokio::test]
async fn observe_wraps_probe_errors() {
    let h = harness(
        MockHandle::default().with_oids([Some(11), Some(7)]),
        MockHandle::default().failing_scan(),
    );
    let mut grant = grant();

    let err = h.client.observe(&mut grant).await.unwrap_err();
    assert!(matches!(err, ReconcileError::SelectDefaultPrivileges(_)));
    assert!(err
        .to_string()
        .starts_with("cannot select default privileges"));
}

#[tokio::test]
async fn create_installs_grant_in_one_transaction() {
    let h = harness(MockHandle::default(), MockHandle::default());
    let mut grant = grant();

    h.client.create(&mut grant).await.unwrap();

    assert_eq!(
        h.target.transactions(),
        vec![INSTALL_SEQUENCE.map(String::from).to_vec()]
    );
    assert!(h.identity.transactions().is_empty());
    assert_eq!(ready_reason(&grant), Some("Creating"));
}

#[tokio::test]
async fn create_is_idempotent() {
    let h = harness(MockHandle::default(), MockHandle::default());
    let mut grant = grant();

    h.client.create(&mut grant).await.unwrap();
    h.client.create(&mut grant).await.unwrap();

    let transactions = h.target.transactions();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0], transactions[1]);
}

#[tokio::test]
async fn create_validates_before_building_statements() {
    let h = harness(MockHandle::default(), MockHandle::default());

    let cases: Vec<(Box<dyn Fn(&mut DefaultPrivilegeGrant)>, &str)> = vec![
        (Box::new(|g| g.params.role = None), "role"),
        (Box::new(|g| g.params.owner = None), "owner"),
        (Box::new(|g| g.params.schema = None), "schema"),
        (
            Box::new(|g| g.params.privileges = Privileges::default()),
            "privileges",
        ),
    ];
    for (strip, field) in cases {
        let mut grant = grant();
        strip(&mut grant);
        let err = h.client.create(&mut grant).await.unwrap_err();
        assert!(
            matches!(
                err,
                ReconcileError::NoRole
                    | ReconcileError::NoOwner
                    | ReconcileError::NoSchema
                    | ReconcileError::NoPrivileges
            ),
            "missing {field} must be a validation error, got {err:?}"
        );
    }

    assert!(h.target.transactions().is_empty());
}

#[tokio::test]
async fn create_wraps_execution_errors() {
    let h = harness(MockHandle::default(), MockHandle::default().failing_exec());
    let mut grant = grant();

    let err = h.client.create(&mut grant).await.unwrap_err();
    assert!(matches!(err, ReconcileError::CreateDefaultPrivileges(_)));
    assert!(err
        .to_string()
        .starts_with("cannot create default privileges"));
}

#[tokio::test]
async fn update_is_a_noop() {
    let h = harness(MockHandle::default(), MockHandle::default());
    let mut grant = grant();

    h.client.update(&mut grant).await.unwrap();

    assert!(h.identity.scans().is_empty());
    assert!(h.target.transactions().is_empty());
}

#[tokio::test]
async fn delete_short_circuits_when_database_is_gone() {
    let h = harness(
        MockHandle::default().with_bools([false]),
        MockHandle::default(),
    );
    let mut grant = grant();

    h.client.delete(&mut grant).await.unwrap();

    // The database's disappearance already achieves the desired end state.
    assert!(h.target.transactions().is_empty());
    assert_eq!(ready_reason(&grant), Some("Deleting"));
}

#[tokio::test]
async fn delete_revokes_in_one_transaction() {
    let h = harness(
        MockHandle::default().with_bools([true]),
        MockHandle::default(),
    );
    let mut grant = grant();

    h.client.delete(&mut grant).await.unwrap();

    assert_eq!(
        h.target.transactions(),
        vec![vec![
            r#"SET ROLE "app""#.to_owned(),
            r#"ALTER DEFAULT PRIVILEGES FOR ROLE "app" IN SCHEMA "public" REVOKE ALL ON TABLES FROM "reporting""#
                .to_owned(),
        ]]
    );
    assert!(h.identity.scans()[0].contains("pg_database"));
}

#[tokio::test]
async fn delete_wraps_execution_errors() {
    let h = harness(
        MockHandle::default().with_bools([true]),
        MockHandle::default().failing_exec(),
    );
    let mut grant = grant();

    let err = h.client.delete(&mut grant).await.unwrap_err();
    assert!(matches!(err, ReconcileError::RevokeDefaultPrivileges(_)));
    assert!(err
        .to_string()
        .starts_with("cannot revoke default privileges"));
}

#[tokio::test]
async fn every_verb_rejects_foreign_kinds() {
    let h = harness(MockHandle::default(), MockHandle::default());
    let mut other = SomethingElse;

    assert!(matches!(
        h.client.observe(&mut other).await,
        Err(ReconcileError::WrongKind)
    ));
    assert!(matches!(
        h.client.create(&mut other).await,
        Err(ReconcileError::WrongKind)
    ));
    assert!(matches!(
        h.client.update(&mut other).await,
        Err(ReconcileError::WrongKind)
    ));
    assert!(matches!(
        h.client.delete(&mut other).await,
        Err(ReconcileError::WrongKind)
    ));
}

/// A resolver that maps references by name and passes literals through.
#[derive(Debug, Default)]
struct StaticResolver {
    fail_on: Option<&'static str>,
}

#[async_trait]
impl ReferenceResolver for StaticResolver {
    async fn resolve(
        &self,
        request: ResolutionRequest,
    ) -> Result<ResolutionResponse, ResolveError> {
        match request.value {
            NameRef::Literal(name) => Ok(ResolutionResponse {
                resolved: name,
                reference: None,
            }),
            NameRef::Reference(reference) => {
                if Some(reference.name.as_str()) == self.fail_on {
                    return Err(ResolveError::NoMatch {
                        kind: request.to,
                        reference: reference.name,
                    });
                }
                Ok(ResolutionResponse {
                    resolved: format!("{}-resolved", reference.name),
                    reference: Some(reference),
                })
            }
            NameRef::Selector(_) => Err(ResolveError::Generic(anyhow::anyhow!(
                "selector resolution not scripted"
            ))),
        }
    }
}

#[tokio::test]
async fn resolve_references_fills_in_literals() {
    let mut grant = grant();
    grant.params.database = Some(NameRef::Reference(ObjectRef {
        name: "orders-db".into(),
    }));
    grant.params.owner = Some(NameRef::Reference(ObjectRef { name: "app".into() }));

    resolve_references(&mut grant, &StaticResolver::default())
        .await
        .unwrap();

    assert_eq!(grant.params.database(), Some("orders-db-resolved"));
    assert_eq!(grant.params.owner(), Some("app-resolved"));
    // Literals survive the round trip through the resolver.
    assert_eq!(grant.params.role(), Some("reporting"));
}

#[tokio::test]
async fn resolve_references_names_the_failing_field() {
    let mut grant = grant();
    grant.params.database = Some(NameRef::Reference(ObjectRef {
        name: "missing-db".into(),
    }));
    let resolver = StaticResolver {
        fail_on: Some("missing-db"),
    };

    let err = resolve_references(&mut grant, &resolver).await.unwrap_err();
    match err {
        ReconcileError::ResolveReference { field, .. } => assert_eq!(field, "database"),
        other => panic!("expected ResolveReference, got {other:?}"),
    }
}
