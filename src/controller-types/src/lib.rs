// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The boundary contract between the control-plane framework and a
//! reconciler.
//!
//! The framework schedules reconciliation, persists status, and retries
//! with backoff; a reconciler implements the four verbs of
//! [`ExternalClient`] against a declared object and nothing else. These
//! types carry no database dependency so that the contract stays usable
//! from either side.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

mod conditions;
mod reference;

pub use conditions::{Condition, ConditionStatus, ConditionType, ResourceStatus};
pub use reference::{
    LabelSelector, NameRef, ObjectRef, ReferenceKind, ReferenceResolver, ResolutionRequest,
    ResolutionResponse, ResolveError,
};

/// Fan-out bound the host framework applies to this controller: at most
/// this many distinct declared objects reconcile in parallel, and the same
/// object is never reconciled concurrently with itself.
pub const MAX_CONCURRENT_RECONCILES: usize = 5;

/// A declared object as handed to a reconciler by the host framework.
///
/// The framework routes objects dynamically, so a reconciler must be able
/// to recognize its own kind and reject anything else with a typed error;
/// `as_any_mut` is the downcast seam for that check.
pub trait Managed: Any + fmt::Debug + Send {
    /// The declared kind, for wrong-kind diagnostics.
    fn kind(&self) -> &'static str;

    /// Records a status condition, replacing any existing condition of the
    /// same type.
    fn set_condition(&mut self, condition: Condition);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a reconciler learned about the external state of a declared object.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Whether the external resource exists at all.
    pub resource_exists: bool,
    /// Whether the external resource matches the declaration. Meaningless
    /// unless `resource_exists`.
    pub resource_up_to_date: bool,
    /// Whether observing filled in declaration fields the user left unset.
    pub resource_late_initialized: bool,
}

/// Result of a successful create. Carries nothing today; connection details
/// would travel here if the resource produced any.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Creation;

/// Result of a successful update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Update;

/// The four verbs the host framework drives a reconciler with.
///
/// The framework calls verbs sequentially for any one object: `observe`
/// first, then `create` when the resource does not exist, `update` when it
/// exists but is not up to date, and `delete` when the declaration is being
/// removed. Errors are returned to the framework for requeue; no verb
/// retries internally.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Compares the declared state against external reality.
    async fn observe(&self, mg: &mut dyn Managed) -> Result<Observation, Self::Error>;

    /// Makes the external resource exist as declared.
    async fn create(&self, mg: &mut dyn Managed) -> Result<Creation, Self::Error>;

    /// Converges an existing external resource onto the declaration.
    async fn update(&self, mg: &mut dyn Managed) -> Result<Update, Self::Error>;

    /// Removes the external resource.
    async fn delete(&self, mg: &mut dyn Managed) -> Result<(), Self::Error>;
}
