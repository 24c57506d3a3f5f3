// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Cross-object reference resolution.
//!
//! A declared object may name a collaborator either directly or through a
//! reference to another declared object. The reconciler core only issues
//! [`ResolutionRequest`]s and merges the resolved literal back; the lookup,
//! selector matching, and caching all live behind [`ReferenceResolver`],
//! which the host environment implements.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A field that names another object, either as a usable literal or as an
/// indirection that must be resolved before the core runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameRef {
    /// A concrete name, usable as-is.
    Literal(String),
    /// A direct reference to another declared object.
    Reference(ObjectRef),
    /// A label selector expected to match exactly one declared object.
    Selector(LabelSelector),
}

impl NameRef {
    /// The concrete name, if this field has one.
    pub fn literal(&self) -> Option<&str> {
        match self {
            NameRef::Literal(name) => Some(name),
            NameRef::Reference(_) | NameRef::Selector(_) => None,
        }
    }
}

/// A direct reference to another declared object by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub name: String,
}

/// Selects a declared object by its labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// The declared kind a reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Role,
    Database,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Role => "Role",
            ReferenceKind::Database => "Database",
        })
    }
}

/// One field's worth of resolution work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub value: NameRef,
    pub to: ReferenceKind,
}

/// The collaborator's answer: a concrete name, plus the reference it
/// matched when the request was indirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResponse {
    pub resolved: String,
    pub reference: Option<ObjectRef>,
}

/// An error resolving a reference.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The reference or selector matched no declared object.
    #[error("no {kind} matches {reference:?}")]
    NoMatch {
        kind: ReferenceKind,
        reference: String,
    },
    /// The collaborator failed internally.
    #[error(transparent)]
    Generic(#[from] anyhow::Error),
}

/// Resolves indirect references against the set of declared objects.
/// Implemented by the host environment; the core never looks anything up
/// itself.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, request: ResolutionRequest) -> Result<ResolutionResponse, ResolveError>;
}
