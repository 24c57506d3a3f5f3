// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The dimension of an object's status a condition reports on. Only
/// readiness exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One entry in a declared object's status, persisted by the host
/// framework between reconciliation passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn new(status: ConditionStatus, reason: &str) -> Condition {
        Condition {
            condition_type: ConditionType::Ready,
            status,
            reason: reason.into(),
            last_transition_time: Utc::now(),
            message: None,
        }
    }

    /// The external resource exists and matches the declaration.
    pub fn available() -> Condition {
        Condition::new(ConditionStatus::True, "Available")
    }

    /// The external resource is being created.
    pub fn creating() -> Condition {
        Condition::new(ConditionStatus::False, "Creating")
    }

    /// The external resource is being deleted.
    pub fn deleting() -> Condition {
        Condition::new(ConditionStatus::False, "Deleting")
    }
}

/// The observed-state half of a declared object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ResourceStatus {
    /// Records `condition`, replacing any existing condition of the same
    /// type so the status never carries two entries for one dimension.
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    /// The current condition of the given type, if any has been recorded.
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}
