// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative action conditions.
//!
//! A list of conditions holds only when every entry holds. Fields are dotted
//! paths resolved the same way templates resolve them.

use std::cmp::Ordering;

use leadwise_core::types::{Condition, ConditionOperator};
use serde_json::Value;

use crate::template::lookup;

/// True when all conditions hold against `payload`. An empty list holds.
pub fn all_hold(conditions: &[Condition], payload: &Value) -> bool {
    conditions.iter().all(|c| evaluate(c, payload))
}

/// Evaluates one condition.
///
/// A missing field is never equal to anything, so `ne` holds for it while
/// `eq`, `gt`, and `lt` do not.
pub fn evaluate(condition: &Condition, payload: &Value) -> bool {
    let actual = lookup(payload, &condition.field);
    match condition.operator {
        ConditionOperator::Eq => actual.is_some_and(|a| loosely_equal(a, &condition.value)),
        ConditionOperator::Ne => !actual.is_some_and(|a| loosely_equal(a, &condition.value)),
        ConditionOperator::Gt => {
            actual.and_then(|a| compare(a, &condition.value)) == Some(Ordering::Greater)
        }
        ConditionOperator::Lt => {
            actual.and_then(|a| compare(a, &condition.value)) == Some(Ordering::Less)
        }
    }
}

/// Equality that treats `1` and `1.0` as the same number.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Numbers compare numerically and strings lexically; mixed types do not compare.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
