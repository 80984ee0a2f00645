//! ABAC condition grammar: parsing and evaluation of the `ConditionNode`
//! tree stored as JSON on `domain::abac::Policy::conditions` and
//! `domain::rbac::PermissionGrant::conditions` (spec.md §4.6).

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

/// A boolean expression tree over the attribute context built by the
/// authorization engine. `script` conditions are deliberately not a
/// variant here: a policy whose stored JSON carries a `script` key is
/// rejected at write time rather than ever reaching evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    All { all: Vec<ConditionNode> },
    Any { any: Vec<ConditionNode> },
    Not { not: Box<ConditionNode> },
    Predicate {
        var: String,
        op: String,
        #[serde(default)]
        value: Value,
    },
}

/// Attribute context the predicate operators read from: `subject.*`,
/// `resource.*`, `request.*`, `env.*` keys.
pub type Context = HashMap<String, Value>;

/// True if the raw condition JSON contains a `script` key anywhere at the
/// top level of a predicate node — used to reject script-based conditions
/// at policy creation time rather than silently ignoring them.
pub fn contains_script_predicate(raw: &Value) -> bool {
    match raw {
        Value::Object(map) => {
            if map.contains_key("script") {
                return true;
            }
            map.values().any(contains_script_predicate)
        }
        Value::Array(items) => items.iter().any(contains_script_predicate),
        _ => false,
    }
}

fn value_to_vec(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(v) => v.clone(),
        _ => vec![value.clone()],
    }
}

fn compare_numbers(left: &Value, right: &Value, op: &str) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => match op {
            "gt" => a > b,
            "gte" => a >= b,
            "lt" => a < b,
            "lte" => a <= b,
            _ => false,
        },
        _ => false,
    }
}

fn parse_time_hhmm(raw: &str) -> Option<(u32, u32)> {
    let (h, m) = raw.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

pub fn eval_predicate(var: &str, op: &str, expected: &Value, ctx: &Context) -> bool {
    let left = match ctx.get(var) {
        Some(v) => v,
        None => return op == "exists" && expected == &json!(false),
    };

    match op {
        "exists" => expected.as_bool().unwrap_or(true),
        "eq" => left == expected,
        "neq" => left != expected,
        "contains" => match left {
            Value::Array(arr) => arr.contains(expected),
            Value::String(s) => expected.as_str().map(|needle| s.contains(needle)).unwrap_or(false),
            _ => false,
        },
        "starts_with" => left.as_str().and_then(|s| expected.as_str().map(|p| s.starts_with(p))).unwrap_or(false),
        "in" => value_to_vec(expected).contains(left),
        "not_in" => !value_to_vec(expected).contains(left),
        "gt" | "gte" | "lt" | "lte" => compare_numbers(left, expected, op),
        "ip_in_cidr" => {
            let ip = left.as_str().and_then(|raw| IpAddr::from_str(raw).ok());
            let cidr = expected.as_str().unwrap_or_default();
            let Some((base, prefix)) = cidr.split_once('/') else { return false };
            let (Ok(base_ip), Ok(prefix_len)) = (IpAddr::from_str(base), prefix.parse::<u8>()) else { return false };
            match (ip, base_ip) {
                (Some(IpAddr::V4(ipv4)), IpAddr::V4(basev4)) if prefix_len <= 32 => {
                    let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
                    (u32::from(ipv4) & mask) == (u32::from(basev4) & mask)
                }
                _ => false,
            }
        }
        "time_between" => {
            let raw = expected.as_str().unwrap_or_default();
            let Some((start_raw, end_raw)) = raw.split_once('-') else { return false };
            let (Some((start_h, start_m)), Some((end_h, end_m))) =
                (parse_time_hhmm(start_raw), parse_time_hhmm(end_raw))
            else {
                return false;
            };
            let current_hour = left.as_u64().unwrap_or(0) as u32;
            let start = start_h * 60 + start_m;
            let end = end_h * 60 + end_m;
            let now_minutes = current_hour * 60;
            if start <= end {
                now_minutes >= start && now_minutes <= end
            } else {
                now_minutes >= start || now_minutes <= end
            }
        }
        _ => false,
    }
}

pub fn eval_condition(node: &ConditionNode, ctx: &Context) -> bool {
    match node {
        ConditionNode::All { all } => all.iter().all(|n| eval_condition(n, ctx)),
        ConditionNode::Any { any } => any.iter().any(|n| eval_condition(n, ctx)),
        ConditionNode::Not { not } => !eval_condition(not, ctx),
        ConditionNode::Predicate { var, op, value } => eval_predicate(var, op, value, ctx),
    }
}

/// Parse and evaluate a raw condition tree. Unparseable JSON (including a
/// rejected `script` predicate that slipped through at write time) fails
/// closed: the condition does not match.
pub fn eval_raw_condition(raw: &Value, ctx: &Context) -> bool {
    match serde_json::from_value::<ConditionNode>(raw.clone()) {
        Ok(node) => eval_condition(&node, ctx),
        Err(_) => false,
    }
}
