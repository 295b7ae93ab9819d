//! Schema boundary for oracle output
//!
//! The oracle is an unreliable text source: the decision object may be
//! wrapped in prose or a Markdown code fence, numbers may arrive as strings,
//! and any field may be missing or out of range. Everything downstream only
//! ever sees a [`Decision`] that passed these checks.

use super::{Action, Decision, Direction, ExitPlan, RiskAssessment};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// Oracle output that could not be turned into a [`Decision`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed decision: {reason}")]
pub struct MalformedDecision {
    pub reason: String,
}

impl MalformedDecision {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Parse raw oracle text into a [`Decision`]
pub fn parse_decision(raw: &str) -> Result<Decision, MalformedDecision> {
    let body = extract_json_object(raw)
        .ok_or_else(|| MalformedDecision::new("no JSON object in oracle output"))?;
    let value: Value = serde_json::from_str(body)
        .map_err(|e| MalformedDecision::new(format!("invalid JSON: {e}")))?;
    decision_from_value(&value)
}

/// Validate an already-decoded JSON value
pub fn decision_from_value(value: &Value) -> Result<Decision, MalformedDecision> {
    let obj = value
        .as_object()
        .ok_or_else(|| MalformedDecision::new("decision is not a JSON object"))?;

    let action = match required_str(obj, "action")?.as_str() {
        "buy" => Action::Buy,
        "sell" => Action::Sell,
        "hold" => Action::Hold,
        other => return Err(MalformedDecision::new(format!("unknown action `{other}`"))),
    };

    let direction = match optional_str(obj, "direction")?.as_deref() {
        Some("long") => Direction::Long,
        Some("short") => Direction::Short,
        Some("none") | Some("") => Direction::None,
        None if action == Action::Hold => Direction::None,
        None => return Err(MalformedDecision::new("missing field `direction`")),
        Some(other) => {
            return Err(MalformedDecision::new(format!(
                "unknown direction `{other}`"
            )))
        }
    };

    let confidence = match decimal_field(obj, "confidence")? {
        Some(c) => c,
        None if action == Action::Hold => dec!(0),
        None => return Err(MalformedDecision::new("missing field `confidence`")),
    };
    if confidence < dec!(0) || confidence > dec!(1) {
        return Err(MalformedDecision::new(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    let quantity = non_negative(obj, "quantity")?;
    let position_size_usdt = non_negative(obj, "position_size_usdt")?;

    let leverage = decimal_field(obj, "leverage")?;
    if let Some(lev) = leverage {
        if lev <= dec!(0) {
            return Err(MalformedDecision::new(format!(
                "leverage {lev} must be positive"
            )));
        }
    }

    let risk_assessment = match optional_str(obj, "risk_assessment")?.as_deref() {
        None | Some("") => RiskAssessment::default(),
        Some("low") => RiskAssessment::Low,
        Some("medium") => RiskAssessment::Medium,
        Some("high") => RiskAssessment::High,
        Some(other) => {
            return Err(MalformedDecision::new(format!(
                "unknown risk_assessment `{other}`"
            )))
        }
    };

    let justification = match obj.get("justification") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(MalformedDecision::new("`justification` is not a string")),
    };

    let exit_plan = match obj.get("exit_plan") {
        None | Some(Value::Null) => ExitPlan::default(),
        Some(Value::Object(plan)) => exit_plan_from(plan)?,
        Some(_) => return Err(MalformedDecision::new("`exit_plan` is not an object")),
    };

    Ok(Decision {
        action,
        direction,
        quantity,
        leverage,
        confidence,
        position_size_usdt,
        risk_assessment,
        justification,
        exit_plan,
    })
}

fn exit_plan_from(plan: &Map<String, Value>) -> Result<ExitPlan, MalformedDecision> {
    let profit_target = non_negative(plan, "profit_target")?;
    let stop_loss = non_negative(plan, "stop_loss")?;

    let mut invalidation_conditions = BTreeSet::new();
    match plan.get("invalidation_conditions") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => {
            if !s.trim().is_empty() {
                invalidation_conditions.insert(s.trim().to_string());
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let text = item.as_str().ok_or_else(|| {
                    MalformedDecision::new("invalidation condition is not a string")
                })?;
                if !text.trim().is_empty() {
                    invalidation_conditions.insert(text.trim().to_string());
                }
            }
        }
        Some(_) => {
            return Err(MalformedDecision::new(
                "`invalidation_conditions` is not a list",
            ))
        }
    }

    Ok(ExitPlan {
        profit_target,
        stop_loss,
        invalidation_conditions,
    })
}

/// Locate the outermost JSON object, skipping code fences and prose
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, MalformedDecision> {
    optional_str(obj, key)?.ok_or_else(|| MalformedDecision::new(format!("missing field `{key}`")))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, MalformedDecision> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_lowercase())),
        Some(_) => Err(MalformedDecision::new(format!("`{key}` is not a string"))),
    }
}

fn decimal_field(obj: &Map<String, Value>, key: &str) -> Result<Option<Decimal>, MalformedDecision> {
    let text = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().trim_start_matches('$').replace(',', ""),
        Some(_) => return Err(MalformedDecision::new(format!("`{key}` is not a number"))),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| MalformedDecision::new(format!("`{key}` is not a number: {text}")))
}

fn non_negative(obj: &Map<String, Value>, key: &str) -> Result<Decimal, MalformedDecision> {
    let value = decimal_field(obj, key)?.unwrap_or(dec!(0));
    if value < dec!(0) {
        return Err(MalformedDecision::new(format!("`{key}` is negative: {value}")));
    }
    Ok(value)
}
