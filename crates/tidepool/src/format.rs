//! Display formatting for captured diagnostic values.
//!
//! Structured values are rendered as pretty JSON; anything that cannot be
//! serialized (cycles, functions) degrades to its plain display form instead
//! of propagating an error.

use std::rc::Rc;

use crate::value::{Value, number_string};

/// Formats a value sequence the way one diagnostic line shows it: each value
/// stringified on its own, joined with single spaces.
pub fn format_values(values: &[Value<'_>]) -> String {
    values
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_value(value: &Value<'_>) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => match to_json(value, &mut Vec::new()) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| value.display_string()),
            Err(Cyclic) => value.display_string(),
        },
        other => other.display_string(),
    }
}

/// Marker for a reference cycle found during serialization.
struct Cyclic;

fn to_json(value: &Value<'_>, visiting: &mut Vec<usize>) -> Result<serde_json::Value, Cyclic> {
    Ok(match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(value) => serde_json::Value::Bool(*value),
        Value::Number(number) => json_number(*number),
        Value::Text(text) => serde_json::Value::String(text.to_string()),
        Value::Array(items) => {
            let address = Rc::as_ptr(items) as usize;
            if visiting.contains(&address) {
                return Err(Cyclic);
            }
            visiting.push(address);
            let serialized = items
                .borrow()
                .iter()
                .map(|item| to_json(item, visiting))
                .collect::<Result<Vec<_>, _>>()?;
            visiting.pop();
            serde_json::Value::Array(serialized)
        }
        Value::Object(members) => {
            let address = Rc::as_ptr(members) as usize;
            if visiting.contains(&address) {
                return Err(Cyclic);
            }
            visiting.push(address);
            let mut serialized = serde_json::Map::new();
            for (key, member) in members.borrow().iter() {
                serialized.insert(key.clone(), to_json(member, visiting)?);
            }
            visiting.pop();
            serde_json::Value::Object(serialized)
        }
        // Not serializable; keep the display form so the line stays readable.
        Value::Function(_) | Value::Native(_) | Value::Error(_) => {
            serde_json::Value::String(value.display_string())
        }
    })
}

fn json_number(number: f64) -> serde_json::Value {
    if number == number.trunc() && number.abs() < 9e15 {
        serde_json::Value::Number((number as i64).into())
    } else {
        serde_json::Number::from_f64(number)
            .map(serde_json::Value::Number)
            // NaN and infinities have no JSON form; fall back to their names.
            .unwrap_or_else(|| serde_json::Value::String(number_string(number)))
    }
}
