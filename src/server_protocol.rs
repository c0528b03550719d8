//! Request bodies and query strings, parsed leniently from raw JSON.
//!
//! Integer fields accept JSON integers, integral floats (`42.0`) and numeric
//! strings (`"42"`). Anything else is a validation error.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::coordinator::SessionFilter;
use crate::error::{ArenaError, ArenaResult};
use crate::session::SessionStatus;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuessRequest {
    pub guess: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FireRequest {
    pub row: i64,
    pub col: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub direction: String,
}

pub fn parse_register(raw: &str) -> ArenaResult<RegisterRequest> {
    let object = parse_object(raw)?;
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ArenaError::validation("name is required"))?;
    Ok(RegisterRequest {
        name: name.to_string(),
    })
}

pub fn parse_guess(raw: &str) -> ArenaResult<GuessRequest> {
    let object = parse_object(raw)?;
    let guess = required_integer(&object, "guess")
        .ok_or_else(|| ArenaError::validation("guess must be an integer between 1 and 100"))?;
    Ok(GuessRequest { guess })
}

pub fn parse_fire(raw: &str) -> ArenaResult<FireRequest> {
    let object = parse_object(raw)?;
    let coords = required_integer(&object, "row").zip(required_integer(&object, "col"));
    let (row, col) =
        coords.ok_or_else(|| ArenaError::validation("row and col must be integers 0-9"))?;
    Ok(FireRequest { row, col })
}

pub fn parse_move(raw: &str) -> ArenaResult<MoveRequest> {
    let object = parse_object(raw)?;
    let direction = object
        .get("direction")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ArenaError::validation("direction must be \"north\", \"south\", \"east\", or \"west\"")
        })?;
    Ok(MoveRequest {
        direction: direction.to_string(),
    })
}

/// `?agentId=...&status=...` for session listings. Empty values are ignored.
pub fn parse_list_query(query: &HashMap<String, String>) -> ArenaResult<SessionFilter> {
    let agent_id = query
        .get("agentId")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let status = match query.get("status").map(|value| value.trim()) {
        None | Some("") => None,
        Some(raw) => Some(
            SessionStatus::parse(raw)
                .ok_or_else(|| ArenaError::validation("status must be \"active\" or \"won\""))?,
        ),
    };
    Ok(SessionFilter { agent_id, status })
}

fn parse_object(raw: &str) -> ArenaResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(ArenaError::validation("invalid JSON body")),
    }
}

fn required_integer(object: &Map<String, Value>, key: &str) -> Option<i64> {
    parse_integer(object.get(key)?)
}

fn parse_integer(value: &Value) -> Option<i64> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok();
    }
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number.fract() != 0.0 || number.abs() > MAX_SAFE_INTEGER_F64 {
        return None;
    }
    Some(number as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_accepts_integral_numbers_and_numeric_strings() {
        assert_eq!(parse_guess(r#"{"guess":42}"#).ok(), Some(GuessRequest { guess: 42 }));
        assert_eq!(parse_guess(r#"{"guess":42.0}"#).ok(), Some(GuessRequest { guess: 42 }));
        assert_eq!(parse_guess(r#"{"guess":" 7 "}"#).ok(), Some(GuessRequest { guess: 7 }));
        assert_eq!(parse_guess(r#"{"guess":-3}"#).ok(), Some(GuessRequest { guess: -3 }));
    }

    #[test]
    fn guess_rejects_fractions_and_garbage() {
        for raw in [
            r#"{"guess":42.5}"#,
            r#"{"guess":"abc"}"#,
            r#"{"guess":null}"#,
            r#"{"guess":true}"#,
            r#"{}"#,
            r#"[42]"#,
            "not json",
        ] {
            assert!(
                matches!(parse_guess(raw), Err(ArenaError::Validation(_))),
                "raw={raw}"
            );
        }
    }

    #[test]
    fn fire_needs_both_coordinates() {
        assert_eq!(
            parse_fire(r#"{"row":3,"col":"4"}"#).ok(),
            Some(FireRequest { row: 3, col: 4 })
        );
        assert!(parse_fire(r#"{"row":3}"#).is_err());
        assert!(parse_fire(r#"{"row":3,"col":1.5}"#).is_err());
    }

    #[test]
    fn move_requires_a_string_direction() {
        assert_eq!(
            parse_move(r#"{"direction":"north"}"#).ok(),
            Some(MoveRequest {
                direction: "north".to_string()
            })
        );
        // Case is left to the engine, which only knows lowercase names.
        assert_eq!(
            parse_move(r#"{"direction":"North"}"#).ok(),
            Some(MoveRequest {
                direction: "North".to_string()
            })
        );
        assert!(parse_move(r#"{"direction":1}"#).is_err());
        assert!(parse_move(r#"{}"#).is_err());
    }

    #[test]
    fn register_requires_a_string_name() {
        assert_eq!(
            parse_register(r#"{"name":"HungryCat"}"#).ok(),
            Some(RegisterRequest {
                name: "HungryCat".to_string()
            })
        );
        assert!(parse_register(r#"{"name":5}"#).is_err());
        assert!(parse_register("").is_err());
    }

    #[test]
    fn list_query_parses_filters() {
        let mut query = HashMap::new();
        assert_eq!(parse_list_query(&query).ok(), Some(SessionFilter::default()));

        query.insert("agentId".to_string(), "a-1".to_string());
        query.insert("status".to_string(), "won".to_string());
        let filter = parse_list_query(&query).expect("filter");
        assert_eq!(filter.agent_id.as_deref(), Some("a-1"));
        assert_eq!(filter.status, Some(SessionStatus::Won));

        query.insert("status".to_string(), "lost".to_string());
        assert!(parse_list_query(&query).is_err());
    }
}
