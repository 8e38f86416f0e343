//! Typed extraction of tool arguments. Every failure names the offending field.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::HeaderValue;
use serde_json::{Map, Value};

use crate::environment::Environment;
use crate::error::ToolError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("email regex: {e}"))
});

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::String(_) => Err(ToolError::validation(
            key,
            format!("'{key}' must not be empty"),
        )),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

pub fn arg_string(args: &Map<String, Value>, key: &str, default: &str) -> Result<String, ToolError> {
    Ok(arg_optional_string(args, key)?.unwrap_or_else(|| default.to_string()))
}

pub fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

pub fn required_min_length(
    args: &Map<String, Value>,
    key: &str,
    min_chars: usize,
) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    if value.chars().count() < min_chars {
        return Err(ToolError::validation(
            key,
            format!("'{key}' must be at least {min_chars} characters"),
        ));
    }
    Ok(value)
}

pub fn required_email(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(ToolError::validation(
            key,
            format!("'{key}' must be a valid email address"),
        ));
    }
    Ok(value.trim().to_string())
}

pub fn arg_optional_url(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    let Some(value) = arg_optional_string(args, key)? else {
        return Ok(None);
    };
    match reqwest::Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(value.trim().to_string())),
        _ => Err(ToolError::validation(
            key,
            format!("'{key}' must be a valid http(s) URL"),
        )),
    }
}

/// Any non-empty string, percent-encoded so it lands in the URL as exactly one path segment.
pub fn required_path_segment(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    Ok(urlencoding::encode(&value).into_owned())
}

/// A string that will be forwarded verbatim as an HTTP header value.
pub fn required_header_value(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    if HeaderValue::from_str(&value).is_err() {
        return Err(ToolError::validation(
            key,
            format!("'{key}' contains characters not allowed in an HTTP header"),
        ));
    }
    Ok(value)
}

fn as_positive_f64(value: &Value, key: &str) -> Result<f64, ToolError> {
    match value.as_f64() {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n),
        Some(_) => Err(ToolError::validation(
            key,
            format!("'{key}' must be a positive number"),
        )),
        None => Err(ToolError::validation(key, format!("'{key}' must be a number"))),
    }
}

pub fn required_positive_f64(args: &Map<String, Value>, key: &str) -> Result<f64, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ToolError::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
        Some(value) => as_positive_f64(value, key),
    }
}

pub fn arg_positive_f64(args: &Map<String, Value>, key: &str, default: f64) -> Result<f64, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => as_positive_f64(value, key),
    }
}

pub fn arg_u64_in_range(
    args: &Map<String, Value>,
    key: &str,
    min: u64,
    max: u64,
    default: u64,
) -> Result<u64, ToolError> {
    let out_of_range =
        || ToolError::validation(key, format!("'{key}' must be an integer between {min} and {max}"));
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|n| (min..=max).contains(n))
            .ok_or_else(out_of_range),
        Some(_) => Err(out_of_range()),
    }
}

pub fn required_object(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Map<String, Value>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ToolError::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be an object"))),
    }
}

pub fn arg_optional_object(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_object(args, key).map(Some),
    }
}

pub fn required_object_array(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Vec<Map<String, Value>>, ToolError> {
    let items = match args.get(key) {
        None | Some(Value::Null) => {
            return Err(ToolError::validation(
                key,
                format!("Missing required field '{key}'"),
            ));
        }
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => {
            return Err(ToolError::validation(
                key,
                format!("'{key}' must contain at least one item"),
            ));
        }
        Some(_) => {
            return Err(ToolError::validation(
                key,
                format!("'{key}' must be an array of objects"),
            ));
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object().cloned().ok_or_else(|| {
                ToolError::validation(
                    &format!("{key}[{index}]"),
                    format!("'{key}' items must be objects"),
                )
            })
        })
        .collect()
}

/// Optional `environment` argument every tool accepts.
pub fn arg_environment(args: &Map<String, Value>) -> Result<Option<String>, ToolError> {
    let Some(raw) = arg_optional_string(args, "environment")? else {
        return Ok(None);
    };
    raw.parse::<Environment>()
        .map(|environment| Some(environment.as_str().to_string()))
        .map_err(|_| {
            ToolError::validation(
                "environment",
                "'environment' must be one of: development, staging, production",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_and_wrong_type_name_the_field() {
        let err = required_string(&args(json!({})), "xPayment").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("xPayment"));
        assert!(err.is_validation());

        let err = required_string(&args(json!({"xPayment": 7})), "xPayment").unwrap_err();
        assert_eq!(err.message, "'xPayment' must be a string");
    }

    #[test]
    fn email_format_is_checked() {
        assert_eq!(
            required_email(&args(json!({"email": "a@b.co"})), "email").unwrap(),
            "a@b.co"
        );
        assert!(required_email(&args(json!({"email": "not-an-email"})), "email").is_err());
        assert!(required_email(&args(json!({"email": "a b@c.io"})), "email").is_err());
    }

    #[test]
    fn url_must_be_http_or_https() {
        assert_eq!(
            arg_optional_url(&args(json!({"u": "https://x.io/cb"})), "u").unwrap(),
            Some("https://x.io/cb".to_string())
        );
        assert!(arg_optional_url(&args(json!({"u": "ftp://x.io"})), "u").is_err());
        assert!(arg_optional_url(&args(json!({"u": "nope"})), "u").is_err());
        assert_eq!(arg_optional_url(&args(json!({})), "u").unwrap(), None);
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(required_positive_f64(&args(json!({"amount": 0})), "amount").is_err());
        assert!(required_positive_f64(&args(json!({"amount": -1.5})), "amount").is_err());
        assert!(required_positive_f64(&args(json!({"amount": "5"})), "amount").is_err());
        assert_eq!(arg_positive_f64(&args(json!({})), "amount", 0.01).unwrap(), 0.01);
    }

    #[test]
    fn integer_range_applies_default_and_bounds() {
        assert_eq!(arg_u64_in_range(&args(json!({})), "limit", 1, 100, 20).unwrap(), 20);
        assert_eq!(
            arg_u64_in_range(&args(json!({"limit": 5})), "limit", 1, 100, 20).unwrap(),
            5
        );
        assert!(arg_u64_in_range(&args(json!({"limit": 0})), "limit", 1, 100, 20).is_err());
        assert!(arg_u64_in_range(&args(json!({"limit": 2.5})), "limit", 1, 100, 20).is_err());
    }

    #[test]
    fn path_segment_is_escaped_not_rejected() {
        assert_eq!(
            required_path_segment(&args(json!({"id": "payroll.2024-01"})), "id").unwrap(),
            "payroll.2024-01"
        );
        assert_eq!(
            required_path_segment(&args(json!({"id": "../admin x"})), "id").unwrap(),
            "..%2Fadmin%20x"
        );
        assert!(required_path_segment(&args(json!({"id": " "})), "id").is_err());
    }

    #[test]
    fn header_values_reject_line_breaks() {
        assert_eq!(
            required_header_value(&args(json!({"token": "x402-abc"})), "token").unwrap(),
            "x402-abc"
        );
        let err = required_header_value(&args(json!({"token": "tok\r\nX-Evil: 1"})), "token")
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field.as_deref(), Some("token"));
    }

    #[test]
    fn object_array_reports_item_index() {
        let err = required_object_array(&args(json!({"r": [{}, 3]})), "r").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("r[1]"));
        assert!(required_object_array(&args(json!({"r": []})), "r").is_err());
    }

    #[test]
    fn environment_is_normalized_or_rejected() {
        assert_eq!(
            arg_environment(&args(json!({"environment": "Production"}))).unwrap(),
            Some("production".to_string())
        );
        assert!(arg_environment(&args(json!({"environment": "prod"}))).is_err());
        assert_eq!(arg_environment(&args(json!({}))).unwrap(), None);
    }
}
