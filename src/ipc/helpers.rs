use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::ipc::error::HandlerErr;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// `None` when the key is absent; `Some(None)` when it is explicitly null or empty.
pub fn get_present_str(params: &serde_json::Value, key: &str) -> Option<Option<String>> {
    let v = params.get(key)?;
    Some(v.as_str().map(str::to_string).filter(|s| !s.is_empty()))
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{key} must be YYYY-MM-DD")))
}

/// Whole `params` object as a typed struct; `null` params read as the default.
pub fn parse_params<T: DeserializeOwned + Default>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn present_str_distinguishes_absent_from_cleared() {
        let p = json!({ "section": null, "search": "" , "className": "Grade 5" });
        assert_eq!(get_present_str(&p, "missing"), None);
        assert_eq!(get_present_str(&p, "section"), Some(None));
        assert_eq!(get_present_str(&p, "search"), Some(None));
        assert_eq!(get_present_str(&p, "className"), Some(Some("Grade 5".into())));
    }

    #[test]
    fn dates_are_iso() {
        assert!(parse_date("2025-03-04", "date").is_ok());
        assert_eq!(parse_date("04/03/2025", "date").map_err(|e| e.code).err(), Some("bad_params"));
    }
}
