// Input validation utilities
//
// Shape checks only. Anything that needs to reach the filesystem or a database lives in
// `api::preflight`.

use std::collections::HashMap;

use crate::errors::{ValidationError, ValidationReason};

pub const MAX_SITE_NAME_LEN: usize = 100;

/// Trimmed value of a required field.
pub fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ValidationError::new(field, ValidationReason::Required));
    }
    Ok(v)
}

pub fn validate_site_name(name: &str) -> Result<String, ValidationError> {
    let name = require("SiteName", name)?;
    if name.chars().count() > MAX_SITE_NAME_LEN {
        return Err(ValidationError::new("SiteName", ValidationReason::TooLong));
    }
    Ok(name.to_string())
}

/// Connection strings are provider-specific; before the reachability check the only rule is
/// that one was supplied.
pub fn validate_connection_string(conn_str: &str) -> Result<(), ValidationError> {
    require("ConnectionString", conn_str).map(|_| ())
}

/// True for `scheme://...` connection strings.
pub fn is_url_style(conn_str: &str) -> bool {
    conn_str.trim().contains("://")
}

/// Parse an ADO-style `Key=Value;Key=Value` string into lowercase, space-free keys.
///
/// `User Id`, `user_id` and `UserID` all become `userid`.
pub fn parse_ado_pairs(conn_str: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for seg in conn_str.split(';') {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        let (k, v) = seg
            .split_once('=')
            .map(|(k, v)| (k, v.trim().to_string()))
            .unwrap_or((seg, String::new()));
        let key = k.trim().to_ascii_lowercase().replace([' ', '_'], "");
        if !key.is_empty() {
            map.insert(key, v);
        }
    }
    map
}

/// First present key out of a list of synonyms.
pub fn ado_value<'a>(pairs: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| pairs.get(*k))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_site_name_is_required() {
        let err = validate_site_name("   ").unwrap_err();
        assert_eq!(err.field, "SiteName");
        assert_eq!(err.reason, ValidationReason::Required);
    }

    #[test]
    fn site_name_is_trimmed_and_bounded() {
        assert_eq!(validate_site_name("  Acceptance tests ").unwrap(), "Acceptance tests");
        let long = "x".repeat(MAX_SITE_NAME_LEN + 1);
        assert_eq!(
            validate_site_name(&long).unwrap_err().reason,
            ValidationReason::TooLong
        );
    }

    #[test]
    fn any_non_empty_connection_string_passes_shape_check() {
        assert!(validate_connection_string(r"Server=(LocalDB)\v11.0;Integrated Security=true;").is_ok());
        assert!(validate_connection_string("not really a connection string").is_ok());
        assert!(validate_connection_string("").is_err());
    }

    #[test]
    fn ado_pairs_normalize_keys() {
        let pairs = parse_ado_pairs("Server=db;User Id=wiki;Initial Catalog=roadkill;Pooling;");
        assert_eq!(ado_value(&pairs, &["server", "host"]), Some("db"));
        assert_eq!(ado_value(&pairs, &["uid", "userid"]), Some("wiki"));
        assert_eq!(
            ado_value(&pairs, &["database", "initialcatalog"]),
            Some("roadkill")
        );
        assert_eq!(ado_value(&pairs, &["pooling"]), None);
    }

    #[test]
    fn url_style_detection() {
        assert!(is_url_style("postgres://u@h/db"));
        assert!(!is_url_style("Host=h;Database=db"));
    }
}
