//! JSON path: parse and pass through. Shape problems that serde tolerates
//! (blank titles, unknown hierarchy types) are left for the validator.

use crate::error::IngestError;
use crate::parsed::ParsedFramework;

/// Parse JSON text into the canonical tree.
pub fn parse(text: &str) -> Result<ParsedFramework, IngestError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_example() {
        let parsed = parse(
            r#"{"name":"Test FW","hierarchy":{"type":"two_level","level1_name":"Category",
                "level2_name":"Control"},"structure":[{"title":"C1","items":[
                {"title":"Ctrl1"},{"title":"Ctrl2"}]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.name, "Test FW");
        assert_eq!(parsed.leaf_count(), 2);
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let err = parse(r#"{"name":"X","structure":42}"#).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput(_)));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(parse("[1,2,3]").is_err());
        assert!(parse("").is_err());
    }
}
