use crate::{CoreError, FieldType};

use std::str::FromStr;

#[test]
fn test_field_type_round_trip() {
    for s in ["text", "number", "date", "checkbox", "select"] {
        let parsed = FieldType::from_str(s).unwrap();
        assert_eq!(parsed.as_str(), s);
    }
}

#[test]
fn test_field_type_rejects_unknown() {
    let err = FieldType::from_str("dropdown").unwrap_err();
    assert!(matches!(err, CoreError::InvalidFieldType { .. }));
}
