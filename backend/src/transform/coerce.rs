//! Type coercion of raw cells according to a property's declared type.

use crate::config::ImportConfiguration;
use crate::models::{PropertyType, PropertyValue, ValueType};
use crate::parser::{remove_quotes, split_multivalue, strip_delimiters};

/// The cell text does not parse as the declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub expected: String,
}

/// Coerce a trimmed cell to the property's declared type.
///
/// Returns `Ok(None)` for value types the importer does not handle; such
/// properties are left out of the update.
pub fn coerce(
    raw: &str,
    property_type: &PropertyType,
    config: &ImportConfiguration,
) -> Result<Option<PropertyValue>, CoercionError> {
    let value_type = property_type.value_type();
    let value = match &value_type {
        textual if textual.is_textual() && property_type.is_multivalued() => {
            PropertyValue::Strings(coerce_multivalue(raw, config))
        }
        textual if textual.is_textual() => {
            PropertyValue::String(remove_quotes(raw).to_string())
        }
        ValueType::Boolean => PropertyValue::Boolean(parse_boolean(raw).ok_or_else(|| {
            CoercionError {
                expected: value_type.id().to_string(),
            }
        })?),
        ValueType::Integer => PropertyValue::Integer(raw.parse::<i32>().map_err(|_| {
            CoercionError {
                expected: value_type.id().to_string(),
            }
        })?),
        ValueType::Other(_) => return Ok(None),
        ValueType::String | ValueType::Email => unreachable!("textual types handled above"),
    };
    Ok(Some(value))
}

/// Quotes are only removed when a delimiter pair is configured.
fn coerce_multivalue(raw: &str, config: &ImportConfiguration) -> Vec<String> {
    match config.delimiter_pair() {
        Some(pair) => {
            let stripped = strip_delimiters(raw, pair);
            split_multivalue(remove_quotes(&stripped), &config.multi_value_separator)
        }
        None => split_multivalue(raw, &config.multi_value_separator),
    }
}

/// `true` / `false`, ASCII case-insensitive.
pub fn parse_boolean(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ImportConfiguration {
        ImportConfiguration::from_pairs([("any", 0)])
    }

    #[test]
    fn test_string_and_email_remove_one_quote_layer() {
        let config = config();
        let name = PropertyType::new("firstName", "string");
        let email = PropertyType::new("email", "email");

        assert_eq!(
            coerce(r#""Jane""#, &name, &config).unwrap(),
            Some(PropertyValue::String("Jane".into()))
        );
        assert_eq!(
            coerce("jane@example.com", &email, &config).unwrap(),
            Some(PropertyValue::String("jane@example.com".into()))
        );
    }

    #[test]
    fn test_boolean() {
        let config = config();
        let flag = PropertyType::new("optIn", "boolean");

        assert_eq!(coerce("TRUE", &flag, &config).unwrap(), Some(PropertyValue::Boolean(true)));
        assert_eq!(coerce("false", &flag, &config).unwrap(), Some(PropertyValue::Boolean(false)));
        assert_eq!(
            coerce("maybe", &flag, &config).unwrap_err(),
            CoercionError { expected: "boolean".into() }
        );
        assert!(coerce("", &flag, &config).is_err());
    }

    #[test]
    fn test_integer() {
        let config = config();
        let age = PropertyType::new("age", "integer");

        assert_eq!(coerce("42", &age, &config).unwrap(), Some(PropertyValue::Integer(42)));
        assert_eq!(coerce("-7", &age, &config).unwrap(), Some(PropertyValue::Integer(-7)));
        assert!(coerce("4.2", &age, &config).is_err());
        assert!(coerce("forty", &age, &config).is_err());
        assert!(coerce("3000000000", &age, &config).is_err());
    }

    #[test]
    fn test_unknown_type_is_dropped() {
        let config = config();
        let birth = PropertyType::new("birthDate", "date");
        assert_eq!(coerce("2001-02-03", &birth, &config).unwrap(), None);
    }

    #[test]
    fn test_multivalue_with_delimiters() {
        let mut config = config();
        config.multi_value_delimiter = Some("[]".into());
        let tags = PropertyType::new("tags", "string").multivalued();

        assert_eq!(
            coerce("[a;b;c]", &tags, &config).unwrap(),
            Some(PropertyValue::Strings(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(
            coerce(r#"["a;b"]"#, &tags, &config).unwrap(),
            Some(PropertyValue::Strings(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_multivalue_without_delimiters_keeps_brackets_and_quotes() {
        let config = config();
        let tags = PropertyType::new("tags", "email").multivalued();

        assert_eq!(
            coerce(r#"[x;"y"]"#, &tags, &config).unwrap(),
            Some(PropertyValue::Strings(vec!["[x".into(), r#""y"]"#.into()]))
        );
    }

    #[test]
    fn test_multivalue_custom_separator_is_literal() {
        let mut config = config();
        config.multi_value_separator = "|".into();
        config.multi_value_delimiter = Some("()".into());
        let tags = PropertyType::new("tags", "string").multivalued();

        assert_eq!(
            coerce("(a| b|c)", &tags, &config).unwrap(),
            Some(PropertyValue::Strings(vec!["a".into(), " b".into(), "c".into()]))
        );
    }
}
