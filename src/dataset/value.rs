//! Column type inference for raw CSV cells.
//!
//! A column is typed as a whole, the way a dataframe reader does it: an
//! integer column that contains a missing value becomes a float column, and
//! any unparsable cell turns the column into text.

use serde_json::{Number, Value};

/// Cell spellings read as a missing value.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

pub fn is_missing(cell: &str) -> bool {
    NA_VALUES.contains(&cell)
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Infer the kind of one column from all of its cells.
pub fn infer_kind<'a, I>(cells: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a str>,
{
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut any_missing = false;
    let mut any_present = false;

    for cell in cells {
        if is_missing(cell) {
            any_missing = true;
            continue;
        }
        any_present = true;
        let trimmed = cell.trim();
        if all_int && trimmed.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && trimmed.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && parse_bool(trimmed).is_none() {
            all_bool = false;
        }
        if !all_int && !all_float && !all_bool {
            return ColumnKind::Text;
        }
    }

    if !any_present {
        // An all-missing column reads as float NaN.
        return ColumnKind::Float;
    }
    if all_int && !any_missing {
        ColumnKind::Integer
    } else if all_float {
        ColumnKind::Float
    } else if all_bool && !any_missing {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

/// Convert a cell into a JSON scalar according to its column kind.
pub fn to_value(cell: &str, kind: ColumnKind) -> Value {
    if is_missing(cell) {
        return Value::Null;
    }
    let trimmed = cell.trim();
    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Boolean => parse_bool(trimmed).map(Value::Bool).unwrap_or(Value::Null),
        ColumnKind::Text => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_column() {
        let kind = infer_kind(["1", "2", "-7"]);
        assert_eq!(kind, ColumnKind::Integer);
        assert_eq!(to_value("-7", kind), json!(-7));
    }

    #[test]
    fn test_integer_with_missing_becomes_float() {
        let kind = infer_kind(["1", "", "3"]);
        assert_eq!(kind, ColumnKind::Float);
        assert_eq!(to_value("3", kind).to_string(), "3.0");
        assert_eq!(to_value("", kind), Value::Null);
    }

    #[test]
    fn test_mixed_column_is_text() {
        let kind = infer_kind(["M001", "2.5"]);
        assert_eq!(kind, ColumnKind::Text);
        assert_eq!(to_value("2.5", kind), json!("2.5"));
        assert_eq!(to_value("NA", kind), Value::Null);
    }

    #[test]
    fn test_boolean_column() {
        let kind = infer_kind(["True", "False"]);
        assert_eq!(kind, ColumnKind::Boolean);
        assert_eq!(to_value("False", kind), json!(false));
    }

    #[test]
    fn test_non_finite_float_is_null() {
        let kind = infer_kind(["1.5", "inf"]);
        assert_eq!(kind, ColumnKind::Float);
        assert_eq!(to_value("inf", kind), Value::Null);
    }
}
