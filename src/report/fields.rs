use crate::gateway::Row;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Percent,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Describes each column from the values in the first row.
pub fn infer_fields(first_row: Option<&Row>) -> Vec<FieldDescriptor> {
    let Some(row) = first_row else {
        return Vec::new();
    };

    row.iter()
        .map(|(key, value)| FieldDescriptor {
            key: key.clone(),
            label: humanize(key),
            field_type: infer_type(key, value),
        })
        .collect()
}

fn infer_type(key: &str, value: &Value) -> FieldType {
    let key = key.to_lowercase();
    if value.is_number() {
        if key.contains("percent") || key.contains("margin") {
            FieldType::Percent
        } else if key.contains("amount") || key.contains("cost") || key.contains("total") {
            FieldType::Currency
        } else {
            FieldType::Number
        }
    } else if value.as_str().is_some_and(looks_like_date) {
        FieldType::Date
    } else {
        FieldType::Text
    }
}

fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..10].iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// `margin_percentage` -> `Margin Percentage`
pub fn humanize(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
