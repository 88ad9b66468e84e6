use serde::{Deserialize, Serialize};

// ============================================================================
// Setting Models
// ============================================================================

/// Declared data type of a stored setting (the `data_type` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingDataType {
    String,
    Number,
    Boolean,
    ObjectId,
    ObjectIds,
    Image,
}

impl SettingDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingDataType::String => "string",
            SettingDataType::Number => "number",
            SettingDataType::Boolean => "boolean",
            SettingDataType::ObjectId => "object_id",
            SettingDataType::ObjectIds => "object_ids",
            SettingDataType::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<SettingDataType> {
        match value {
            "string" => Some(SettingDataType::String),
            "number" => Some(SettingDataType::Number),
            "boolean" => Some(SettingDataType::Boolean),
            "object_id" => Some(SettingDataType::ObjectId),
            "object_ids" => Some(SettingDataType::ObjectIds),
            "image" => Some(SettingDataType::Image),
            _ => None,
        }
    }
}

/// A typed setting value. Decoded once at the repository boundary so that
/// services only ever see values whose payload matches their declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    String(String),
    Number(i64),
    Boolean(bool),
    /// Reference to another document (e.g. a user id).
    ObjectId(String),
    ObjectIds(Vec<String>),
    /// Object-storage key of an uploaded image.
    Image(String),
}

impl SettingValue {
    pub fn data_type(&self) -> SettingDataType {
        match self {
            SettingValue::String(_) => SettingDataType::String,
            SettingValue::Number(_) => SettingDataType::Number,
            SettingValue::Boolean(_) => SettingDataType::Boolean,
            SettingValue::ObjectId(_) => SettingDataType::ObjectId,
            SettingValue::ObjectIds(_) => SettingDataType::ObjectIds,
            SettingValue::Image(_) => SettingDataType::Image,
        }
    }

    /// Decode a stored `(data_type, value)` pair. Returns `None` when the
    /// declared type is unknown or the JSON payload does not match it.
    pub fn decode(data_type: &str, raw: &str) -> Option<SettingValue> {
        let data_type = SettingDataType::parse(data_type)?;
        let json: serde_json::Value = serde_json::from_str(raw).ok()?;

        match data_type {
            SettingDataType::String => json.as_str().map(|s| SettingValue::String(s.to_string())),
            SettingDataType::Number => json.as_i64().map(SettingValue::Number),
            SettingDataType::Boolean => json.as_bool().map(SettingValue::Boolean),
            SettingDataType::ObjectId => {
                json.as_str().map(|s| SettingValue::ObjectId(s.to_string()))
            }
            SettingDataType::ObjectIds => {
                let arr = json.as_array()?;
                let mut ids = Vec::with_capacity(arr.len());
                for item in arr {
                    ids.push(item.as_str()?.to_string());
                }
                Some(SettingValue::ObjectIds(ids))
            }
            SettingDataType::Image => json.as_str().map(|s| SettingValue::Image(s.to_string())),
        }
    }

    /// Encode into the JSON text stored in the `value` column.
    pub fn encode(&self) -> String {
        let json = match self {
            SettingValue::String(s) | SettingValue::ObjectId(s) | SettingValue::Image(s) => {
                serde_json::Value::String(s.clone())
            }
            SettingValue::Number(n) => serde_json::Value::from(*n),
            SettingValue::Boolean(b) => serde_json::Value::Bool(*b),
            SettingValue::ObjectIds(ids) => serde_json::Value::from(ids.clone()),
        };
        json.to_string()
    }
}

/// A decoded settings row. `updated_by`/`updated_at` are kept in the table for auditing only.
#[derive(Debug, Clone)]
pub struct Setting {
    pub name: String,
    pub value: SettingValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_matching_types() {
        assert_eq!(
            SettingValue::decode("number", "12"),
            Some(SettingValue::Number(12))
        );
        assert_eq!(
            SettingValue::decode("boolean", "false"),
            Some(SettingValue::Boolean(false))
        );
        assert_eq!(
            SettingValue::decode("object_ids", r#"["a","b"]"#),
            Some(SettingValue::ObjectIds(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            SettingValue::decode("image", r#""logos/main.png""#),
            Some(SettingValue::Image("logos/main.png".to_string()))
        );
    }

    #[test]
    fn decode_rejects_mismatched_payload() {
        assert_eq!(SettingValue::decode("number", r#""12""#), None);
        assert_eq!(SettingValue::decode("number", "1.5"), None);
        assert_eq!(SettingValue::decode("boolean", "1"), None);
        assert_eq!(SettingValue::decode("object_ids", r#"["a", 3]"#), None);
        assert_eq!(SettingValue::decode("color", r#""red""#), None);
        assert_eq!(SettingValue::decode("string", "not json"), None);
    }

    #[test]
    fn encoded_value_decodes_back_under_its_own_type() {
        let value = SettingValue::ObjectIds(vec!["u1".to_string()]);
        let raw = value.encode();
        assert_eq!(raw, r#"["u1"]"#);
        assert_eq!(
            SettingValue::decode(value.data_type().as_str(), &raw),
            Some(value)
        );
    }
}
