use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// What a record's plaintext was before it was turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    String,
}

/// Record payload
///
/// On the wire a `Text` is a JSON string and a `Json` is any other JSON
///  value. Ciphertext is always carried as `Text`; the record's
///  `EncryptionInfo::content_type` says what it decrypts back into.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Json(Value),
    Text(String),
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::Json(_) => ContentType::Json,
            Content::Text(_) => ContentType::String,
        }
    }

    /// `null` counts as absent content
    pub fn is_null(&self) -> bool {
        matches!(self, Content::Json(Value::Null))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            Content::Text(_) => None,
        }
    }

    /// Render the content as the text that gets encrypted
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Content::Json(value) => serde_json::to_string(value),
            Content::Text(text) => Ok(text.clone()),
        }
    }

    /// Inverse of [`Content::to_text`]
    pub fn from_text(text: String, content_type: ContentType) -> Result<Self, serde_json::Error> {
        match content_type {
            ContentType::Json => Ok(Content::Json(serde_json::from_str(&text)?)),
            ContentType::String => Ok(Content::Text(text)),
        }
    }

    /// Convert into a plain JSON value, strings included
    pub fn into_value(self) -> Value {
        match self {
            Content::Json(value) => value,
            Content::Text(text) => Value::String(text),
        }
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Content::Text(text),
            other => Content::Json(other),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Content::Json(value) => value.serialize(serializer),
            Content::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Content::from)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_round_trip_preserves_shape() {
        let structured = Content::Json(json!({"msg": "hi", "n": [1, 2]}));
        let text = structured.to_text().unwrap();
        assert_eq!(
            Content::from_text(text, structured.content_type()).unwrap(),
            structured
        );

        // a string that happens to look like JSON stays a string
        let plain = Content::from("{\"msg\":\"hi\"}");
        let text = plain.to_text().unwrap();
        assert_eq!(Content::from_text(text, plain.content_type()).unwrap(), plain);
    }

    #[test]
    fn test_from_text_rejects_corrupt_json() {
        assert!(Content::from_text("{not json".into(), ContentType::Json).is_err());
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(serde_json::to_value(Content::from("hello")).unwrap(), json!("hello"));
        assert_eq!(
            serde_json::from_value::<Content>(json!({"a": 1})).unwrap(),
            Content::Json(json!({"a": 1}))
        );
        assert_eq!(
            serde_json::from_value::<Content>(json!("hello")).unwrap(),
            Content::Text("hello".into())
        );
    }

    #[test]
    fn test_null_is_absent() {
        assert!(Content::Json(Value::Null).is_null());
        assert!(!Content::from("").is_null());
    }
}
