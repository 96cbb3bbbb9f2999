//! Shop records as delivered by the marketplace-operator platform.
//! Read-only: fetched per synchronization run and never mutated.

use serde::{Deserialize, Deserializer, Serialize};

/// A vendor/seller account on the marketplace-operator platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    #[serde(rename = "shop_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default, rename = "contact_informations")]
    pub contact_information: Option<ContactInformation>,
    #[serde(default, rename = "shop_additional_fields")]
    pub additional_fields: Vec<AdditionalField>,
}

impl ShopRecord {
    pub fn contact_email(&self) -> Option<&str> {
        self.contact_information
            .as_ref()
            .and_then(|contact| contact.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInformation {
    #[serde(default)]
    pub civility: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Typed, extensible key/value attribute attached to a shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub code: String,
    #[serde(rename = "type")]
    pub field_type: AdditionalFieldType,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl AdditionalField {
    pub fn list(code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            field_type: AdditionalFieldType::List,
            value: serde_json::Value::String(value.into()),
        }
    }

    /// String form of the value; non-string JSON values render as JSON text.
    pub fn value_as_string(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdditionalFieldType {
    List,
    MultipleValuesList,
    String,
    Textarea,
    Boolean,
    Numeric,
    Decimal,
    Date,
    Link,
    Regex,
    #[serde(other)]
    Other,
}

/// One page of the operator shop listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopPage {
    #[serde(default)]
    pub shops: Vec<ShopRecord>,
    pub total_count: u64,
}

/// The operator API serializes shop ids as integers; they are opaque strings here.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for shop_id, got {}",
            other
        ))),
    }
}
