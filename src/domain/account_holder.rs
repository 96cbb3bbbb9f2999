//! Payments-platform account-holder payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Legal-entity classification of an account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalEntity {
    Business,
    Individual,
    NonProfit,
    Partnership,
    PublicCompany,
}

impl LegalEntity {
    pub const ALL: [LegalEntity; 5] = [
        LegalEntity::Business,
        LegalEntity::Individual,
        LegalEntity::NonProfit,
        LegalEntity::Partnership,
        LegalEntity::PublicCompany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LegalEntity::Business => "Business",
            LegalEntity::Individual => "Individual",
            LegalEntity::NonProfit => "NonProfit",
            LegalEntity::Partnership => "Partnership",
            LegalEntity::PublicCompany => "PublicCompany",
        }
    }

    /// Case-insensitive match against the known classifications.
    pub fn from_field_value(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for LegalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// Salutation codes used by the operator platform.
pub const CIVILITY_TO_GENDER: [(&str, Gender); 3] = [
    ("Mr", Gender::Male),
    ("Mrs", Gender::Female),
    ("Miss", Gender::Female),
];

/// Unmapped, empty or absent civility codes resolve to `Gender::Unknown`.
pub fn gender_from_civility(civility: Option<&str>) -> Gender {
    civility
        .and_then(|code| {
            CIVILITY_TO_GENDER
                .iter()
                .find(|(known, _)| *known == code)
                .map(|(_, gender)| *gender)
        })
        .unwrap_or(Gender::Unknown)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualDetails {
    pub name: Name,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHolderDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_details: Option<IndividualDetails>,
}

/// Built from exactly one shop, submitted once, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountHolderRequest {
    pub account_holder_code: String,
    pub legal_entity: LegalEntity,
    pub account_holder_details: AccountHolderDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountHolderResponse {
    #[serde(default)]
    pub account_holder_code: Option<String>,
    #[serde(default)]
    pub psp_reference: Option<String>,
    #[serde(default)]
    pub invalid_fields: Vec<InvalidField>,
}

/// Field-level validation problem reported alongside an otherwise accepted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidField {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = self.error_description.as_deref().unwrap_or("invalid value");
        match &self.field_name {
            Some(field) => write!(f, "{}: {}", field, description),
            None => f.write_str(description),
        }
    }
}

/// Error payload returned by the payments platform on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub psp_reference: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "errorCode={} errorType={} message={}",
            self.error_code.as_deref().unwrap_or("-"),
            self.error_type.as_deref().unwrap_or("-"),
            self.message.as_deref().unwrap_or("-"),
        )
    }
}

/// Provider message attached to payout notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub code: String,
    pub text: String,
}

impl fmt::Display for ProviderMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.code, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareholderContact {
    #[serde(default)]
    pub shareholder_code: Option<String>,
    #[serde(default)]
    pub name: Option<Name>,
    pub email: String,
}
