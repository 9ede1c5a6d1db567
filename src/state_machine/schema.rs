//! Field schema: the ordered list of data points collected before confirmation

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// Minimum digit count for a phone-number contact
pub const CONTACT_MIN_DIGITS: usize = 10;
/// Maximum digit count for a phone-number contact
pub const CONTACT_MAX_DIGITS: usize = 15;

/// Input rejected by a field validator.
///
/// Only the field name is kept; the reason is never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for field `{field}`")]
pub struct ValidationError {
    pub field: String,
}

/// Named validation policies a field can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Any non-empty text
    #[default]
    Any,
    /// Phone number with 10..=15 digits, or an `@handle`
    Contact,
}

impl Validator {
    /// Check raw input, returning the value to store.
    ///
    /// The raw text is stored as typed; validators never normalise it.
    pub fn validate(self, field: &str, raw: &str) -> Result<String, ValidationError> {
        let accepted = match self {
            Validator::Any => !raw.trim().is_empty(),
            Validator::Contact => is_valid_contact(raw),
        };
        if accepted {
            Ok(raw.to_string())
        } else {
            Err(ValidationError {
                field: field.to_string(),
            })
        }
    }
}

/// Any Unicode decimal digit (general category Nd)
static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d").expect("digit class is a valid pattern"));

/// Phone number (10 to 15 digits once everything else is stripped) or a handle
pub fn is_valid_contact(raw: &str) -> bool {
    if raw.starts_with('@') {
        return true;
    }
    let digits = DECIMAL_DIGIT.find_iter(raw).count();
    (CONTACT_MIN_DIGITS..=CONTACT_MAX_DIGITS).contains(&digits)
}

/// One collected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key under which the value is stored
    pub name: String,
    /// Caption used in the confirmation summary and the operator report
    pub label: String,
    /// Question asked when the field is due
    pub prompt: String,
    #[serde(default)]
    pub validator: Validator,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        prompt: impl Into<String>,
        validator: Validator,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            prompt: prompt.into(),
            validator,
        }
    }
}

/// Problems with a configured schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field schema is empty")]
    Empty,
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// Ordered, deployment-specific list of fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        for (i, field) in fields.iter().enumerate() {
            if fields.iter().skip(i + 1).any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Name and contact
    pub fn basic(contact: Validator) -> Self {
        Self {
            fields: vec![name_field(), contact_field(contact)],
        }
    }

    /// Name, contact and allergies
    pub fn with_allergies(contact: Validator) -> Self {
        Self {
            fields: vec![
                name_field(),
                contact_field(contact),
                FieldSpec::new(
                    "allergies",
                    "⚠️ Allergies",
                    "Do you have any *allergies*?\n_(Oils, herbs, metals). If none, write \"No\"._",
                    Validator::Any,
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}

fn name_field() -> FieldSpec {
    FieldSpec::new(
        "name",
        "👤 Full name",
        "Enter your *full name*:",
        Validator::Any,
    )
}

fn contact_field(validator: Validator) -> FieldSpec {
    FieldSpec::new(
        "contact",
        "📞 Contact",
        "Send your *phone number* or @username:",
        validator,
    )
}
