//! Deployment configuration
//!
//! Settings come from the environment, optionally layered over a TOML file
//! named by `REGISTRATION_CONFIG`. Environment values win.

use crate::messages::Texts;
use crate::state_machine::schema::{FieldSchema, FieldSpec, SchemaError, Validator};
use crate::state_machine::{ProofTextPolicy, RegContext};
use crate::telegram::DEFAULT_API_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid field schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Built-in field sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Name and contact
    #[default]
    Basic,
    /// Name, contact and allergies
    Allergies,
}

/// How strictly the built-in contact field is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactValidation {
    #[default]
    Strict,
    Any,
}

/// Optional deployment file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    admin_id: Option<i64>,
    variant: Option<Variant>,
    contact_validation: Option<ContactValidation>,
    proof_text_policy: Option<ProofTextPolicy>,
    texts: Texts,
    /// Explicit schema; replaces the built-in variant when present
    fields: Option<Vec<FieldSpec>>,
}

/// Everything the process needs to start
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub admin_chat: Option<i64>,
    pub port: u16,
    pub api_url: String,
    pub session_idle_timeout: Option<Duration>,
    pub context: RegContext,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let file = match var("REGISTRATION_CONFIG") {
            Some(path) => load_file(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let admin_chat = match var("ADMIN_ID") {
            Some(raw) => Some(parse_number("ADMIN_ID", &raw)?),
            None => file.admin_id,
        };
        let port = match var("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        let api_url = var("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let session_idle_timeout = match var("SESSION_IDLE_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_number(
                "SESSION_IDLE_TIMEOUT_SECS",
                &raw,
            )?)),
            None => None,
        };

        let variant = match var("REGISTRATION_VARIANT") {
            Some(raw) => parse_choice("REGISTRATION_VARIANT", &raw)?,
            None => file.variant.unwrap_or_default(),
        };
        let contact = match var("CONTACT_VALIDATION") {
            Some(raw) => parse_choice("CONTACT_VALIDATION", &raw)?,
            None => file.contact_validation.unwrap_or_default(),
        };
        let proof_text_policy = match var("PROOF_TEXT_POLICY") {
            Some(raw) => parse_choice("PROOF_TEXT_POLICY", &raw)?,
            None => file.proof_text_policy.unwrap_or_default(),
        };

        let schema = match file.fields {
            Some(fields) => FieldSchema::new(fields)?,
            None => {
                let contact = match contact {
                    ContactValidation::Strict => Validator::Contact,
                    ContactValidation::Any => Validator::Any,
                };
                match variant {
                    Variant::Basic => FieldSchema::basic(contact),
                    Variant::Allergies => FieldSchema::with_allergies(contact),
                }
            }
        };

        let mut texts = file.texts;
        let overrides: [(&str, &mut String); 5] = [
            ("EVENT_TITLE", &mut texts.event_title),
            ("OFFER_LINK", &mut texts.offer_link),
            ("DEPOSIT_AMOUNT", &mut texts.deposit_amount),
            ("PAYMENT_DETAILS", &mut texts.payment_details),
            ("PAYMENT_RECIPIENT", &mut texts.payment_recipient),
        ];
        for (key, slot) in overrides {
            if let Some(value) = var(key) {
                *slot = value;
            }
        }

        Ok(Self {
            token,
            admin_chat,
            port,
            api_url,
            session_idle_timeout,
            context: RegContext::new(schema, texts).with_proof_text_policy(proof_text_policy),
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number<N: std::str::FromStr>(key: &'static str, raw: &str) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

/// Parse a lowercase keyword through the type's serde names
fn parse_choice<T: serde::de::DeserializeOwned>(
    key: &'static str,
    raw: &str,
) -> Result<T, ConfigError> {
    let keyword = raw.trim().to_ascii_lowercase();
    serde_json::from_value(serde_json::Value::String(keyword)).map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn token_is_required() {
        let err = BotConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn defaults_apply() {
        let config = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin_chat, None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.session_idle_timeout, None);
        assert_eq!(config.context.schema, FieldSchema::basic(Validator::Contact));
        assert_eq!(config.context.proof_text_policy, ProofTextPolicy::Ignore);
        assert_eq!(config.context.texts, Texts::default());
    }

    #[test]
    fn environment_selects_variant_and_policies() {
        let config = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_ID", "-100123"),
            ("PORT", "9000"),
            ("REGISTRATION_VARIANT", "Allergies"),
            ("CONTACT_VALIDATION", "any"),
            ("PROOF_TEXT_POLICY", "reprompt"),
            ("SESSION_IDLE_TIMEOUT_SECS", "3600"),
            ("DEPOSIT_AMOUNT", "1000 RUB"),
        ]))
        .unwrap();
        assert_eq!(config.admin_chat, Some(-100_123));
        assert_eq!(config.port, 9000);
        assert_eq!(config.context.schema, FieldSchema::with_allergies(Validator::Any));
        assert_eq!(config.context.proof_text_policy, ProofTextPolicy::Reprompt);
        assert_eq!(config.session_idle_timeout, Some(Duration::from_secs(3600)));
        assert_eq!(config.context.texts.deposit_amount, "1000 RUB");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "boss")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ADMIN_ID", .. }));

        let err = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("REGISTRATION_VARIANT", "deluxe"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "REGISTRATION_VARIANT",
                ..
            }
        ));
    }

    #[test]
    fn file_defines_schema_and_texts_with_env_overrides() {
        let file = toml_file(
            r#"
admin_id = 42
proof_text_policy = "reprompt"

[texts]
event_title = "SPRING RETREAT"
deposit_amount = "500"

[[fields]]
name = "name"
label = "Name"
prompt = "Your name?"

[[fields]]
name = "phone"
label = "Phone"
prompt = "Your phone?"
validator = "contact"
"#,
        );
        let path = file.path().to_string_lossy().into_owned();
        let config = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("REGISTRATION_CONFIG", path.as_str()),
            ("DEPOSIT_AMOUNT", "700"),
        ]))
        .unwrap();

        assert_eq!(config.admin_chat, Some(42));
        assert_eq!(config.context.proof_text_policy, ProofTextPolicy::Reprompt);
        assert_eq!(config.context.schema.len(), 2);
        let phone = config.context.schema.get(1).unwrap();
        assert_eq!(phone.name, "phone");
        assert_eq!(phone.validator, Validator::Contact);
        assert_eq!(config.context.schema.get(0).unwrap().validator, Validator::Any);
        assert_eq!(config.context.texts.event_title, "SPRING RETREAT");
        assert_eq!(config.context.texts.deposit_amount, "700");
        assert_eq!(config.context.texts.start_button, Texts::default().start_button);
    }

    #[test]
    fn empty_or_duplicate_schema_is_an_error() {
        let empty = toml_file("fields = []\n");
        let path = empty.path().to_string_lossy().into_owned();
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("REGISTRATION_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::Empty)));

        let duplicate = toml_file(
            r#"
[[fields]]
name = "name"
label = "A"
prompt = "a"

[[fields]]
name = "name"
label = "B"
prompt = "b"
"#,
        );
        let path = duplicate.path().to_string_lossy().into_owned();
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("REGISTRATION_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::DuplicateField(name)) if name == "name"));
    }

    #[test]
    fn example_deployment_file_parses() {
        let file: FileConfig = toml::from_str(include_str!("../registration.example.toml")).unwrap();
        let schema = FieldSchema::new(file.fields.unwrap()).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(file.proof_text_policy, Some(ProofTextPolicy::Reprompt));
        assert_eq!(file.texts.event_title, "SPRING RETREAT");
    }

    #[test]
    fn unreadable_or_malformed_file_is_reported() {
        let err = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("REGISTRATION_CONFIG", "/nonexistent/registration.toml"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let bad = toml_file("unknown_key = 1\n");
        let path = bad.path().to_string_lossy().into_owned();
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("REGISTRATION_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
