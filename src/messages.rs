//! User- and operator-facing texts
//!
//! Everything the bot says is rendered here. User messages use the legacy
//! Markdown dialect; the operator report uses HTML.

use crate::state_machine::effect::RegistrationSubmission;
use crate::state_machine::schema::FieldSchema;
use crate::state_machine::state::Fields;
use serde::Deserialize;

const DONE_CELL: char = '✅';
const PENDING_CELL: char = '⬜';
const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━";

/// Deployment copy. Every entry can be overridden from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Texts {
    pub event_title: String,
    pub welcome: String,
    pub start_button: String,
    pub step_label: String,
    pub invalid_input: String,
    pub summary_header: String,
    pub summary_footer: String,
    pub offer_button: String,
    pub confirm_button: String,
    pub restart_button: String,
    pub restart_toast: String,
    pub offer_link: String,
    pub deposit_amount: String,
    pub payment_details: String,
    pub payment_recipient: String,
    pub proof_reminder: String,
    pub thank_you: String,
    pub operator_title: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            event_title: "REGISTRATION".to_string(),
            welcome: "Welcome! To sign up, please fill in a short form.\n\nPress the button below to begin.".to_string(),
            start_button: "🚀 Start registration".to_string(),
            step_label: "Step".to_string(),
            invalid_input: "⚠️ Please enter a valid value.".to_string(),
            summary_header: "PLEASE CHECK YOUR DETAILS:".to_string(),
            summary_footer: "If everything is correct, accept the offer.".to_string(),
            offer_button: "📜 Read the offer".to_string(),
            confirm_button: "✅ All correct, I agree".to_string(),
            restart_button: "❌ Fill in again".to_string(),
            restart_toast: "Resetting…".to_string(),
            offer_link: "https://example.com/offer".to_string(),
            deposit_amount: "0".to_string(),
            payment_details: "not configured".to_string(),
            payment_recipient: "not configured".to_string(),
            proof_reminder: "📎 Please send a screenshot or file of the payment receipt.".to_string(),
            thank_you: "✨ *THANK YOU!*\n\nYour booking is accepted. We will contact you shortly.".to_string(),
            operator_title: "🔥 NEW REGISTRATION".to_string(),
        }
    }
}

impl Texts {
    /// Payment entries still holding placeholder copy
    pub fn unset_payment_details(&self) -> Vec<&'static str> {
        let defaults = Texts::default();
        [
            ("deposit_amount", &self.deposit_amount, &defaults.deposit_amount),
            ("payment_details", &self.payment_details, &defaults.payment_details),
            ("payment_recipient", &self.payment_recipient, &defaults.payment_recipient),
            ("offer_link", &self.offer_link, &defaults.offer_link),
        ]
        .into_iter()
        .filter(|(_, value, default)| value == default)
        .map(|(name, _, _)| name)
        .collect()
    }
}

/// Fixed-width progress bar: `done` cells checked out of `total`
pub fn progress(done: usize, total: usize) -> String {
    (0..total)
        .map(|k| if k < done { DONE_CELL } else { PENDING_CELL })
        .collect()
}

/// Prompt for the field at `index`, headed by the progress bar
pub fn field_prompt(schema: &FieldSchema, index: usize, texts: &Texts) -> String {
    let prompt = schema.get(index).map_or("", |f| f.prompt.as_str());
    format!(
        "{}\n*{} {}:* {}",
        progress(index, schema.len()),
        texts.step_label,
        index + 1,
        prompt
    )
}

pub fn welcome(texts: &Texts) -> String {
    format!(
        "✨ {}\n{DIVIDER}\n{}",
        bold_markdown(&texts.event_title),
        texts.welcome
    )
}

/// Confirmation summary listing every collected field in schema order
pub fn summary(schema: &FieldSchema, fields: &Fields, texts: &Texts) -> String {
    let mut out = format!(
        "{}\n*{}*\n{DIVIDER}\n",
        progress(schema.len(), schema.len()),
        texts.summary_header
    );
    for spec in schema.iter() {
        let value = fields.get(&spec.name).unwrap_or("");
        out.push_str(&format!(
            "{} {}\n",
            bold_markdown(&format!("{}:", spec.label)),
            escape_markdown(value)
        ));
    }
    out.push_str(DIVIDER);
    out.push('\n');
    out.push_str(&texts.summary_footer);
    out
}

pub fn payment_instructions(texts: &Texts) -> String {
    format!(
        "✅ *DETAILS ACCEPTED*\n\n\
         To book your place, transfer a deposit of *{}*.\n\n\
         📌 *Payment details (tap to copy):*\n\
         `{}`\n\
         👤 Recipient: {}\n\n\
         📎 *After paying, send a screenshot of the receipt here.*",
        texts.deposit_amount, texts.payment_details, texts.payment_recipient
    )
}

/// HTML report for the operator chat
pub fn operator_report(submission: &RegistrationSubmission, texts: &Texts) -> String {
    let mut out = format!("<b>{}</b>\n{DIVIDER}\n", escape_html(&texts.operator_title));
    for field in &submission.fields {
        out.push_str(&format!(
            "<b>{}:</b> {}\n",
            escape_html(&field.label),
            escape_html(&field.value)
        ));
    }
    let submitter = &submission.submitter;
    out.push_str(&format!("🆔 ID: <code>{}</code>\n", submitter.user_id));
    out.push_str(&format!(
        "🔗 Profile: <a href=\"tg://user?id={}\">{}</a>",
        submitter.user_id,
        escape_html(&submitter.full_name)
    ));
    if let Some(username) = &submitter.username {
        out.push_str(&format!(" (@{})", escape_html(username)));
    }
    out.push('\n');
    out.push_str(DIVIDER);
    out
}

/// Escape characters that legacy Markdown treats as entity markers
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bold plain text in legacy Markdown.
///
/// Escapes are not honoured inside an entity, so marker characters are
/// emitted escaped between separately bolded runs.
pub fn bold_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut run = String::new();
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            if !run.is_empty() {
                out.push_str(&format!("*{run}*"));
                run.clear();
            }
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        out.push_str(&format!("*{run}*"));
    }
    out
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
