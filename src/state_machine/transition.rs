//! Pure state transition function
//!
//! Given the same session, context and event this always produces the same
//! next state, field change and effects. No I/O happens here.

use super::effect::{
    Keyboard, OutgoingMessage, RegistrationSubmission, SubmittedField, TextFormat,
};
use super::event::{Attachment, Submitter};
use super::{Effect, Event, RegContext, RegState, Session};
use crate::messages;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Change to apply to the session's collected fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldsUpdate {
    Keep,
    Set { name: String, value: String },
    Clear,
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: RegState,
    pub fields: FieldsUpdate,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: RegState) -> Self {
        Self {
            new_state: state,
            fields: FieldsUpdate::Keep,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldsUpdate) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Apply the new state and field change to a session in place
    pub fn apply_to(&self, session: &mut Session) {
        match &self.fields {
            FieldsUpdate::Keep => {}
            FieldsUpdate::Set { name, value } => session.fields.set(name, value.clone()),
            FieldsUpdate::Clear => session.fields.clear(),
        }
        session.state = self.new_state;
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event `{event}` is not accepted in state {state}")]
    UnexpectedEvent { state: RegState, event: &'static str },
    #[error("state refers to field {0} which the schema does not define")]
    UnknownField(usize),
}

/// Pure transition function
pub fn transition(
    session: &Session,
    context: &RegContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let texts = &context.texts;

    match (session.state, event) {
        // ============================================================
        // Global commands, accepted in every state
        // ============================================================
        (_, Event::Reset) => Ok(TransitionResult::new(RegState::Initial)
            .with_fields(FieldsUpdate::Clear)
            .with_effect(Effect::send(
                OutgoingMessage::markdown(messages::welcome(texts)).with_keyboard(
                    Keyboard::StartButton {
                        label: texts.start_button.clone(),
                    },
                ),
            ))),

        (_, Event::Start) => Ok(begin_collection(context)),

        // ============================================================
        // Field collection
        // ============================================================
        (RegState::AwaitingField { index }, Event::TextInput { text }) => {
            let spec = context
                .schema
                .get(index)
                .ok_or(TransitionError::UnknownField(index))?;

            let value = match spec.validator.validate(&spec.name, &text) {
                Ok(value) => value,
                Err(err) => {
                    tracing::debug!(session_id = %session.id, field = %err.field, "Input rejected by validator");
                    return Ok(TransitionResult::new(session.state)
                        .with_effect(Effect::send(OutgoingMessage::plain(
                            texts.invalid_input.clone(),
                        ))));
                }
            };

            let next = index + 1;
            let update = FieldsUpdate::Set {
                name: spec.name.clone(),
                value: value.clone(),
            };

            if next < context.schema.len() {
                Ok(TransitionResult::new(RegState::AwaitingField { index: next })
                    .with_fields(update)
                    .with_effect(Effect::send(OutgoingMessage::markdown(
                        messages::field_prompt(&context.schema, next, texts),
                    ))))
            } else {
                let mut fields = session.fields.clone();
                fields.set(&spec.name, value);
                let summary = messages::summary(&context.schema, &fields, texts);
                Ok(TransitionResult::new(RegState::Confirming)
                    .with_fields(update)
                    .with_effect(Effect::send(
                        OutgoingMessage::markdown(summary).with_keyboard(Keyboard::Confirmation {
                            offer_label: texts.offer_button.clone(),
                            offer_url: texts.offer_link.clone(),
                            confirm_label: texts.confirm_button.clone(),
                            restart_label: texts.restart_button.clone(),
                        }),
                    )))
            }
        }

        // ============================================================
        // Confirmation
        // ============================================================
        (RegState::Confirming, Event::Confirm { callback_id, message }) => {
            Ok(TransitionResult::new(RegState::AwaitingProof)
                .with_effect(Effect::answer(callback_id))
                .with_effect(Effect::EditMessage {
                    message,
                    text: messages::payment_instructions(texts),
                    format: TextFormat::Markdown,
                }))
        }

        (RegState::Confirming, Event::Restart { callback_id, .. }) => {
            let restarted = begin_collection(context);
            let mut effects = vec![Effect::answer_with(
                callback_id,
                texts.restart_toast.clone(),
            )];
            effects.extend(restarted.effects);
            Ok(TransitionResult {
                effects,
                ..restarted
            })
        }

        // ============================================================
        // Proof of payment
        // ============================================================
        (
            RegState::AwaitingProof,
            Event::AttachmentInput {
                attachment,
                submitter,
                received_at,
            },
        ) => {
            let submission = build_submission(session, context, attachment, submitter, received_at);
            Ok(TransitionResult::new(RegState::Initial)
                .with_fields(FieldsUpdate::Clear)
                .with_effect(Effect::NotifyOperator { submission })
                .with_effect(Effect::send(
                    OutgoingMessage::markdown(texts.thank_you.clone()).with_keyboard(
                        Keyboard::StartButton {
                            label: texts.start_button.clone(),
                        },
                    ),
                )))
        }

        (RegState::AwaitingProof, event @ Event::TextInput { .. }) => {
            match context.proof_text_policy {
                super::ProofTextPolicy::Reprompt => Ok(TransitionResult::new(
                    RegState::AwaitingProof,
                )
                .with_effect(Effect::send(OutgoingMessage::markdown(
                    texts.proof_reminder.clone(),
                )))),
                super::ProofTextPolicy::Ignore => Err(TransitionError::UnexpectedEvent {
                    state: session.state,
                    event: event.kind(),
                }),
            }
        }

        // ============================================================
        // Everything else is dropped
        // ============================================================
        (state, event) => Err(TransitionError::UnexpectedEvent {
            state,
            event: event.kind(),
        }),
    }
}

/// Clear the fields and ask for the first one
fn begin_collection(context: &RegContext) -> TransitionResult {
    TransitionResult::new(RegState::AwaitingField { index: 0 })
        .with_fields(FieldsUpdate::Clear)
        .with_effect(Effect::send(
            OutgoingMessage::markdown(messages::field_prompt(&context.schema, 0, &context.texts))
                .with_keyboard(Keyboard::Remove),
        ))
}

fn build_submission(
    session: &Session,
    context: &RegContext,
    proof: Attachment,
    submitter: Submitter,
    submitted_at: DateTime<Utc>,
) -> RegistrationSubmission {
    let fields = context
        .schema
        .iter()
        .filter_map(|spec| {
            session.fields.get(&spec.name).map(|value| SubmittedField {
                name: spec.name.clone(),
                label: spec.label.clone(),
                value: value.to_string(),
            })
        })
        .collect();

    RegistrationSubmission {
        session_id: session.id,
        submitter,
        fields,
        proof,
        submitted_at,
    }
}
