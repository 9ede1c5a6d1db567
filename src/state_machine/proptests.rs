//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::effect::Effect;
use super::event::{Attachment, AttachmentKind, MessageRef, Submitter};
use super::schema::{FieldSchema, Validator};
use super::*;
use crate::messages::Texts;
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn arb_context() -> impl Strategy<Value = RegContext> {
    (
        prop_oneof![
            Just(FieldSchema::basic(Validator::Contact)),
            Just(FieldSchema::basic(Validator::Any)),
            Just(FieldSchema::with_allergies(Validator::Contact)),
        ],
        prop_oneof![Just(ProofTextPolicy::Ignore), Just(ProofTextPolicy::Reprompt)],
    )
        .prop_map(|(schema, policy)| {
            RegContext::new(schema, Texts::default()).with_proof_text_policy(policy)
        })
}

/// Number of fields a session in `state` must hold
fn expected_field_count(state: RegState, schema_len: usize) -> usize {
    match state {
        RegState::Initial => 0,
        RegState::AwaitingField { index } => index,
        RegState::Confirming | RegState::AwaitingProof => schema_len,
    }
}

fn msg_ref() -> MessageRef {
    MessageRef {
        chat_id: 1,
        message_id: 5,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ]{1,20}",
        "\\+7 [0-9]{3} [0-9]{3}-[0-9]{2}-[0-9]{2}",
        "@[a-z]{1,12}",
        "[0-9]{1,9}",
        Just(String::new()),
    ]
}

fn arb_attachment_event() -> impl Strategy<Value = Event> {
    (
        prop_oneof![Just(AttachmentKind::Photo), Just(AttachmentKind::Document)],
        "[a-zA-Z0-9]{8}",
    )
        .prop_map(|(kind, file_id)| Event::AttachmentInput {
            attachment: Attachment {
                kind,
                file_id,
                message: msg_ref(),
            },
            submitter: Submitter {
                user_id: 1,
                full_name: "Test User".to_string(),
                username: None,
            },
            received_at: Utc::now(),
        })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::Reset),
        2 => Just(Event::Start),
        6 => arb_text().prop_map(|text| Event::TextInput { text }),
        2 => Just(Event::Confirm {
            callback_id: "cb".to_string(),
            message: msg_ref(),
        }),
        1 => Just(Event::Restart {
            callback_id: "cb".to_string(),
            message: msg_ref(),
        }),
        2 => arb_attachment_event(),
    ]
}

fn arb_non_proof_state(schema_len: usize) -> impl Strategy<Value = RegState> {
    prop_oneof![
        Just(RegState::Initial),
        (0..schema_len).prop_map(|index| RegState::AwaitingField { index }),
        Just(RegState::Confirming),
    ]
}

/// Drive a fresh session through `events`, returning the session and all effects
fn drive(ctx: &RegContext, events: Vec<Event>) -> (Session, Vec<Effect>) {
    let mut session = Session::new(SessionId(1));
    let mut effects = Vec::new();
    for event in events {
        if let Ok(result) = transition(&session, ctx, event) {
            result.apply_to(&mut session);
            effects.extend(result.effects);
        }
    }
    (session, effects)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: fields hold exactly the schema prefix passed since the last reset
    #[test]
    fn prop_fields_match_passed_steps(
        ctx in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let mut session = Session::new(SessionId(1));
        for event in events {
            if let Ok(result) = transition(&session, &ctx, event) {
                result.apply_to(&mut session);
            }
            let expected = expected_field_count(session.state, ctx.schema.len());
            let names: Vec<&str> = session.fields.names().collect();
            let schema_prefix: Vec<&str> = ctx
                .schema
                .iter()
                .take(expected)
                .map(|f| f.name.as_str())
                .collect();
            prop_assert_eq!(names, schema_prefix, "state {:?}", session.state);
        }
    }

    // Invariant 2: a rejected input leaves earlier fields untouched
    #[test]
    fn prop_validation_failure_preserves_fields(
        name in "[A-Za-z]{1,10}",
        bad in "[0-9]{0,9}|[a-z ]{1,10}"
    ) {
        let ctx = RegContext::new(FieldSchema::basic(Validator::Contact), Texts::default());
        let (session, _) = drive(&ctx, vec![Event::Start, Event::TextInput { text: name.clone() }]);
        let before = session.fields.clone();

        let result = transition(&session, &ctx, Event::TextInput { text: bad }).unwrap();
        prop_assert_eq!(result.new_state, RegState::AwaitingField { index: 1 });
        prop_assert_eq!(&result.fields, &FieldsUpdate::Keep);

        let mut after = session.clone();
        result.apply_to(&mut after);
        prop_assert_eq!(after.fields, before);
    }

    // Invariant 3: start, restart and reset are idempotent
    #[test]
    fn prop_resets_are_idempotent(
        ctx in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..15)
    ) {
        let (session, _) = drive(&ctx, events);

        for reset in [Event::Start, Event::Reset] {
            let mut once = session.clone();
            transition(&once, &ctx, reset.clone()).unwrap().apply_to(&mut once);
            let mut twice = once.clone();
            transition(&twice, &ctx, reset).unwrap().apply_to(&mut twice);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.fields.is_empty());
        }

        let mut confirming = session.clone();
        confirming.state = RegState::Confirming;
        let restart = Event::Restart { callback_id: "cb".to_string(), message: msg_ref() };
        transition(&confirming, &ctx, restart.clone()).unwrap().apply_to(&mut confirming);
        prop_assert_eq!(confirming.state, RegState::AwaitingField { index: 0 });
        prop_assert!(confirming.fields.is_empty());
        // A second press lands on a state that no longer offers the button
        prop_assert!(transition(&confirming, &ctx, restart).is_err());
    }

    // Invariant 4: attachments never produce a submission outside AwaitingProof
    #[test]
    fn prop_no_submission_outside_awaiting_proof(
        ctx in arb_context(),
        state in arb_non_proof_state(2),
        event in arb_attachment_event()
    ) {
        let mut session = Session::new(SessionId(1));
        session.state = state;
        if let Ok(result) = transition(&session, &ctx, event) {
            let notified = result
                .effects
                .iter()
                .any(|e| matches!(e, Effect::NotifyOperator { .. }));
            prop_assert!(!notified);
        }
    }

    // Invariant 5: progress bars have N cells, done iff index < collected fields
    #[test]
    fn prop_progress_matches_collected_fields(
        ctx in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let n = ctx.schema.len();
        let mut session = Session::new(SessionId(1));
        for event in events {
            let Ok(result) = transition(&session, &ctx, event) else { continue };
            result.apply_to(&mut session);
            let collects = matches!(
                session.state,
                RegState::AwaitingField { .. } | RegState::Confirming
            );
            for effect in &result.effects {
                let Effect::SendMessage(msg) = effect else { continue };
                let first_line = msg.text.lines().next().unwrap_or("");
                let is_progress = !first_line.is_empty()
                    && first_line.chars().all(|c| c == '✅' || c == '⬜');
                if !collects || !is_progress {
                    continue;
                }
                let cells: Vec<char> = first_line.chars().collect();
                prop_assert_eq!(cells.len(), n);
                for (k, cell) in cells.iter().enumerate() {
                    prop_assert_eq!(*cell == '✅', k < session.fields.len());
                }
            }
        }
    }
}
