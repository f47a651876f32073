//! Field-level validation of candidate user records.
//!
//! Rules live in a static table keyed by [`Field`]. Each rule inspects one field of a
//! [`UserDraft`] and reports `None` when the key is absent, so the same table serves both
//! validation modes. A present `null` or a value of the wrong JSON type fails its rule:
//!
//! - [`ValidationMode::Full`]: every field is required; an absent field fails its rule.
//! - [`ValidationMode::Partial`]: only present fields are checked.
//!
//! The validator never rejects an empty partial draft. Callers that require at least one field
//! (partial update) check [`UserDraft::is_empty`] first.

use crate::constants::{EDAD_MAX, EDAD_MIN};
use crate::user::{Field, UserDraft};
use serde_json::Value;
use usuarios_types::{EmailAddress, NonEmptyText};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    Full,
    Partial,
}

struct FieldRule {
    field: Field,
    message: &'static str,
    /// `None` if the field is absent, otherwise whether it satisfies the rule.
    check: fn(&UserDraft) -> Option<bool>,
}

/// A present field passes only if it is a string with non-blank content.
fn non_empty(value: &Option<Value>) -> Option<bool> {
    value
        .as_ref()
        .map(|v| v.as_str().is_some_and(|s| NonEmptyText::new(s).is_ok()))
}

fn check_nombre(draft: &UserDraft) -> Option<bool> {
    non_empty(&draft.nombre)
}

fn check_apellido(draft: &UserDraft) -> Option<bool> {
    non_empty(&draft.apellido)
}

/// Integers only: `29.5`, `"29"` and `null` all fail.
fn check_edad(draft: &UserDraft) -> Option<bool> {
    draft.edad.as_ref().map(|v| {
        v.as_i64()
            .is_some_and(|edad| (EDAD_MIN..=EDAD_MAX).contains(&edad))
    })
}

fn check_email(draft: &UserDraft) -> Option<bool> {
    draft
        .email
        .as_ref()
        .map(|v| v.as_str().is_some_and(|s| EmailAddress::parse(s).is_ok()))
}

fn check_telefono(draft: &UserDraft) -> Option<bool> {
    non_empty(&draft.telefono)
}

static RULES: [FieldRule; 5] = [
    FieldRule {
        field: Field::Nombre,
        message: "El nombre es requerido",
        check: check_nombre,
    },
    FieldRule {
        field: Field::Apellido,
        message: "El apellido es requerido",
        check: check_apellido,
    },
    FieldRule {
        field: Field::Edad,
        message: "La edad debe ser un número entre 0 y 150",
        check: check_edad,
    },
    FieldRule {
        field: Field::Email,
        message: "El email debe tener un formato válido",
        check: check_email,
    },
    FieldRule {
        field: Field::Telefono,
        message: "El teléfono es requerido",
        check: check_telefono,
    },
];

/// Checks `candidate` against the rule table and returns one message per failed rule, in table
/// order. An empty vector means the candidate is valid.
pub fn validate(candidate: &UserDraft, mode: ValidationMode) -> Vec<String> {
    RULES
        .iter()
        .filter(|rule| match ((rule.check)(candidate), mode) {
            (Some(ok), _) => !ok,
            (None, ValidationMode::Full) => true,
            (None, ValidationMode::Partial) => false,
        })
        .map(|rule| rule.message.to_owned())
        .collect()
}

/// The message reported when `field` fails validation.
pub fn rule_message(field: Field) -> &'static str {
    RULES
        .iter()
        .find(|rule| rule.field == field)
        .map(|rule| rule.message)
        .unwrap_or("Datos de usuario inválidos")
}
