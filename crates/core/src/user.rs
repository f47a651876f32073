//! User record types.
//!
//! [`User`] is the persisted shape. The other types describe what callers may send in:
//!
//! - [`UserDraft`] is the raw, unchecked candidate as it arrives from a request body. Every field
//!   is optional so the same value serves full and partial validation.
//! - [`NewUser`] is a complete, validated set of fields (create and full update).
//! - [`UserPatch`] is a validated subset of fields (partial update).
//! - [`UserCriteria`] is an equality filter for [`UserStore::find`](crate::UserStore::find).
//!
//! None of the input types carry an `id`: identifiers are assigned by the store and never change.

use crate::validation::{rule_message, validate, ValidationMode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use usuarios_id::UserId;

/// A stored user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "SQU7QMTL"))]
    pub id: UserId,
    pub nombre: String,
    pub apellido: String,
    pub edad: u8,
    pub email: String,
    pub telefono: String,
}

/// The validated fields of a user, without an identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub nombre: String,
    pub apellido: String,
    pub edad: u8,
    pub email: String,
    pub telefono: String,
}

impl NewUser {
    /// Attaches an identifier, producing the record to store.
    pub fn with_id(self, id: UserId) -> User {
        User {
            id,
            nombre: self.nombre,
            apellido: self.apellido,
            edad: self.edad,
            email: self.email,
            telefono: self.telefono,
        }
    }
}

/// A validated subset of user fields. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub edad: Option<u8>,
    pub email: Option<String>,
    pub telefono: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.apellido.is_none()
            && self.edad.is_none()
            && self.email.is_none()
            && self.telefono.is_none()
    }

    /// Merges the supplied fields onto `user`.
    pub fn apply(&self, user: &mut User) {
        if let Some(nombre) = &self.nombre {
            user.nombre = nombre.clone();
        }
        if let Some(apellido) = &self.apellido {
            user.apellido = apellido.clone();
        }
        if let Some(edad) = self.edad {
            user.edad = edad;
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(telefono) = &self.telefono {
            user.telefono = telefono.clone();
        }
    }
}

/// An unchecked candidate record as received from a caller.
///
/// Each field holds the raw JSON value so presence and type are judged by the validator rather
/// than by the parser: an absent key is `None`, while an explicit `null`, a number where text is
/// expected or a fractional `edad` are present values that fail their rule. Unknown keys
/// (including `id`) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct UserDraft {
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "Ana"))]
    pub nombre: Option<Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "Ruiz"))]
    pub apellido: Option<Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<i64>, example = 29))]
    pub edad: Option<Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "ana@example.com"))]
    pub email: Option<Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "555-0100"))]
    pub telefono: Option<Value>,
}

/// Any key that appears in the body is present, `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The string inside a present text field, if it is one.
fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// The age inside a present `edad` field, if it is an integer that fits a `u8`.
fn age(value: &Option<Value>) -> Option<u8> {
    value
        .as_ref()
        .and_then(Value::as_i64)
        .and_then(|edad| u8::try_from(edad).ok())
}

impl UserDraft {
    /// True when no field is present at all.
    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.apellido.is_none()
            && self.edad.is_none()
            && self.email.is_none()
            && self.telefono.is_none()
    }

    /// Validates every field as required and converts into a [`NewUser`].
    ///
    /// # Errors
    ///
    /// Returns the validator's messages if any rule fails.
    pub fn into_new_user(self) -> Result<NewUser, Vec<String>> {
        let errors = validate(&self, ValidationMode::Full);
        if !errors.is_empty() {
            return Err(errors);
        }

        match (
            text(self.nombre),
            text(self.apellido),
            age(&self.edad),
            text(self.email),
            text(self.telefono),
        ) {
            (Some(nombre), Some(apellido), Some(edad), Some(email), Some(telefono)) => {
                Ok(NewUser {
                    nombre,
                    apellido,
                    edad,
                    email,
                    telefono,
                })
            }
            // Full validation rejects every missing or mistyped field above.
            _ => Err(vec![rule_message(Field::Edad).to_owned()]),
        }
    }

    /// Validates the present fields and converts into a [`UserPatch`].
    ///
    /// An empty draft converts into an empty patch; rejecting that case is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns the validator's messages if any present field fails its rule.
    pub fn into_patch(self) -> Result<UserPatch, Vec<String>> {
        let errors = validate(&self, ValidationMode::Partial);
        if !errors.is_empty() {
            return Err(errors);
        }

        let edad = if self.edad.is_some() {
            let edad = age(&self.edad).ok_or_else(|| vec![rule_message(Field::Edad).to_owned()])?;
            Some(edad)
        } else {
            None
        };

        Ok(UserPatch {
            nombre: text(self.nombre),
            apellido: text(self.apellido),
            edad,
            email: text(self.email),
            telefono: text(self.telefono),
        })
    }
}

impl From<NewUser> for UserDraft {
    fn from(user: NewUser) -> Self {
        Self {
            nombre: Some(Value::from(user.nombre)),
            apellido: Some(Value::from(user.apellido)),
            edad: Some(Value::from(user.edad)),
            email: Some(Value::from(user.email)),
            telefono: Some(Value::from(user.telefono)),
        }
    }
}

impl From<&User> for UserDraft {
    fn from(user: &User) -> Self {
        Self {
            nombre: Some(Value::from(user.nombre.as_str())),
            apellido: Some(Value::from(user.apellido.as_str())),
            edad: Some(Value::from(user.edad)),
            email: Some(Value::from(user.email.as_str())),
            telefono: Some(Value::from(user.telefono.as_str())),
        }
    }
}

/// Exact-match filter over user fields. Every supplied field must match (AND semantics).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(default)]
pub struct UserCriteria {
    pub id: Option<String>,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub edad: Option<i64>,
    pub email: Option<String>,
    pub telefono: Option<String>,
}

impl UserCriteria {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.nombre.is_none()
            && self.apellido.is_none()
            && self.edad.is_none()
            && self.email.is_none()
            && self.telefono.is_none()
    }

    pub fn matches(&self, user: &User) -> bool {
        fn eq(criterion: &Option<String>, value: &str) -> bool {
            criterion.as_deref().map_or(true, |c| c == value)
        }

        eq(&self.id, user.id.as_str())
            && eq(&self.nombre, &user.nombre)
            && eq(&self.apellido, &user.apellido)
            && self.edad.map_or(true, |edad| edad == i64::from(user.edad))
            && eq(&self.email, &user.email)
            && eq(&self.telefono, &user.telefono)
    }
}

/// The validated user fields, in rule-table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Nombre,
    Apellido,
    Edad,
    Email,
    Telefono,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Nombre,
        Field::Apellido,
        Field::Edad,
        Field::Email,
        Field::Telefono,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Nombre => "nombre",
            Field::Apellido => "apellido",
            Field::Edad => "edad",
            Field::Email => "email",
            Field::Telefono => "telefono",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> UserDraft {
        UserDraft {
            nombre: Some("Ana".into()),
            apellido: Some("Ruiz".into()),
            edad: Some(29.into()),
            email: Some("ana@example.com".into()),
            telefono: Some("555-0100".into()),
        }
    }

    fn stored(id: &str, nombre: &str, edad: u8) -> User {
        User {
            id: UserId::parse(id).unwrap(),
            nombre: nombre.into(),
            apellido: "Ruiz".into(),
            edad,
            email: "ana@example.com".into(),
            telefono: "555-0100".into(),
        }
    }

    #[test]
    fn test_draft_into_new_user() {
        let new_user = ana().into_new_user().unwrap();
        assert_eq!(new_user.nombre, "Ana");
        assert_eq!(new_user.edad, 29);
    }

    #[test]
    fn test_draft_missing_field_is_rejected_in_full_mode() {
        let mut draft = ana();
        draft.telefono = None;
        let errors = draft.into_new_user().unwrap_err();
        assert_eq!(errors, vec!["El teléfono es requerido".to_string()]);
    }

    #[test]
    fn test_draft_into_patch_keeps_only_present_fields() {
        let draft = UserDraft {
            edad: Some(40.into()),
            ..Default::default()
        };
        let patch = draft.into_patch().unwrap();
        assert_eq!(
            patch,
            UserPatch {
                edad: Some(40),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_draft_into_patch_rejects_invalid_present_field() {
        let draft = UserDraft {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(draft.into_patch().is_err());
    }

    #[test]
    fn test_draft_ignores_id_and_unknown_keys() {
        let draft: UserDraft =
            serde_json::from_str(r#"{"id":"HIJACK","nombre":"Ana","extra":true}"#).unwrap();
        assert_eq!(draft.nombre, Some(Value::from("Ana")));
        assert_eq!(draft.edad, None);
        assert_eq!(draft.telefono, None);
    }

    #[test]
    fn test_explicit_null_is_a_present_field() {
        let draft: UserDraft = serde_json::from_str(r#"{"nombre":null,"edad":40}"#).unwrap();
        assert_eq!(draft.nombre, Some(Value::Null));
        assert_eq!(
            draft.into_patch().unwrap_err(),
            vec!["El nombre es requerido".to_string()]
        );

        let draft: UserDraft = serde_json::from_str(r#"{"email":null}"#).unwrap();
        assert!(!draft.is_empty());
        assert_eq!(
            draft.into_patch().unwrap_err(),
            vec!["El email debe tener un formato válido".to_string()]
        );
    }

    #[test]
    fn test_mistyped_fields_fail_their_rule() {
        for edad in ["29.5", "\"29\"", "true"] {
            let body = format!(r#"{{"edad":{edad}}}"#);
            let draft: UserDraft = serde_json::from_str(&body).unwrap();
            assert_eq!(
                draft.into_patch().unwrap_err(),
                vec!["La edad debe ser un número entre 0 y 150".to_string()],
                "edad = {edad}"
            );
        }

        let draft: UserDraft = serde_json::from_str(r#"{"nombre":5}"#).unwrap();
        assert_eq!(
            draft.into_patch().unwrap_err(),
            vec!["El nombre es requerido".to_string()]
        );
    }

    #[test]
    fn test_stored_user_converts_back_into_valid_draft() {
        let user = stored("A1", "Ana", 29);
        let new_user = UserDraft::from(&user).into_new_user().unwrap();
        assert_eq!(new_user.with_id(user.id.clone()), user);
    }

    #[test]
    fn test_patch_apply_merges_only_supplied_fields() {
        let mut user = stored("A1", "Ana", 29);
        let patch = UserPatch {
            edad: Some(40),
            telefono: Some("555-0199".into()),
            ..Default::default()
        };
        patch.apply(&mut user);

        assert_eq!(user.edad, 40);
        assert_eq!(user.telefono, "555-0199");
        assert_eq!(user.nombre, "Ana");
        assert_eq!(user.email, "ana@example.com");
        assert!(!patch.is_empty());
        assert!(UserPatch::default().is_empty());
    }

    #[test]
    fn test_criteria_and_semantics() {
        let user = stored("A1", "Ana", 29);

        assert!(UserCriteria::default().matches(&user));
        assert!(UserCriteria {
            nombre: Some("Ana".into()),
            edad: Some(29),
            ..Default::default()
        }
        .matches(&user));
        assert!(!UserCriteria {
            nombre: Some("Ana".into()),
            edad: Some(30),
            ..Default::default()
        }
        .matches(&user));
        assert!(!UserCriteria {
            nombre: Some("ana".into()),
            ..Default::default()
        }
        .matches(&user));
        assert!(UserCriteria {
            id: Some("A1".into()),
            ..Default::default()
        }
        .matches(&user));
    }

    #[test]
    fn test_user_json_shape() {
        let user = stored("SQU7QMTL", "Ana", 29);
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "SQU7QMTL",
                "nombre": "Ana",
                "apellido": "Ruiz",
                "edad": 29,
                "email": "ana@example.com",
                "telefono": "555-0100"
            })
        );
    }

    #[test]
    fn test_field_names() {
        let names: Vec<_> = Field::ALL.iter().map(|f| f.to_string()).collect();
        assert_eq!(names, ["nombre", "apellido", "edad", "email", "telefono"]);
    }
}
