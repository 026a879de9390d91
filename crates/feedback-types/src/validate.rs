//! Field-level checks applied to request bodies before they reach the stores.
//!
//! The same rule tables back both validation and the form schemas served to
//! clients, so the two cannot drift apart.

use serde::Serialize;
use thiserror::Error;

use crate::api::{FeedbackRequest, LoginRequest, RegisterRequest};

pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 8;
pub const EMAIL_MAX: usize = 50;
pub const NAME_MAX: usize = 30;
pub const TITLE_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Password,
    Email,
    TextArea,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldRule {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Length errors name the field ("Username cannot ...") instead of the
    /// generic "Field cannot ...".
    #[serde(skip)]
    pub named_errors: bool,
}

impl FieldRule {
    const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
            min_length: None,
            max_length: None,
            named_errors: false,
        }
    }

    const fn named(mut self) -> Self {
        self.named_errors = true;
        self
    }

    const fn min(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    const fn max(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Lengths count characters, not bytes.
    fn check(&self, value: &str) -> Option<String> {
        if self.required && value.trim().is_empty() {
            return Some("This field is required.".to_string());
        }

        let subject = if self.named_errors { self.label } else { "Field" };
        let len = value.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                return Some(format!("{} must be at least {} characters.", subject, min));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Some(format!("{} cannot be longer than {} characters.", subject, max));
            }
        }
        None
    }
}

pub static REGISTER_FIELDS: [FieldRule; 5] = [
    FieldRule::required("username", "Username", FieldKind::Text).max(USERNAME_MAX).named(),
    FieldRule::required("password", "Password", FieldKind::Password).min(PASSWORD_MIN).named(),
    FieldRule::required("email", "Email", FieldKind::Email).max(EMAIL_MAX),
    FieldRule::required("first_name", "First name", FieldKind::Text).max(NAME_MAX),
    FieldRule::required("last_name", "Last name", FieldKind::Text).max(NAME_MAX),
];

pub static LOGIN_FIELDS: [FieldRule; 2] = [
    FieldRule::required("username", "Username", FieldKind::Text).max(USERNAME_MAX).named(),
    FieldRule::required("password", "Password", FieldKind::Password).min(PASSWORD_MIN).named(),
];

pub static FEEDBACK_FIELDS: [FieldRule; 2] = [
    FieldRule::required("title", "Title", FieldKind::Text).max(TITLE_MAX),
    FieldRule::required("content", "Content", FieldKind::TextArea),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("validation failed on {} field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

fn check_all(rules: &[FieldRule], values: &[&str]) -> Result<(), ValidationErrors> {
    let errors: Vec<FieldError> = rules
        .iter()
        .zip(values)
        .filter_map(|(rule, value)| {
            rule.check(value).map(|message| FieldError {
                field: rule.name.to_string(),
                message,
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

/// First character upper-cased, the rest lower-cased: "mcDONALD" becomes "Mcdonald".
///
/// The result can be longer than the input ("ß" upper-cases to "SS"), so name
/// limits are checked on the capitalized form.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Check first and last name exactly as they will be stored.
pub fn validate_stored_names(first_name: &str, last_name: &str) -> Result<(), ValidationErrors> {
    check_all(&REGISTER_FIELDS[3..], &[first_name, last_name])
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let first_name = capitalize(&self.first_name);
        let last_name = capitalize(&self.last_name);
        check_all(
            &REGISTER_FIELDS,
            &[
                self.username.as_str(),
                self.password.as_str(),
                self.email.as_str(),
                first_name.as_str(),
                last_name.as_str(),
            ],
        )
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        check_all(&LOGIN_FIELDS, &[self.username.as_str(), self.password.as_str()])
    }
}

impl FeedbackRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        check_all(&FEEDBACK_FIELDS, &[self.title.as_str(), self.content.as_str()])
    }
}
