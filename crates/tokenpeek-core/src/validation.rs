//! Login form validation.
//!
//! Pure functions from raw form state to either a validated login or a
//! field-keyed error map. Nothing here touches the network or the terminal,
//! so the UI can re-run validation on every keystroke.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use secrecy::SecretString;
use thiserror::Error;

/// Local part, `@`, domain with at least one dot. No whitespace anywhere.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Maximum length for email input (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
pub const MAX_PASSWORD_LENGTH: usize = 128;

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
}

/// Form fields that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Email,
    Password,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Email => "Email",
            Field::Password => "Password",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Enter a valid email")]
    EmailFormat,

    #[error("Password is required")]
    PasswordRequired,
}

impl ValidationError {
    /// The field this error is rendered under
    pub fn field(&self) -> Field {
        match self {
            ValidationError::EmailRequired | ValidationError::EmailFormat => Field::Email,
            ValidationError::PasswordRequired => Field::Password,
        }
    }
}

/// Validation errors keyed by field, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, ValidationError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, error: ValidationError) {
        self.0.insert(error.field(), error);
    }

    pub fn remove(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn get(&self, field: Field) -> Option<&ValidationError> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First field in form order that has an error
    pub fn first_field(&self) -> Option<Field> {
        self.0.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &ValidationError)> {
        self.0.iter().map(|(f, e)| (*f, e))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.values().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Raw form state as typed by the user
#[derive(Clone, Default)]
pub struct LoginFormInput {
    pub email: String,
    pub password: String,
}

impl LoginFormInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginFormInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginFormInput")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A login form that passed every rule.
#[derive(Debug)]
pub struct ValidatedLogin {
    pub email: String,
    pub password: SecretString,
}

/// Validate an email address, returning the trimmed value.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    let matches = email_regex().is_some_and(|re| re.is_match(email));
    if !matches {
        return Err(ValidationError::EmailFormat);
    }
    Ok(email.to_string())
}

/// Validate a password. Only emptiness is checked.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    Ok(())
}

/// Validate the whole form, collecting an error for every failing field.
pub fn validate_login(input: &LoginFormInput) -> Result<ValidatedLogin, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = match validate_email(&input.email) {
        Ok(email) => Some(email),
        Err(e) => {
            errors.insert(e);
            None
        }
    };

    if let Err(e) = validate_password(&input.password) {
        errors.insert(e);
    }

    match email {
        Some(email) if errors.is_empty() => Ok(ValidatedLogin {
            email,
            password: SecretString::from(input.password.clone()),
        }),
        _ => Err(errors),
    }
}

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted.
/// `current_len` is the field length in characters.
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}
