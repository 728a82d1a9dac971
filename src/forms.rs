// 📝 Forms - validation of user input
//
// Every form collects all of its field errors before failing, so a client
// gets the complete picture in one round trip.

use crate::auth;
use crate::entities::{user, User};
use crate::error::{Result, TrackerError};
use crate::recurrence::{self, Occurrences};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const UNKNOWN_USER: &str = "This user name is unknown.";

pub const DESCRIPTION_MAX_LEN: usize = 80;
pub const NAME_MAX_LEN: usize = 80;
pub const USERNAME_MAX_LEN: usize = 30;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

// ============================================================================
// FORM ERRORS
// ============================================================================

/// Messages per field name; `__all__` holds form-wide errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        FormErrors::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Ok(value)` when no error was collected
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Trimmed text with required and maximum length checks
fn char_field(
    errors: &mut FormErrors,
    field: &str,
    value: &str,
    required: bool,
    max_len: usize,
) -> String {
    let value = value.trim();
    let len = value.chars().count();
    if required && value.is_empty() {
        errors.add(field, REQUIRED);
    } else if len > max_len {
        errors.add(
            field,
            &format!(
                "Ensure this value has at most {} characters (it has {}).",
                max_len, len
            ),
        );
    }
    value.to_string()
}

/// Decimal amount; `,` is accepted as decimal separator
pub fn parse_amount(value: &str) -> std::result::Result<f64, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(REQUIRED);
    }
    let amount: f64 = value
        .replace(',', ".")
        .parse()
        .map_err(|_| "Enter a number.")?;
    if !amount.is_finite() {
        return Err("Enter a number.");
    }
    if amount == 0.0 {
        return Err("The amount must be non-zero.");
    }
    Ok(amount)
}

pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(REQUIRED);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| "Enter a valid date.")
}

fn email_field(errors: &mut FormErrors, value: &str, required: bool) -> String {
    let email = char_field(errors, "email", value, required, 254);
    if !email.is_empty() && !EMAIL_RE.is_match(&email) {
        errors.add("email", "Enter a valid email address.");
    }
    email
}

fn password_pair(errors: &mut FormErrors, first: (&str, &str), second: (&str, &str)) -> String {
    let (name1, password1) = first;
    let (name2, password2) = second;
    if password1.is_empty() {
        errors.add(name1, REQUIRED);
    }
    if password2.is_empty() {
        errors.add(name2, REQUIRED);
    }
    if !password1.is_empty() && !password2.is_empty() && password1 != password2 {
        errors.add(name2, PASSWORD_MISMATCH);
    }
    password1.to_string()
}

// ============================================================================
// EXPENDITURE
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExpenditureForm {
    pub amount: String,
    pub date: String,
    pub description: String,

    /// Target purse; the default purse when missing
    pub purse: Option<i64>,

    /// One of the recurrence choices, 1 when missing
    pub occurrences: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanExpenditure {
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub purse_id: Option<i64>,
    pub occurrences: Occurrences,

    /// Dates of the generated copies
    pub other_dates: Vec<NaiveDate>,
}

impl ExpenditureForm {
    /// `purse_choices` are the purses the author belongs to
    pub fn validate(&self, purse_choices: &[i64]) -> std::result::Result<CleanExpenditure, FormErrors> {
        let mut errors = FormErrors::new();

        let amount = parse_amount(&self.amount)
            .map_err(|msg| errors.add("amount", msg))
            .unwrap_or_default();
        let date = parse_date(&self.date).map_err(|msg| errors.add("date", msg)).ok();
        let description = char_field(
            &mut errors,
            "description",
            &self.description,
            true,
            DESCRIPTION_MAX_LEN,
        );

        if let Some(purse_id) = self.purse {
            if !purse_choices.contains(&purse_id) {
                errors.add("purse", INVALID_CHOICE);
            }
        }

        let occurrences = Occurrences::from_count(self.occurrences.unwrap_or(1));
        if occurrences.is_none() {
            errors.add("occurrences", INVALID_CHOICE);
        }

        let mut other_dates = Vec::new();
        if let (Some(start), Some(occurrences)) = (date, occurrences) {
            match recurrence::following_dates(start, occurrences) {
                Ok(dates) => other_dates = dates,
                Err(msg) => errors.add("occurrences", msg),
            }
        }

        match (date, occurrences) {
            (Some(date), Some(occurrences)) if errors.is_empty() => Ok(CleanExpenditure {
                amount,
                date,
                description,
                purse_id: self.purse,
                occurrences,
                other_dates,
            }),
            _ => Err(errors),
        }
    }
}

// ============================================================================
// PURSES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurseForm {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPurse {
    pub name: String,
    pub description: String,
}

impl PurseForm {
    pub fn validate(&self) -> std::result::Result<CleanPurse, FormErrors> {
        let mut errors = FormErrors::new();
        let name = char_field(&mut errors, "name", &self.name, true, NAME_MAX_LEN);
        let description = char_field(
            &mut errors,
            "description",
            &self.description,
            false,
            DESCRIPTION_MAX_LEN,
        );
        errors.into_result(CleanPurse { name, description })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurseShareForm {
    /// Username of the new member
    pub user: String,
}

impl PurseShareForm {
    /// The account to share with
    pub fn validate(&self, conn: &Connection) -> Result<User> {
        let username = self.user.trim();
        if username.is_empty() {
            return Err(TrackerError::field("user", REQUIRED));
        }
        user::find_by_username(conn, username)?
            .ok_or_else(|| TrackerError::field("user", UNKNOWN_USER))
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserCreationForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanUserCreation {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl UserCreationForm {
    pub fn validate(&self, conn: &Connection) -> Result<CleanUserCreation> {
        let mut errors = FormErrors::new();

        let username = char_field(&mut errors, "username", &self.username, true, USERNAME_MAX_LEN);
        if !errors.has("username") {
            if !USERNAME_RE.is_match(&username) {
                errors.add(
                    "username",
                    "This value may contain only letters, numbers and @/./+/-/_ characters.",
                );
            } else if user::username_exists(conn, &username)? {
                errors.add("username", DUPLICATE_USERNAME);
            }
        }

        let email = email_field(&mut errors, &self.email, true);
        let password = password_pair(
            &mut errors,
            ("password1", &self.password1),
            ("password2", &self.password2),
        );

        Ok(errors.into_result(CleanUserCreation {
            username,
            email,
            password,
        })?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserChangeForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub default_purse: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanUserChange {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub default_purse: Option<i64>,
}

impl UserChangeForm {
    /// Prefilled with the current profile
    pub fn from_user(user: &User) -> Self {
        UserChangeForm {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            default_purse: user.default_purse_id,
        }
    }

    /// `purse_choices` are the purses the account belongs to
    pub fn validate(&self, purse_choices: &[i64]) -> std::result::Result<CleanUserChange, FormErrors> {
        let mut errors = FormErrors::new();
        let first_name = char_field(&mut errors, "first_name", &self.first_name, false, 30);
        let last_name = char_field(&mut errors, "last_name", &self.last_name, false, 30);
        let email = email_field(&mut errors, &self.email, false);

        if let Some(purse_id) = self.default_purse {
            if !purse_choices.contains(&purse_id) {
                errors.add("default_purse", INVALID_CHOICE);
            }
        }

        errors.into_result(CleanUserChange {
            first_name,
            last_name,
            email,
            default_purse: self.default_purse,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordChangeForm {
    /// The new password, once the old one is confirmed
    pub fn validate(&self, user: &User) -> std::result::Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        if self.old_password.is_empty() {
            errors.add("old_password", REQUIRED);
        } else if !auth::verify_password(&self.old_password, &user.password_hash) {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        let password = password_pair(
            &mut errors,
            ("new_password1", &self.new_password1),
            ("new_password2", &self.new_password2),
        );
        errors.into_result(password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn validate(&self) -> std::result::Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let password = password_pair(
            &mut errors,
            ("new_password1", &self.new_password1),
            ("new_password2", &self.new_password2),
        );
        errors.into_result(password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> std::result::Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordResetForm {
    pub email: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> std::result::Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let email = email_field(&mut errors, &self.email, true);
        errors.into_result(email)
    }
}

// ============================================================================
// TESTS
// ============================================================================
