//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating calendar dates (YYYY-MM-DD)
    static ref DATE_REGEX: Regex = Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").unwrap();

    /// Regex for validating 24-hour clock times (HH:MM)
    static ref TIME_REGEX: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();

    /// Regex for validating usernames (alphanumeric with dots/underscores/dashes, 3-32 chars)
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{2,31}$").unwrap();
}

/// Validate a calendar date string
pub fn validate_date(date: &str) -> Result<(), String> {
    if date.is_empty() {
        return Err("Date is required".to_string());
    }
    if !DATE_REGEX.is_match(date) {
        return Err("Date must be in YYYY-MM-DD format".to_string());
    }
    Ok(())
}

/// Validate a time-of-day string
pub fn validate_time(time: &str) -> Result<(), String> {
    if time.is_empty() {
        return Err("Time is required".to_string());
    }
    if !TIME_REGEX.is_match(time) {
        return Err("Time must be in HH:MM format".to_string());
    }
    Ok(())
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-32 characters: letters, digits, dots, underscores or dashes"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}
