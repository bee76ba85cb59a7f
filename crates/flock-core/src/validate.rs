//! Input rules shared by the store and the API layer

use snafu::{Snafu, ensure};

pub const USERNAME_MAX_LEN: usize = 32;
pub const DISPLAY_NAME_MAX_LEN: usize = 64;
pub const BIO_MAX_LEN: usize = 256;
pub const TEXT_MAX_LEN: usize = 280;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ValidationError {
    #[snafu(display("Username must be 1 to {USERNAME_MAX_LEN} characters of a-z, 0-9 or _"))]
    InvalidUsername,
    #[snafu(display("{field} is longer than {max} characters"))]
    TooLong { field: &'static str, max: usize },
    #[snafu(display("{field} must not be empty"))]
    Empty { field: &'static str },
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn username(s: &str) -> ValidationResult<()> {
    ensure!(
        !s.is_empty()
            && s.len() <= USERNAME_MAX_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'),
        InvalidUsernameSnafu
    );
    Ok(())
}

fn max_chars(field: &'static str, s: &str, max: usize) -> ValidationResult<()> {
    ensure!(s.chars().count() <= max, TooLongSnafu { field, max });
    Ok(())
}

pub fn display_name(s: &str) -> ValidationResult<()> {
    max_chars("display name", s, DISPLAY_NAME_MAX_LEN)
}

pub fn bio(s: &str) -> ValidationResult<()> {
    max_chars("bio", s, BIO_MAX_LEN)
}

/// Trim and check text of a post or a quote
pub fn text(s: &str) -> ValidationResult<String> {
    let s = s.trim();
    ensure!(!s.is_empty(), EmptySnafu { field: "text" });
    max_chars("text", s, TEXT_MAX_LEN)?;
    Ok(s.to_owned())
}
