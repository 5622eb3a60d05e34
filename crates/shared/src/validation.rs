//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Class name (and register number) reserved for staff accounts.
pub const STAFF_CLASS: &str = "Staff";

/// E-mail domain every staff account must use.
pub const STAFF_EMAIL_DOMAIN: &str = "@sst.edu.sg";

/// Number of secondary levels (S1..S4).
const CLASS_LEVELS: u32 = 4;

/// Number of classes per level (01..10).
const CLASSES_PER_LEVEL: u32 = 10;

/// Highest register number in a class.
const MAX_REGISTER_NUMBER: u32 = 30;

lazy_static! {
    /// Student accounts live under a cohort sub-domain, e.g. `jane@s2024.ssts.edu.sg`.
    pub static ref STUDENT_EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@s20\d{2}\.ssts\.edu\.sg$").unwrap();
    pub static ref STAFF_EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@sst\.edu\.sg$").unwrap();
}

fn error(code: &'static str, message: &str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.to_string().into());
    err
}

/// Validates that a free-text value is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("required", "Value must not be blank"))
    } else {
        Ok(())
    }
}

/// Validates a staff e-mail address (`@sst.edu.sg`).
pub fn validate_staff_email(email: &str) -> Result<(), ValidationError> {
    if STAFF_EMAIL_REGEX.is_match(&normalize_email(email)) {
        Ok(())
    } else {
        Err(error("staff_email", "Staff must use @sst.edu.sg email"))
    }
}

/// Validates a student e-mail address (`@s20xx.ssts.edu.sg`).
pub fn validate_student_email(email: &str) -> Result<(), ValidationError> {
    if STUDENT_EMAIL_REGEX.is_match(&normalize_email(email)) {
        Ok(())
    } else {
        Err(error(
            "student_email",
            "Students must use school email ending with @s20xx.ssts.edu.sg",
        ))
    }
}

/// Validates an e-mail address against the rules for the given account kind.
pub fn validate_school_email(email: &str, is_staff: bool) -> Result<(), ValidationError> {
    if is_staff {
        validate_staff_email(email)
    } else {
        validate_student_email(email)
    }
}

/// Trims and lower-cases an e-mail so equality lookups are stable.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// All selectable class names: `S1-01` .. `S4-10`, then `Staff`.
pub fn class_options() -> Vec<String> {
    (1..=CLASS_LEVELS)
        .flat_map(|level| (1..=CLASSES_PER_LEVEL).map(move |class| format!("S{level}-{class:02}")))
        .chain(std::iter::once(STAFF_CLASS.to_string()))
        .collect()
}

/// All selectable register numbers: `01` .. `30`, then `Staff`.
pub fn register_number_options() -> Vec<String> {
    (1..=MAX_REGISTER_NUMBER)
        .map(|n| format!("{n:02}"))
        .chain(std::iter::once(STAFF_CLASS.to_string()))
        .collect()
}

/// Returns true when the class name marks a staff account.
pub fn is_staff_class(class_name: &str) -> bool {
    class_name.trim().eq_ignore_ascii_case(STAFF_CLASS)
}

/// Validates a class name against [`class_options`].
pub fn validate_class_name(class_name: &str) -> Result<(), ValidationError> {
    if is_staff_class(class_name) || class_options().iter().any(|c| c == class_name.trim()) {
        Ok(())
    } else {
        Err(error("class_name", "Class must be one of S1-01 to S4-10 or Staff"))
    }
}

/// Validates a register number against [`register_number_options`].
pub fn validate_register_number(register_number: &str) -> Result<(), ValidationError> {
    let value = register_number.trim();
    if is_staff_class(value) || register_number_options().iter().any(|r| r == value) {
        Ok(())
    } else {
        Err(error(
            "register_number",
            "Register number must be between 01 and 30 or Staff",
        ))
    }
}
