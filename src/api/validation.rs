//! Input validation for API requests.
//!
//! Validators return `Err(message)` describing the first problem found; the
//! handlers collect them with `ValidationErrorBuilder`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email check: one @, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    ).unwrap();

    /// Digits with optional leading +, spaces, dashes, dots and parentheses
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()./-]{7,20}$").unwrap();

    /// 24h clock time, e.g. 09:30
    static ref TIME_REGEX: Regex = Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap();

    static ref HTTP_URL_REGEX: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LENGTH
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_uppercase {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lowercase {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    let common_passwords = ["password1", "welcome1", "qwerty123", "letmein1", "changeme1"];
    let lower = password.to_lowercase();
    if common_passwords.iter().any(|common| lower == *common) {
        return Err("Password is too common. Please choose a stronger password.".to_string());
    }

    Ok(())
}

/// Required free-text field with a length cap
pub fn validate_required(value: &str, label: &str, max: usize) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", label));
    }

    if value.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }

    Ok(())
}

/// Optional free-text field with a length cap
pub fn validate_optional(value: &Option<String>, label: &str, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    match phone.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(p) if PHONE_REGEX.is_match(p) => Ok(()),
        Some(_) => Err("Invalid phone number".to_string()),
    }
}

/// Booking date: `YYYY-MM-DD`, not in the past relative to `today`
pub fn validate_booking_date(date: &str, today: chrono::NaiveDate) -> Result<(), String> {
    let parsed = chrono::NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| "Date must be in YYYY-MM-DD format".to_string())?;

    if parsed < today {
        return Err("Date cannot be in the past".to_string());
    }

    Ok(())
}

pub fn validate_time(time: &Option<String>) -> Result<(), String> {
    match time.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(t) if TIME_REGEX.is_match(t) => Ok(()),
        Some(_) => Err("Time must be in HH:MM format".to_string()),
    }
}

pub fn validate_image_url(url: &Option<String>) -> Result<(), String> {
    match url.as_deref().map(str::trim) {
        None | Some("") => Ok(()),
        Some(u) if u.len() > 2048 => Err("Image URL is too long (max 2048 characters)".to_string()),
        Some(u) if HTTP_URL_REGEX.is_match(u) || u.starts_with('/') => Ok(()),
        Some(_) => Err("Image URL must be an http(s) URL or a site path".to_string()),
    }
}

/// Trim an optional field, treating blank input as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Validate a UUID path parameter
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("first.last+tag@studio.co.uk").is_ok());
        assert!(validate_email(" a@example.com ").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("plainaddress").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("a@@example.com").is_err());
    }

    #[test]
    fn test_validate_password_strength() {
        assert!(validate_password_strength("Passw0rd!").is_ok());
        assert!(validate_password_strength("Abcdefg1").is_ok());

        assert!(validate_password_strength("Sh0rt").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("ALLUPPERCASE1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
        assert!(validate_password_strength("Password1").is_err());
        assert!(validate_password_strength(&"Aa1".repeat(50)).is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Hello", "Name", 10).is_ok());
        assert!(validate_required("   ", "Name", 10).is_err());
        assert!(validate_required("a very long name", "Name", 10).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(&None).is_ok());
        assert!(validate_phone(&Some("".to_string())).is_ok());
        assert!(validate_phone(&Some("+1 (555) 123-4567".to_string())).is_ok());
        assert!(validate_phone(&Some("call me".to_string())).is_err());
    }

    #[test]
    fn test_validate_booking_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(validate_booking_date("2024-06-01", today).is_ok());
        assert!(validate_booking_date("2024-07-15", today).is_ok());
        assert!(validate_booking_date("2024-05-31", today).is_err());
        assert!(validate_booking_date("06/15/2024", today).is_err());
        assert!(validate_booking_date("2024-02-30", today).is_err());
    }

    #[test]
    fn test_validate_time() {
        assert!(validate_time(&Some("09:30".to_string())).is_ok());
        assert!(validate_time(&Some("23:59".to_string())).is_ok());
        assert!(validate_time(&Some("24:00".to_string())).is_err());
        assert!(validate_time(&Some("9am".to_string())).is_err());
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url(&None).is_ok());
        assert!(validate_image_url(&Some("https://cdn.example.com/a.jpg".to_string())).is_ok());
        assert!(validate_image_url(&Some("/uploads/a.jpg".to_string())).is_ok());
        assert!(validate_image_url(&Some("javascript:alert(1)".to_string())).is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Ada ".into())), Some("Ada".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "id").is_ok());
        assert!(validate_uuid("not-a-uuid", "id").is_err());
    }
}
