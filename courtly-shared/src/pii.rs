use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for credentials and other sensitive fields: `Debug` and
/// `Display` render as asterisks, serialization passes the value
/// through untouched.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    // The mask only guards log macros; wire payloads carry the value.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Partially masks a phone number for confirmation screens and log
/// lines, keeping the country code and the last four digits visible.
/// Numbers too short to mask meaningfully pass through unchanged.
pub fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return phone.to_string();
    }
    let prefix = &digits[..2];
    let suffix = &digits[digits.len() - 4..];
    format!("+{prefix} ** *** {suffix}")
}
