use thiserror::Error;

/// Longest number still treated as national (area code + subscriber).
const NATIONAL_MAX_DIGITS: usize = 11;
/// Shortest and longest accepted international number, country code included.
const MIN_DIGITS: usize = 12;
const MAX_DIGITS: usize = 15;

#[derive(Debug, Error, PartialEq)]
pub enum PhoneError {
    #[error("invalid phone number '{raw}': {digits} digits after normalization")]
    Invalid { raw: String, digits: usize },
}

/// Keep digits only, prefix `country_code` to national numbers, and check
/// the resulting length.
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, PhoneError> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if !digits.is_empty() && digits.len() <= NATIONAL_MAX_DIGITS {
        digits.insert_str(0, country_code);
    }

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err(PhoneError::Invalid { raw: raw.to_string(), digits: digits.len() });
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_numbers_keep_their_prefix() {
        assert_eq!(normalize_phone("+55 (11) 99999-0000", "55").unwrap(), "5511999990000");
        assert_eq!(normalize_phone("+5511999990000", "55").unwrap(), "5511999990000");
    }

    #[test]
    fn national_numbers_get_the_country_code() {
        assert_eq!(normalize_phone("(11) 99999-0000", "55").unwrap(), "5511999990000");
        assert_eq!(normalize_phone("1133334444", "55").unwrap(), "551133334444");
    }

    #[test]
    fn too_short_or_too_long_is_rejected() {
        assert_eq!(
            normalize_phone("123", "55"),
            Err(PhoneError::Invalid { raw: "123".into(), digits: 5 })
        );
        assert!(normalize_phone("", "55").is_err());
        assert!(normalize_phone("1234567890123456", "55").is_err());
    }
}
