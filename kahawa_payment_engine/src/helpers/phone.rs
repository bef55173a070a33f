use regex::Regex;

/// Accepts Kenyan mobile numbers in local or international form: `0712345678`, `712345678`, `254712345678`,
/// `+254712345678`. Whitespace is ignored.
pub fn is_valid_mpesa_phone(phone: &str) -> bool {
    let normalized: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let re = Regex::new(r"^(?:\+?254|0)?7\d{8}$").unwrap();
    re.is_match(&normalized)
}

/// Converts a valid Kenyan mobile number to the MSISDN form Daraja expects, e.g. `0712345678` becomes
/// `254712345678`. Call [`is_valid_mpesa_phone`] first; this function does not re-validate.
pub fn normalize_mpesa_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.starts_with("254") {
        digits
    } else {
        format!("254{digits}")
    }
}
