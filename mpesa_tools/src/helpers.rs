use chrono::{DateTime, Utc};

/// Formats a timestamp the way Daraja wants it: `yyyyMMddHHmmss`.
pub fn daraja_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// The STK push password: `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 1, 9, 5, 30).unwrap();
        assert_eq!(daraja_timestamp(at), "20260801090530");
    }

    #[test]
    fn password_is_base64_of_concatenation() {
        let password = stk_password("174379", "passkey", "20260801090530");
        assert_eq!(password, base64::encode("174379passkey20260801090530"));
        assert_eq!(base64::decode(&password).unwrap(), b"174379passkey20260801090530");
    }
}
