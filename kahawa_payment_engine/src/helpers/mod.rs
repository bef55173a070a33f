mod phone;

pub use phone::{is_valid_mpesa_phone, normalize_mpesa_phone};
