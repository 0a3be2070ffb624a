pub mod logging;

use chrono::Utc;
use rand::{thread_rng, Rng};

use crate::models::Role;

/// Generates a role-prefixed account id, e.g. "S493021"
pub fn generate_account_id(role: Role) -> String {
    let mut rng = thread_rng();
    let digits: String = (0..6)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{}{}", role.id_prefix(), digits)
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn epoch_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}
