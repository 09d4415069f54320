//! Database credentials

use crate::outputs::Outputs;
use rand::Rng;
use rand::distributions::Alphanumeric;

pub const PASSWORD_LENGTH: usize = 32;

/// Password for `database`: the one the previous apply reported, or a fresh one.
///
/// The instance keeps its password across runs only because the rendered definition
/// carries the same value back in. An empty reported password counts as absent.
pub fn fetch_or_generate_password(outputs: &Outputs, database: &str, rng: &mut impl Rng) -> String {
    match outputs.database(database) {
        Some(record) if !record.password.is_empty() => record.password.clone(),
        _ => generate_password(rng),
    }
}

pub fn generate_password(rng: &mut impl Rng) -> String {
    (0..PASSWORD_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
