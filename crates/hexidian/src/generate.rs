//! Random credentials and temporary numbers.

use rand::Rng;

const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Password of digits and uppercase letters.
pub fn password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// `prefix` followed by `digits` random decimal digits.
pub fn temp_number(prefix: &str, digits: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut number = String::with_capacity(prefix.len() + digits);
    number.push_str(prefix);
    number.extend((0..digits).map(|_| char::from(b'0' + rng.gen_range(0..10u8))));
    number
}
