use rand::{distributions::Alphanumeric, Rng};

pub const ORDER_NUMBER_PREFIX: &str = "ORD-";
const ORDER_NUMBER_SUFFIX_LEN: usize = 10;

/// Generates an opaque order number like `ORD-7F2K9QZX41`.
///
/// Uniqueness is enforced by the orders table, not here; a collision surfaces as a retryable conflict and the
/// next intake attempt draws a fresh number. Uppercase only, since the number ends up on receipts and in
/// support calls.
pub fn new_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{ORDER_NUMBER_PREFIX}{suffix}")
}
