pub mod cart;
pub mod customer;
pub mod delivery;
pub mod order;

/// Backend statuses are opaque upper-snake strings; the client only reformats them.
pub(crate) fn display_status(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "unknown".to_string();
    }
    raw.trim().to_lowercase().replace('_', " ")
}
