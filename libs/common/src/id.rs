use ulid::Ulid;

/// Well-known ID prefixes.
pub mod prefix {
    pub const CONNECTION: &str = "conn";
}

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = roomcast_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true if `id` is `<prefix>_<ulid>` with a well-formed ULID body.
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|body| Ulid::from_string(body).is_ok())
}

/// Identifier generator for logical client connections.
pub struct ConnectionId;

impl ConnectionId {
    pub fn generate() -> String {
        prefixed_ulid(prefix::CONNECTION)
    }

    pub fn is_valid(id: &str) -> bool {
        has_prefix(id, prefix::CONNECTION)
    }
}
