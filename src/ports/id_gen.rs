//! ID generator port for producing unique identifiers.

/// Generates unique identifiers.
///
/// Abstracting ID generation lets healed cassette entries receive stable
/// identifiers during tests by substituting a predictable sequence.
pub trait IdGenerator: Send + Sync {
    /// Generates a new unique identifier string.
    fn generate_id(&self) -> String;
}
