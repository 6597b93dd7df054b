//! Owner string derivation.

/// Resolves the owner string recorded with every write.
///
/// A configured owner wins. Otherwise one is synthesized per acquisition from
/// the environment; the format is informational and not part of the protocol.
pub(crate) fn derive_owner(configured: Option<&str>) -> String {
    match configured {
        Some(owner) => owner.to_string(),
        None => synthesized_owner(),
    }
}

fn synthesized_owner() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!(
        "{}-{}_{}@{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        user,
        host
    )
}
