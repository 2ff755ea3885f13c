pub mod metrics;

/// Identity line served at `/`.
pub const BANNER: &str = "netexp\n";

// ─── GET / ───────────────────────────────────────────────────────

pub async fn index() -> &'static str {
    BANNER
}
