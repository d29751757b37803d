mod endpoint;

pub use endpoint::*;

/// Liveness probe
pub async fn healthcheck_route() -> &'static str {
    "ok"
}
