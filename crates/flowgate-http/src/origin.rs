//! Origin header validation against a locally-derived allow-list.

use std::collections::HashSet;

use thiserror::Error;

/// The Origin header named a host outside the allow-list.
#[derive(Debug, Error)]
#[error("request origin not allowed")]
pub struct OriginMismatch;

/// Allow-list of scheme+host+port combinations this server answers for.
///
/// Browser clients of a local gateway legitimately present the gateway's own
/// origin or a localhost alias; anything else is suspicious. Mismatches are
/// logged but pass by default; enforcement is an opt-in hardening switch.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
    enforce: bool,
}

impl OriginPolicy {
    /// Derive the allow-list from the configured bind host and port, plus
    /// any extra origins from configuration.
    pub fn new(host: &str, port: u16, extras: &[String], enforce: bool) -> Self {
        let mut allowed = HashSet::new();
        for scheme in ["http", "https"] {
            allowed.insert(format!("{scheme}://{host}:{port}"));
        }
        for local in ["localhost", "127.0.0.1"] {
            allowed.insert(format!("http://{local}:{port}"));
        }
        allowed.extend(extras.iter().cloned());
        Self { allowed, enforce }
    }

    /// Validate an Origin header value. A missing header always passes
    /// (non-browser clients send none); a mismatch is logged and only fails
    /// the request when enforcement is on.
    pub fn check(&self, origin: Option<&str>) -> Result<(), OriginMismatch> {
        let Some(origin) = origin else {
            return Ok(());
        };
        if self.allowed.contains(origin) {
            return Ok(());
        }
        tracing::warn!(origin, "request origin not in local allow-list");
        if self.enforce {
            Err(OriginMismatch)
        } else {
            Ok(())
        }
    }
}
