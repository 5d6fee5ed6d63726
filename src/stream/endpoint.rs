//! WebSocket endpoint resolution
//!
//! Relative paths are resolved against the page origin the dashboard is
//! served from: `https` origins map to `wss`, everything else to `ws`.

use url::Url;

use crate::error::{CortexError, Result};

/// Resolve `target` to an absolute WebSocket URL.
///
/// Absolute `ws://`/`wss://` targets are used as given; anything else is
/// treated as a path on `origin`'s host.
pub fn resolve_ws_url(target: &str, origin: &Url) -> Result<Url> {
    let target = target.trim();
    if target.starts_with("ws://") || target.starts_with("wss://") {
        return Ok(Url::parse(target)?);
    }

    let scheme = match origin.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(CortexError::InvalidUrl(format!(
                "page origin must be http or https, got '{}'",
                other
            )))
        }
    };

    let path = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{}", target)
    };

    let mut url = origin.join(&path)?;
    url.set_scheme(scheme)
        .map_err(|_| CortexError::InvalidUrl(format!("cannot use scheme {} for {}", scheme, url)))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_relative_path_on_http_origin() {
        let url = resolve_ws_url("/ws", &origin("http://localhost:8080")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_relative_path_on_https_origin() {
        let url = resolve_ws_url("/ws", &origin("https://cortex.example")).unwrap();
        assert_eq!(url.as_str(), "wss://cortex.example/ws");
    }

    #[test]
    fn test_origin_path_is_replaced() {
        let url = resolve_ws_url("ws", &origin("http://localhost:3000/dashboard/logs")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3000/ws");
    }

    #[test]
    fn test_absolute_target_is_kept() {
        let url =
            resolve_ws_url("wss://backend.example:9443/ws", &origin("http://localhost:8080"))
                .unwrap();
        assert_eq!(url.as_str(), "wss://backend.example:9443/ws");
    }

    #[test]
    fn test_unsupported_origin_scheme() {
        let err = resolve_ws_url("/ws", &origin("file:///tmp/index.html")).unwrap_err();
        assert!(matches!(err, CortexError::InvalidUrl(_)));
    }
}
