// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug-endpoint origin validation.
//!
//! Accepted origins are loopback-only, credential-free URLs with a
//! lowercase scheme in {http, https, ws, wss}. Everything stored in a
//! `SessionRecord.cdpOrigin` has passed through [`normalize_cdp_origin`].

use url::Url;

use crate::{Error, ErrorCode};

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];
const LOOPBACK_HOSTS: &[&str] = &["127.0.0.1", "localhost", "[::1]"];

/// Validate and normalize a caller-supplied debug endpoint.
///
/// Returns the normalized origin `scheme://host:port` (explicit port,
/// lowercase). Fails with `E_CDP_INVALID` on any scheme, credential, host,
/// or parse violation.
pub fn normalize_cdp_origin(raw: &str) -> crate::Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::new(ErrorCode::CdpInvalid, format!("invalid cdp url: {e}")))?;

    let scheme = url.scheme().to_ascii_lowercase();
    if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        return Err(Error::new(
            ErrorCode::CdpInvalid,
            format!("unsupported cdp scheme: {scheme}"),
        ));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(Error::new(
            ErrorCode::CdpInvalid,
            "cdp url must not carry credentials",
        ));
    }

    let host = match url.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => {
            return Err(Error::new(ErrorCode::CdpInvalid, "cdp url has no host"));
        }
    };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host
    };
    if !LOOPBACK_HOSTS.contains(&host.as_str()) {
        return Err(Error::new(
            ErrorCode::CdpInvalid,
            format!("cdp host must be loopback, got {host}"),
        ));
    }

    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::new(ErrorCode::CdpInvalid, "cdp url has no port"))?;

    Ok(format!("{scheme}://{host}:{port}"))
}

/// Host and port of a normalized origin, for socket-level probes.
pub fn origin_host_port(origin: &str) -> Option<(String, u16)> {
    let url = Url::parse(origin).ok()?;
    let host = url.host_str()?.trim_matches(['[', ']']).to_string();
    let port = url.port_or_known_default()?;
    Some((host, port))
}

/// Lowercased origin (`scheme://host[:port]`) of an arbitrary page URL,
/// used for lane partitioning of `open` commands. Not a validator: any
/// parseable absolute URL yields an origin.
pub fn origin_of_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let scheme = url.scheme().to_ascii_lowercase();
    match url.port_or_known_default() {
        Some(port) => Some(format!("{scheme}://{host}:{port}")),
        None => Some(format!("{scheme}://{host}")),
    }
}

#[cfg(test)]
#[path = "cdp_tests.rs"]
mod tests;
