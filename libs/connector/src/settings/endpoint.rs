//! MongoDB connection string checks
//!
//! Format: `mongodb://[username:password@]host1[:port1][,...hostN[:portN]][/[database][?options]]`
//! or `mongodb+srv://[username:password@]host[/[database][?options]]`.

#[cfg(not(feature = "mongodb"))]
use once_cell::sync::Lazy;
#[cfg(not(feature = "mongodb"))]
use regex::Regex;

#[cfg(not(feature = "mongodb"))]
const STANDARD_SCHEME: &str = "mongodb://";
#[cfg(not(feature = "mongodb"))]
const SRV_SCHEME: &str = "mongodb+srv://";

#[cfg(not(feature = "mongodb"))]
static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9%._-]+)(?::(?P<port>\d{1,5}))?$")
        .expect("host pattern is valid")
});

/// Returns true when `value` is a syntactically valid MongoDB connection string.
///
/// With the `mongodb` feature the driver's own parser decides, so a stored
/// endpoint is always one the driver accepts. Nothing is resolved or
/// contacted either way.
pub fn is_connection_string(value: &str) -> bool {
    if value.trim() != value || value.is_empty() {
        return false;
    }

    #[cfg(feature = "mongodb")]
    {
        mongodb::options::ConnectionString::parse(value).is_ok()
    }

    #[cfg(not(feature = "mongodb"))]
    {
        has_connection_string_shape(value)
    }
}

/// Scheme, userinfo and host-list check used without the driver.
#[cfg(not(feature = "mongodb"))]
fn has_connection_string_shape(value: &str) -> bool {
    let (rest, srv) = if let Some(rest) = value.strip_prefix(SRV_SCHEME) {
        (rest, true)
    } else if let Some(rest) = value.strip_prefix(STANDARD_SCHEME) {
        (rest, false)
    } else {
        return false;
    };

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    let hosts = match authority.rsplit_once('@') {
        Some((userinfo, hosts)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            if user.is_empty() {
                return false;
            }
            hosts
        }
        None => authority,
    };

    if hosts.is_empty() {
        return false;
    }

    let entries: Vec<&str> = hosts.split(',').collect();
    if srv && entries.len() != 1 {
        return false;
    }

    entries.iter().all(|host| valid_host(host, srv))
}

/// Connection string with any password masked, for logging.
pub fn redact(value: &str) -> String {
    let Some((scheme, rest)) = value.split_once("://") else {
        return value.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    match authority.rsplit_once('@') {
        Some((userinfo, hosts)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{hosts}{tail}")
        }
        None => value.to_string(),
    }
}

#[cfg(not(feature = "mongodb"))]
fn valid_host(host: &str, srv: bool) -> bool {
    let Some(captures) = HOST.captures(host) else {
        return false;
    };

    match captures.name("port") {
        Some(_) if srv => false,
        Some(port) => matches!(port.as_str().parse::<u32>(), Ok(1..=65535)),
        None => true,
    }
}
