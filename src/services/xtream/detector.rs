//! Xtream Codes URL detection.
//!
//! Many "M3U" playlist URLs are really Xtream `get.php` exports. When the
//! credentials can be lifted from the URL the typed Player API is a much
//! better source than parsing the generated M3U, so ingestion upgrades such
//! sources to the Xtream path.

use tracing::debug;
use url::Url;

use super::types::XtreamCredentials;

/// Extract Xtream credentials from an M3U URL.
///
/// Recognized pattern:
/// `http(s)://server[:port]/get.php?username=X&password=Y[&...]`.
/// Returns `None` for anything else; callers then fall back to plain M3U
/// parsing.
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let parsed = match Url::parse(m3u_url) {
        Ok(url) => url,
        Err(e) => {
            debug!(url = m3u_url, error = %e, "not a parseable url");
            return None;
        }
    };

    if !parsed.path().to_lowercase().contains("/get.php") {
        return None;
    }

    let params: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();
    if username.is_empty() || password.is_empty() {
        return None;
    }

    let host = parsed.host_str()?;
    let port_suffix = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let server = format!("{}://{}{}", parsed.scheme(), host, port_suffix);

    debug!(%server, %username, "detected xtream get.php url");

    Some(XtreamCredentials {
        server,
        username,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_credentials_valid() {
        let url = "http://example.com:8080/get.php?username=testuser&password=testpass&type=m3u_plus&output=ts";
        let creds = extract_credentials(url).expect("should extract credentials");

        assert_eq!(creds.server, "http://example.com:8080");
        assert_eq!(creds.username, "testuser");
        assert_eq!(creds.password, "testpass");
    }

    #[test]
    fn test_extract_credentials_https_no_port() {
        let creds =
            extract_credentials("https://secure.example.com/get.php?username=u&password=p")
                .unwrap();
        assert_eq!(creds.server, "https://secure.example.com");
    }

    #[test]
    fn test_extract_credentials_not_xtream() {
        assert!(extract_credentials("http://example.com/playlist.m3u").is_none());
        assert!(
            extract_credentials("http://example.com/api/streams?username=u&password=p").is_none()
        );
    }

    #[test]
    fn test_extract_credentials_missing_params() {
        assert!(extract_credentials("http://example.com/get.php?username=u").is_none());
        assert!(extract_credentials("http://example.com/get.php?password=p").is_none());
    }
}
