use super::filename::{filename_from_headers, filename_from_url};
use crate::error::FetchCacheError;
use crate::utils::is_public_address;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use std::net::IpAddr;
use std::time::Duration;
use url::{Host, Url};

/// What a probe learned about a remote resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    /// Unsanitized name, from `Content-Disposition` or the URL path
    pub candidate_filename: Option<String>,
    /// `Content-Length` of the response, 0 when not reported
    pub declared_size: u64,
}

/// Parse and validate a user-supplied URL.
pub fn parse_remote_url(raw: &str) -> Result<Url, FetchCacheError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchCacheError::invalid_request("URL is empty"));
    }

    let url = Url::parse(raw)
        .map_err(|e| FetchCacheError::invalid_request(format!("URL {raw:?} is invalid: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FetchCacheError::invalid_request(format!(
                "URL scheme {scheme:?} is not supported"
            )));
        }
    }
    if url.host().is_none() {
        return Err(FetchCacheError::invalid_request(format!(
            "URL {raw:?} has no host"
        )));
    }
    Ok(url)
}

/// Reject URLs whose host resolves to anything other than public unicast
/// addresses. Unresolvable hosts are rejected as well.
pub async fn ensure_public_host(url: &Url) -> Result<(), FetchCacheError> {
    let addresses: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![ip.into()],
        Some(Host::Ipv6(ip)) => vec![ip.into()],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| {
                    FetchCacheError::invalid_request(format!(
                        "host {domain:?} could not be resolved: {e}"
                    ))
                })?
                .map(|addr| addr.ip())
                .collect()
        }
        None => Vec::new(),
    };

    if addresses.is_empty() || !addresses.iter().copied().all(is_public_address) {
        tracing::warn!(url = %url, ?addresses, "Rejected URL resolving to a non-public address");
        return Err(FetchCacheError::invalid_request(
            "URL resolves to a private or reserved address",
        ));
    }
    Ok(())
}

/// Issue a short GET for the resource and read only its headers.
pub async fn probe(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<ProbeResult, FetchCacheError> {
    let unreachable = |reason: String| FetchCacheError::UpstreamUnreachable {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("remote responded with {status}")));
    }

    let headers = response.headers();
    let declared_size = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let candidate_filename = filename_from_headers(headers).or_else(|| filename_from_url(url));

    tracing::debug!(
        url = %url,
        %status,
        declared_size,
        candidate = ?candidate_filename,
        "Probed remote source"
    );

    // Dropping the response abandons the body without reading it.
    Ok(ProbeResult {
        candidate_filename,
        declared_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_url_accepts_http_and_https() {
        assert!(parse_remote_url("https://example.com/report.pdf").is_ok());
        assert!(parse_remote_url("  http://example.com/a.bin ").is_ok());
    }

    #[test]
    fn test_parse_remote_url_rejects_invalid_input() {
        for raw in ["", "   ", "not a url", "ftp://example.com/a.bin", "file:///etc/passwd"] {
            assert!(
                matches!(
                    parse_remote_url(raw),
                    Err(FetchCacheError::InvalidRequest { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_ensure_public_host_rejects_literal_private_addresses() {
        for raw in [
            "http://127.0.0.1/a.bin",
            "http://10.0.0.5/a.bin",
            "http://[::1]/a.bin",
            "http://169.254.169.254/latest/meta-data",
        ] {
            let url = parse_remote_url(raw).unwrap();
            assert!(
                matches!(
                    ensure_public_host(&url).await,
                    Err(FetchCacheError::InvalidRequest { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_ensure_public_host_accepts_literal_public_address() {
        let url = parse_remote_url("http://93.184.216.34/a.bin").unwrap();

        assert!(ensure_public_host(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_public_host_rejects_localhost_name() {
        let url = parse_remote_url("http://localhost:8080/a.bin").unwrap();

        assert!(ensure_public_host(&url).await.is_err());
    }
}
