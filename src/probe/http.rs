//! HTTP probe implementation.

use super::{Probe, ProbeError, ProbeReading};
use std::time::{Duration, Instant};

/// Probe that issues a `GET` and times the full response.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else {
            ProbeError::Network(e.to_string())
        }
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, target: &str) -> Result<ProbeReading, ProbeError> {
        let url = normalize_url(target);

        let start = Instant::now();
        let response = self.client.get(&url).send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();

        // Read the full body to measure complete transfer time
        let _body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(ProbeReading {
            elapsed: start.elapsed(),
            status,
        })
    }
}

/// Default to plain HTTP when no scheme is given.
pub fn normalize_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com/x"), "https://example.com/x");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url() {
        let probe = HttpProbe::new(Duration::from_millis(100)).unwrap();
        let result = probe.probe("http://256.256.256.256").await;
        assert!(result.is_err());
    }
}
