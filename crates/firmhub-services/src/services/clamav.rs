//! Antivirus scanning through a clamd daemon.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    /// Signature name reported by the scanner.
    Infected(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Antivirus unavailable: {0}")]
    Unavailable(String),

    #[error("Antivirus scan timed out after {0} seconds")]
    Timeout(u64),

    #[error("Unexpected antivirus response: {0}")]
    BadResponse(String),
}

/// Scans file contents before they are published.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    async fn scan(&self, data: &[u8]) -> Result<ScanVerdict, ScanError>;
}

/// Scanner used when ClamAV is turned off. Every file passes.
#[derive(Debug, Clone, Default)]
pub struct DisabledScanner;

#[async_trait]
impl VirusScanner for DisabledScanner {
    async fn scan(&self, _data: &[u8]) -> Result<ScanVerdict, ScanError> {
        tracing::debug!("Antivirus disabled, accepting file unscanned");
        Ok(ScanVerdict::Clean)
    }
}

/// Extract the signature name from a clamd reply such as `stream: Eicar-Signature FOUND`.
pub fn parse_signature(response: &str) -> String {
    response
        .trim()
        .trim_end_matches('\0')
        .rsplit_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(response)
        .trim()
        .trim_end_matches("FOUND")
        .trim()
        .to_string()
}

/// Resolve a scanner failure according to the fail-open/fail-closed policy.
fn apply_policy(fail_closed: bool, err: ScanError) -> Result<ScanVerdict, ScanError> {
    if fail_closed {
        tracing::error!(error = %err, "Antivirus scan failed");
        Err(err)
    } else {
        tracing::warn!(error = %err, "Antivirus scan failed, accepting file (fail-open)");
        Ok(ScanVerdict::Clean)
    }
}

#[cfg(feature = "clamav")]
pub use client::ClamAvScanner;

#[cfg(feature = "clamav")]
mod client {
    use super::*;
    use clamav_client::{clean, Tcp};
    use std::time::Instant;

    /// clamd over TCP. The client library is synchronous, so scans run on the
    /// blocking pool under a timeout.
    #[derive(Debug, Clone)]
    pub struct ClamAvScanner {
        address: String,
        fail_closed: bool,
        timeout: Duration,
    }

    impl ClamAvScanner {
        pub fn new(host: &str, port: u16, fail_closed: bool) -> Self {
            Self::with_timeout(host, port, fail_closed, Duration::from_secs(30))
        }

        pub fn with_timeout(host: &str, port: u16, fail_closed: bool, timeout: Duration) -> Self {
            Self {
                address: format!("{}:{}", host, port),
                fail_closed,
                timeout,
            }
        }

        fn scan_blocking(address: &str, data: &[u8]) -> Result<ScanVerdict, ScanError> {
            let connection = Tcp {
                host_address: address,
            };
            let response = clamav_client::scan_buffer(data, connection, None)
                .map_err(|e| ScanError::Unavailable(e.to_string()))?;
            let is_clean = clean(&response).map_err(|e| ScanError::BadResponse(e.to_string()))?;
            if is_clean {
                Ok(ScanVerdict::Clean)
            } else {
                let text = String::from_utf8_lossy(&response);
                Ok(ScanVerdict::Infected(parse_signature(&text)))
            }
        }
    }

    #[async_trait]
    impl VirusScanner for ClamAvScanner {
        async fn scan(&self, data: &[u8]) -> Result<ScanVerdict, ScanError> {
            let start = Instant::now();
            let address = self.address.clone();
            let data = data.to_vec();
            let size = data.len();

            let outcome = tokio::time::timeout(
                self.timeout,
                tokio::task::spawn_blocking(move || Self::scan_blocking(&address, &data)),
            )
            .await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(join)) => Err(ScanError::Unavailable(format!("scan task failed: {}", join))),
                Err(_) => Err(ScanError::Timeout(self.timeout.as_secs())),
            };

            match result {
                Ok(ScanVerdict::Clean) => {
                    tracing::info!(
                        size_bytes = size,
                        duration_ms = start.elapsed().as_millis(),
                        "File scan completed: clean"
                    );
                    Ok(ScanVerdict::Clean)
                }
                Ok(ScanVerdict::Infected(signature)) => {
                    tracing::warn!(
                        size_bytes = size,
                        duration_ms = start.elapsed().as_millis(),
                        signature = %signature,
                        "File scan detected malware"
                    );
                    Ok(ScanVerdict::Infected(signature))
                }
                Err(err) => apply_policy(self.fail_closed, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature() {
        assert_eq!(
            parse_signature("stream: Eicar-Test-Signature FOUND\0"),
            "Eicar-Test-Signature"
        );
        assert_eq!(parse_signature("stream: Win.Trojan.Agent-1 FOUND"), "Win.Trojan.Agent-1");
    }

    #[test]
    fn test_fail_closed_propagates_errors() {
        let result = apply_policy(true, ScanError::Timeout(30));
        assert!(matches!(result, Err(ScanError::Timeout(30))));
    }

    #[test]
    fn test_fail_open_accepts_file() {
        let result = apply_policy(false, ScanError::Unavailable("refused".to_string()));
        assert_eq!(result.unwrap(), ScanVerdict::Clean);
    }

    #[tokio::test]
    async fn test_disabled_scanner_accepts_everything() {
        let verdict = DisabledScanner.scan(b"X5O!P%@AP").await.unwrap();
        assert_eq!(verdict, ScanVerdict::Clean);
    }

    #[cfg(feature = "clamav")]
    #[tokio::test]
    async fn test_unreachable_daemon_fails_closed() {
        let scanner = ClamAvScanner::with_timeout("127.0.0.1", 1, true, Duration::from_secs(5));
        assert!(scanner.scan(b"hello").await.is_err());
    }
}
