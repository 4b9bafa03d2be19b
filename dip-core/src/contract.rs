//! # contract: the deposit transport seam
//!
//! This module defines the single trait ([`DepositTransport`]) through which a
//! packaged archive leaves the process, plus the plain request/response types
//! that cross it.
//!
//! ## Interface & Extensibility
//! - Implement [`DepositTransport`] to send archives somewhere new (the HTTP
//!   client lives in [`crate::sword`]).
//! - The method is async and returns a boxed error for transport failures.
//!   A response with a non-2xx status is *not* a transport failure; the
//!   caller interprets status codes.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers (and the integration
//!   tests) can script responses without a network.

use async_trait::async_trait;
use std::collections::BTreeMap;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Boxed error for failures below HTTP (DNS, TLS, connection reset, ...).
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Everything needed to POST one archive to a collection.
#[derive(Debug, Clone)]
pub struct DepositRequest<'a> {
    pub collection_uri: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    /// Package format identifier, sent as the `Packaging` header.
    pub packaging: &'a str,
    /// File name announced in `Content-Disposition`.
    pub filename: &'a str,
    pub content: &'a [u8],
}

/// The raw outcome of a POST, whatever its status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositResponse {
    pub status: u16,
    /// Header names lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl DepositResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Sends a deposit request to a remote collection.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DepositTransport: Send + Sync {
    async fn post_package<'a>(
        &self,
        req: DepositRequest<'a>,
    ) -> Result<DepositResponse, TransportError>;
}
