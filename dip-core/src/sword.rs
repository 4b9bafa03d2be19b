//! HTTP transport for SWORD deposits.
//!
//! [`SwordClient`] implements [`DepositTransport`] with a single binary POST
//! of the archive to the collection URI. Every response is handed back as-is,
//! whatever its status; only failures below HTTP become errors.

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use std::collections::BTreeMap;

use crate::contract::{DepositRequest, DepositResponse, DepositTransport, TransportError};

pub const ZIP_MEDIA_TYPE: &str = "application/zip";

pub struct SwordClient {
    http: reqwest::Client,
}

impl SwordClient {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dip-ui/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        tracing::debug!("Initialized SwordClient");
        Ok(SwordClient { http })
    }
}

#[async_trait]
impl DepositTransport for SwordClient {
    async fn post_package<'a>(
        &self,
        req: DepositRequest<'a>,
    ) -> Result<DepositResponse, TransportError> {
        tracing::info!(
            collection_uri = req.collection_uri,
            filename = req.filename,
            packaging = req.packaging,
            bytes = req.content.len(),
            "Posting package to SWORD collection"
        );

        let result = self
            .http
            .post(req.collection_uri)
            .basic_auth(req.username, Some(req.password))
            .header(CONTENT_TYPE, ZIP_MEDIA_TYPE)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename={}", req.filename),
            )
            .header("Packaging", req.packaging)
            .header("In-Progress", "false")
            .body(req.content.to_vec())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = ?e, collection_uri = req.collection_uri, "HTTP error posting package");
                return Err(Box::new(e));
            }
        };

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, "Failed to read deposit response body");
            e
        })?;

        tracing::info!(status, "SWORD collection responded");
        Ok(DepositResponse {
            status,
            headers,
            body,
        })
    }
}
