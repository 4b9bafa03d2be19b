//! Deposit endpoint client.
//!
//! [`DepositClient`] walks `Unconfigured -> Configured -> Submitting ->
//! Succeeded | Failed`. It never retries: submitting again after a failure
//! (or a success) sends the archive again and may create a second remote
//! item.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info};

use crate::contract::{DepositRequest, DepositTransport};
use crate::error::{DipError, DipResult};
use crate::packager::{PackageArtifact, SIMPLE_ZIP};
use crate::receipt::DepositReceipt;

/// A remote collection a package can be deposited into. Holds no password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub collection_uri: String,
    #[serde(default)]
    pub servicedoc_uri: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Package format identifier.
    pub package: String,
}

impl Endpoint {
    pub fn new(collection_uri: impl Into<String>) -> Self {
        Endpoint {
            collection_uri: collection_uri.into(),
            servicedoc_uri: None,
            username: None,
            package: SIMPLE_ZIP.to_string(),
        }
    }

    pub fn with_servicedoc(mut self, servicedoc_uri: Option<String>) -> Self {
        self.servicedoc_uri = servicedoc_uri;
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection_uri={}", self.collection_uri)?;
        if let Some(sd) = &self.servicedoc_uri {
            write!(f, ", servicedoc_uri={sd}")?;
        }
        if let Some(user) = &self.username {
            write!(f, ", username={user}")?;
        }
        write!(f, ", package={}", self.package)
    }
}

/// A password that only ever renders as `*` per character.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Password(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `*` repeated once per character of `secret`.
pub fn obscure(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&obscure(&self.0))
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password({self})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconfigured,
    Configured,
    Submitting,
    Succeeded,
    Failed,
}

pub struct DepositClient<T: DepositTransport> {
    transport: T,
    state: ClientState,
    endpoint: Option<Endpoint>,
    password: Option<Password>,
}

impl<T: DepositTransport> DepositClient<T> {
    pub fn new(transport: T) -> Self {
        DepositClient {
            transport,
            state: ClientState::Unconfigured,
            endpoint: None,
            password: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Selects the collection to deposit into. Credentials are checked at
    /// submit time, not here.
    pub fn configure(&mut self, endpoint: Endpoint, password: Option<Password>) -> DipResult<()> {
        if endpoint.collection_uri.trim().is_empty() {
            return Err(DipError::NoCollection);
        }
        debug!(endpoint = %endpoint, password = ?password, "Configured deposit endpoint");
        self.endpoint = Some(endpoint);
        self.password = password;
        self.state = ClientState::Configured;
        Ok(())
    }

    /// Fails with `NoCollection`, `NoUsername` or `NoPassword` when the
    /// client could not submit yet. Never touches the network.
    pub fn check_credentials(&self) -> DipResult<(&Endpoint, &str, &Password)> {
        let endpoint = self.endpoint.as_ref().ok_or(DipError::NoCollection)?;
        let username = endpoint
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(DipError::NoUsername)?;
        let password = self
            .password
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or(DipError::NoPassword)?;
        Ok((endpoint, username, password))
    }

    /// Sends `artifact` to the configured collection and returns the receipt.
    pub async fn submit(&mut self, artifact: &PackageArtifact) -> DipResult<DepositReceipt> {
        let (collection_uri, username, password) = {
            let (endpoint, username, password) = self.check_credentials()?;
            (endpoint.collection_uri.clone(), username.to_string(), password.clone())
        };

        let content = std::fs::read(&artifact.path).map_err(|e| DipError::io(&artifact.path, e))?;
        let filename = artifact.file_name();
        let request = DepositRequest {
            collection_uri: &collection_uri,
            username: &username,
            password: password.expose(),
            packaging: &artifact.format,
            filename: &filename,
            content: &content,
        };

        info!(
            collection_uri = %collection_uri,
            archive = %artifact.path.display(),
            sha256 = %artifact.sha256,
            bytes = content.len(),
            "Submitting deposit"
        );
        self.state = ClientState::Submitting;
        let outcome = self.transport.post_package(request).await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.state = ClientState::Failed;
                error!(error = %e, "Deposit transport failed");
                return Err(DipError::DepositFailed {
                    status: None,
                    headers: Default::default(),
                    message: e.to_string(),
                });
            }
        };

        if !response.is_success() {
            self.state = ClientState::Failed;
            error!(status = response.status, body = %response.body, "Deposit rejected by server");
            return Err(DipError::DepositFailed {
                status: Some(response.status),
                headers: response.headers,
                message: String::new(),
            });
        }

        self.state = ClientState::Succeeded;
        let receipt = DepositReceipt::from_response(&response);
        info!(
            status = response.status,
            id = receipt.id.as_deref().unwrap_or(""),
            in_progress = receipt.in_progress,
            "Deposit accepted"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{DepositResponse, MockDepositTransport};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn artifact(dir: &std::path::Path) -> PackageArtifact {
        let path = dir.join("SimpleZip.zip");
        std::fs::write(&path, b"PK\x05\x06").unwrap();
        PackageArtifact {
            path,
            format: SIMPLE_ZIP.to_string(),
            basedir: PathBuf::from("/"),
            sha256: "00".to_string(),
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("http://localhost:8080/col-uri/c1")
            .with_username(Some("sword".to_string()))
    }

    #[test]
    fn password_never_displays_in_clear() {
        let password = Password::new("sword");
        assert_eq!(password.to_string(), "*****");
        assert_eq!(format!("{password:?}"), "Password(*****)");
        assert_eq!(password.expose(), "sword");
    }

    #[test]
    fn configure_requires_collection() {
        let mut client = DepositClient::new(MockDepositTransport::new());
        let err = client.configure(Endpoint::new(" "), None).unwrap_err();
        assert!(matches!(err, DipError::NoCollection));
        assert_eq!(client.state(), ClientState::Unconfigured);
    }

    #[tokio::test]
    async fn submit_checks_credentials_before_sending() {
        let dir = tempdir().unwrap();
        let mut transport = MockDepositTransport::new();
        transport.expect_post_package().never();
        let mut client = DepositClient::new(transport);

        let err = client.submit(&artifact(dir.path())).await.unwrap_err();
        assert!(matches!(err, DipError::NoCollection));

        client
            .configure(Endpoint::new("http://localhost:8080/col-uri/c1"), None)
            .unwrap();
        let err = client.submit(&artifact(dir.path())).await.unwrap_err();
        assert!(matches!(err, DipError::NoUsername));

        client.configure(endpoint(), None).unwrap();
        let err = client.submit(&artifact(dir.path())).await.unwrap_err();
        assert!(matches!(err, DipError::NoPassword));
        assert_eq!(client.state(), ClientState::Configured);
    }

    #[test]
    fn credential_check_is_available_before_submitting() {
        let mut client = DepositClient::new(MockDepositTransport::new());
        assert!(matches!(client.check_credentials(), Err(DipError::NoCollection)));

        client.configure(endpoint(), None).unwrap();
        assert!(matches!(client.check_credentials(), Err(DipError::NoPassword)));

        client
            .configure(endpoint(), Some(Password::new("sword")))
            .unwrap();
        let (configured, username, password) = client.check_credentials().unwrap();
        assert_eq!(configured.collection_uri, "http://localhost:8080/col-uri/c1");
        assert_eq!(username, "sword");
        assert_eq!(password.expose(), "sword");
    }

    #[tokio::test]
    async fn server_error_fails_with_status_and_headers() {
        let dir = tempdir().unwrap();
        let mut transport = MockDepositTransport::new();
        transport.expect_post_package().times(1).returning(|_| {
            let mut headers = std::collections::BTreeMap::new();
            headers.insert("content-type".to_string(), "text/plain".to_string());
            Ok(DepositResponse {
                status: 500,
                headers,
                body: "Internal Server Error".to_string(),
            })
        });
        let mut client = DepositClient::new(transport);
        client
            .configure(endpoint(), Some(Password::new("sword")))
            .unwrap();

        let err = client.submit(&artifact(dir.path())).await.unwrap_err();
        match err {
            DipError::DepositFailed {
                status, headers, ..
            } => {
                assert_eq!(status, Some(500));
                assert_eq!(headers.get("content-type").map(String::as_str), Some("text/plain"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[tokio::test]
    async fn transport_error_has_no_status() {
        let dir = tempdir().unwrap();
        let mut transport = MockDepositTransport::new();
        transport
            .expect_post_package()
            .returning(|_| Err("connection refused".into()));
        let mut client = DepositClient::new(transport);
        client
            .configure(endpoint(), Some(Password::new("sword")))
            .unwrap();

        let err = client.submit(&artifact(dir.path())).await.unwrap_err();
        assert!(matches!(err, DipError::DepositFailed { status: None, .. }));
    }

    #[tokio::test]
    async fn success_sends_headers_and_yields_receipt() {
        let dir = tempdir().unwrap();
        let mut transport = MockDepositTransport::new();
        transport
            .expect_post_package()
            .withf(|req: &DepositRequest<'_>| {
                req.username == "sword"
                    && req.password == "sword"
                    && req.filename == "SimpleZip.zip"
                    && req.packaging == SIMPLE_ZIP
            })
            .returning(|_| {
                Ok(DepositResponse {
                    status: 201,
                    headers: Default::default(),
                    body: "<entry xmlns=\"http://www.w3.org/2005/Atom\"><id>http://h/edit/abc</id></entry>"
                        .to_string(),
                })
            });
        let mut client = DepositClient::new(transport);
        client
            .configure(endpoint(), Some(Password::new("sword")))
            .unwrap();

        let receipt = client.submit(&artifact(dir.path())).await.unwrap();
        assert_eq!(receipt.id.as_deref(), Some("http://h/edit/abc"));
        assert_eq!(client.state(), ClientState::Succeeded);
    }
}
