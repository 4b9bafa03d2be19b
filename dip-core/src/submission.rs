//! High-level pipeline: validate -> check credentials -> package -> submit -> record.
//!
//! [`deposit`] is the single entrypoint used by the `dip deposit` command and
//! the integration tests. It is fail-fast: the first failing step returns its
//! error and later steps never run. Missing credentials are caught before the
//! package is touched, and a rejected deposit leaves no status record behind. Nothing already done is rolled back (the archive stays
//! under `packages/`, the endpoint stays recorded in the manifest).

use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};

use crate::contract::DepositTransport;
use crate::deposit::{DepositClient, Endpoint, Password};
use crate::error::DipResult;
use crate::package::{self, Package};
use crate::packager::{self, PackageArtifact};
use crate::receipt::DepositReceipt;
use crate::status::StatusTracker;

/// Where and how to deposit.
#[derive(Debug, Clone)]
pub struct DepositOptions {
    pub endpoint: Endpoint,
    pub password: Option<Password>,
    /// Overrides `endpoint.package` when set.
    pub format: Option<String>,
    /// Base for archive paths of content files; defaults to the working directory.
    pub basedir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub artifact: PackageArtifact,
    pub receipt: DepositReceipt,
    pub token: String,
}

pub async fn deposit<T>(
    package: &Package,
    options: DepositOptions,
    client: &mut DepositClient<T>,
    tracker: &StatusTracker,
) -> DipResult<DepositOutcome>
where
    T: DepositTransport,
{
    let span = info_span!("deposit", dip = %package.path().display());
    async move {
        let package = package::validate(package.path())?;
        let mut endpoint = options.endpoint;
        if let Some(format) = options.format {
            endpoint.package = format;
        }

        client.configure(endpoint.clone(), options.password)?;
        client.check_credentials()?;

        let artifact =
            packager::package(&package, Some(&endpoint.package), options.basedir.as_deref())?;
        package.set_endpoint(&endpoint)?;

        let receipt = client.submit(&artifact).await.inspect_err(|e| {
            error!(error = %e, archive = %artifact.path.display(), "Deposit failed");
        })?;
        let token = tracker.record_receipt(&receipt)?;

        info!(token = %token, in_progress = receipt.in_progress, "Deposit complete");
        Ok(DepositOutcome {
            artifact,
            receipt,
            token,
        })
    }
    .instrument(span)
    .await
}
