mod common;

use dip_core::contract::{DepositRequest, DepositResponse, MockDepositTransport};
use dip_core::deposit::{ClientState, DepositClient, Endpoint, Password};
use dip_core::error::DipError;
use dip_core::package;
use dip_core::registry::add_files;
use dip_core::status::{DepositStatus, StatusTracker};
use dip_core::submission::{deposit, DepositOptions};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use common::write_fixture_files;

const COLLECTION: &str = "http://localhost:8080/col-uri/da9b9feb-4266-446a-8847-46f6c30b55ff";

fn receipt_body(id: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<entry xmlns="http://www.w3.org/2005/Atom" xmlns:sword="http://purl.org/net/sword/terms/">
  <title>SWORD Deposit</title>
  <id>{id}</id>
  <updated>2014-04-02T10:00:00Z</updated>
  <content type="application/zip" src="http://localhost:8080/cont-uri/abc"/>
  <link rel="edit" href="{id}"/>
  <sword:packaging>http://purl.org/net/sword/package/SimpleZip</sword:packaging>
</entry>"#
    )
}

fn options(base: &Path) -> DepositOptions {
    DepositOptions {
        endpoint: Endpoint::new(COLLECTION).with_username(Some("sword".to_string())),
        password: Some(Password::new("sword")),
        format: None,
        basedir: Some(base.to_path_buf()),
    }
}

#[tokio::test]
async fn deposit_records_receipt_under_token() {
    let root = tempdir().unwrap();
    let config = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    add_files(&pkg, &[PathBuf::from("files")], true, root.path(), |_| {}).unwrap();

    let mut transport = MockDepositTransport::new();
    transport
        .expect_post_package()
        .times(1)
        .withf(|req: &DepositRequest<'_>| {
            req.collection_uri == COLLECTION && req.content.starts_with(b"PK")
        })
        .returning(|_| {
            Ok(DepositResponse {
                status: 201,
                headers: BTreeMap::from([(
                    "location".to_string(),
                    "http://localhost:8080/edit-uri/abc".to_string(),
                )]),
                body: receipt_body("http://localhost:8080/edit-uri/abc"),
            })
        });

    let mut client = DepositClient::new(transport);
    let tracker = StatusTracker::new(config.path());
    let outcome = deposit(&pkg, options(root.path()), &mut client, &tracker)
        .await
        .unwrap();

    assert_eq!(outcome.token, "abc");
    assert_eq!(client.state(), ClientState::Succeeded);
    assert!(config.path().join("deposit_status/abc").is_file());
    assert_eq!(
        tracker.query_status("abc").unwrap(),
        DepositStatus::Complete {
            location: Some("http://localhost:8080/cont-uri/abc".to_string())
        }
    );

    let summary = pkg.summary().unwrap();
    assert_eq!(summary.endpoint.unwrap().collection_uri, COLLECTION);
}

#[tokio::test]
async fn server_error_leaves_no_status_record() {
    let root = tempdir().unwrap();
    let config = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    add_files(&pkg, &[PathBuf::from("files")], true, root.path(), |_| {}).unwrap();

    let mut transport = MockDepositTransport::new();
    transport.expect_post_package().times(1).returning(|_| {
        Ok(DepositResponse {
            status: 500,
            headers: BTreeMap::new(),
            body: String::new(),
        })
    });

    let mut client = DepositClient::new(transport);
    let tracker = StatusTracker::new(config.path());
    let err = deposit(&pkg, options(root.path()), &mut client, &tracker)
        .await
        .unwrap_err();

    assert!(matches!(err, DipError::DepositFailed { status: Some(500), .. }));
    assert_eq!(err.status_code(), 77);
    assert_eq!(client.state(), ClientState::Failed);
    assert!(!config.path().join("deposit_status").exists());
}

#[tokio::test]
async fn receipt_without_usable_id_is_rejected() {
    let root = tempdir().unwrap();
    let config = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();

    let mut transport = MockDepositTransport::new();
    transport.expect_post_package().returning(|_| {
        Ok(DepositResponse {
            status: 201,
            headers: BTreeMap::new(),
            body: receipt_body("urn-without-separator"),
        })
    });

    let mut client = DepositClient::new(transport);
    let tracker = StatusTracker::new(config.path());
    let err = deposit(&pkg, options(root.path()), &mut client, &tracker)
        .await
        .unwrap_err();
    assert!(matches!(err, DipError::MalformedIdentifier { .. }));
}

#[tokio::test]
async fn missing_password_stops_before_the_network() {
    let root = tempdir().unwrap();
    let config = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();

    let mut transport = MockDepositTransport::new();
    transport.expect_post_package().never();

    let mut client = DepositClient::new(transport);
    let tracker = StatusTracker::new(config.path());
    let mut opts = options(root.path());
    opts.password = None;
    let err = deposit(&pkg, opts, &mut client, &tracker).await.unwrap_err();
    assert!(matches!(err, DipError::NoPassword));

    assert_eq!(fs::read_dir(pkg.packages_dir()).unwrap().count(), 0);
    assert!(pkg.summary().unwrap().endpoint.is_none());
}

#[tokio::test]
async fn missing_username_leaves_the_package_untouched() {
    let root = tempdir().unwrap();
    let config = tempdir().unwrap();
    write_fixture_files(root.path());
    let pkg = package::create(&root.path().join("testdip")).unwrap();
    add_files(&pkg, &[PathBuf::from("files")], true, root.path(), |_| {}).unwrap();
    let manifest_before = fs::read(pkg.manifest_path()).unwrap();

    let mut transport = MockDepositTransport::new();
    transport.expect_post_package().never();

    let mut client = DepositClient::new(transport);
    let tracker = StatusTracker::new(config.path());
    let mut opts = options(root.path());
    opts.endpoint.username = None;
    let err = deposit(&pkg, opts, &mut client, &tracker).await.unwrap_err();
    assert!(matches!(err, DipError::NoUsername));

    assert_eq!(fs::read_dir(pkg.packages_dir()).unwrap().count(), 0);
    assert_eq!(fs::read(pkg.manifest_path()).unwrap(), manifest_before);
}
