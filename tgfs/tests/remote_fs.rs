use serde_json::json;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tgfs::attr::DIRECTORY_MODE;
use tgfs::{BackendConfig, ErrorPolicy, FsError, HttpFileSystemService, RemoteFs};

fn remote(url: String, policy: ErrorPolicy) -> RemoteFs<HttpFileSystemService> {
    let service = HttpFileSystemService::new(&BackendConfig::new(url)).unwrap();
    RemoteFs::new(service, policy)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/filesystem")
}

#[tokio::test]
async fn directory_attributes_ignore_stored_privileges() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/filesystem/attributes"))
        .and(body_string("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isDirectory": true,
            "size": 4096,
            "modificationTime": 1_600_000_000
        })))
        .mount(&server)
        .await;

    let fs = remote(format!("{}/filesystem", server.uri()), ErrorPolicy::Strict);
    let attrs = fs.get_attributes("/docs").await.unwrap();
    assert_eq!(attrs.mode, DIRECTORY_MODE);
    assert_eq!(attrs.nlink, 2);
    assert_eq!(attrs.size, 0);
    assert_eq!(attrs.mtime, 1_600_000_000);
}

#[tokio::test]
async fn read_is_clipped_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/filesystem/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
        .mount(&server)
        .await;

    let fs = remote(format!("{}/filesystem", server.uri()), ErrorPolicy::Strict);
    assert_eq!(fs.read("/f", 4, 3).await.unwrap().as_ref(), b"3456");
    assert_eq!(fs.read("/f", 100, 8).await.unwrap().as_ref(), b"89");
    assert!(fs.read("/f", 4, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn strict_policy_reports_unreachable_backend_as_eio() {
    let fs = remote(closed_port_url(), ErrorPolicy::Strict);

    let err = fs.get_attributes("/a").await.unwrap_err();
    assert!(matches!(err, FsError::TransportFailure(_)));
    assert_eq!(err.errno(), libc::EIO);
    assert_eq!(fs.list_directory("/").await.unwrap_err().errno(), libc::EIO);
    assert_eq!(fs.create_directory("/d").await.unwrap_err().errno(), libc::EIO);
}

#[tokio::test]
async fn legacy_policy_hides_unreachable_backend() {
    let fs = remote(closed_port_url(), ErrorPolicy::Legacy);

    assert!(matches!(
        fs.get_attributes("/a").await,
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        fs.list_directory("/").await,
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        fs.create_directory("/d").await,
        Err(FsError::AlreadyExists)
    ));
    // mutations are never conflated
    assert_eq!(fs.delete_file("/a").await.unwrap_err().errno(), libc::EIO);
    fs.release("/a").await;
}
