use aztags_cli::capability::{download_capabilities, load_capabilities};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TAG_SUPPORT_CSV: &str = "providerName,resourceType,supportsTags
Microsoft.Web,sites,true
Microsoft.Web,sites/slots,false
Microsoft.Resources,resourceGroups,true
";

#[tokio::test]
async fn downloads_and_parses_tag_support_table() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tag-support.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TAG_SUPPORT_CSV))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/tag-support.csv", mock_server.uri());
    let table = download_capabilities(&url).await.expect("download");
    assert_eq!(table.len(), 3);
    assert_eq!(table.supports_tags("microsoft.web/sites"), Some(true));
    assert_eq!(table.supports_tags("microsoft.web/sites/slots"), Some(false));
}

#[tokio::test]
async fn http_error_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let url = format!("{}/tag-support.csv", mock_server.uri());
    let err = download_capabilities(&url).await.expect_err("404 fails");
    assert!(format!("{err:#}").contains("HTTP 404"));
}

#[tokio::test]
async fn unexpected_header_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("provider,type,tags\na,b,true\n"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/tag-support.csv", mock_server.uri());
    assert!(download_capabilities(&url).await.is_err());
}

#[tokio::test]
async fn local_file_skips_download() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let file = dir.path().join("tag-support.csv");
    std::fs::write(&file, TAG_SUPPORT_CSV).expect("write csv");

    // The URL is never contacted when a file is given.
    let table = load_capabilities(Some(file.as_path()), "http://127.0.0.1:9/unused.csv")
        .await
        .expect("local table");
    assert_eq!(table.supports_tags("microsoft.resources/resourcegroups"), Some(true));
}
