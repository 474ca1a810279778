//! Integration tests for payload integrity on upload and download.

mod support;

use cloudcmd_core::integrity::{digest_payload, verify_payload};
use cloudcmd_core::{
    Command, ContentDigest, DigestAlgorithm, HttpMethod, HttpRequest, Payload, Verification,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use support::critical_utils::{fast_config, patterned_bytes, reqwest_executor};
use support::socket_guard::start_mock_server_or_skip;

const FIVE_MIB: usize = 5 * 1024 * 1024;
const FIVE_MIB_MD5: &str = "d0e3c0c366651fc4c2057f2961e760b4";
const FIVE_MIB_MD5_BASE64: &str = "0OPAw2ZlH8TCBX8pYedgtA==";
const FIVE_MIB_SHA256: &str = "8fe7b73f659d909daa4328740dd7b0b197b9ac615dbbe82c8bcabcd4ac49148f";

fn write_patterned_file() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let file = dir.path().join("object.bin");
    std::fs::write(&file, patterned_bytes(FIVE_MIB)).expect("write object");
    (dir, file)
}

#[tokio::test]
async fn test_file_payload_digests_match_known_values() {
    let (_dir, file) = write_patterned_file();
    let payload = Payload::from_file(&file).unwrap();

    let md5 = digest_payload(&payload, DigestAlgorithm::Md5).await.unwrap();
    let sha256 = digest_payload(&payload, DigestAlgorithm::Sha256).await.unwrap();

    assert_eq!(md5.to_hex(), FIVE_MIB_MD5);
    assert_eq!(md5.to_base64(), FIVE_MIB_MD5_BASE64);
    assert_eq!(sha256.to_hex(), FIVE_MIB_SHA256);
}

#[tokio::test]
async fn test_verify_payload_detects_single_byte_change() {
    let mut data = patterned_bytes(FIVE_MIB);
    let expected = ContentDigest::from_hex(DigestAlgorithm::Md5, FIVE_MIB_MD5).unwrap();

    let intact = Payload::from_bytes(data.clone());
    assert_eq!(
        verify_payload(&intact, &expected).await.unwrap(),
        Verification::Match
    );

    data[FIVE_MIB / 2] ^= 0xff;
    let corrupted = Payload::from_bytes(data);
    match verify_payload(&corrupted, &expected).await.unwrap() {
        Verification::Mismatch { expected: e, actual } => {
            assert_eq!(e.to_hex(), FIVE_MIB_MD5);
            assert_ne!(actual.to_hex(), FIVE_MIB_MD5);
        }
        Verification::Match => panic!("corruption went undetected"),
    }
}

#[tokio::test]
async fn test_upload_digest_covers_streamed_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("PUT"))
        .and(path("/bucket/object.bin"))
        .and(header("Content-MD5", FIVE_MIB_MD5_BASE64))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, file) = write_patterned_file();
    let declared = ContentDigest::from_hex(DigestAlgorithm::Md5, FIVE_MIB_MD5).unwrap();
    let payload = Payload::from_file(&file).unwrap();
    let metadata = payload.metadata().clone().with_digest(declared);
    let request = HttpRequest::builder(HttpMethod::Put, format!("{}/bucket/object.bin", server.uri()))
        .payload(payload.with_metadata(metadata))
        .build()
        .unwrap();
    let mut command = Command::new(request);

    let response = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let digest = response.request_digest().expect("upload digest");
    assert_eq!(digest.to_hex(), FIVE_MIB_MD5);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body.len(), FIVE_MIB);
    assert_eq!(received[0].body, patterned_bytes(FIVE_MIB));
    server.verify().await;
}

#[tokio::test]
async fn test_download_is_verified_against_declared_md5() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/bucket/object.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-MD5", FIVE_MIB_MD5_BASE64)
                .set_body_bytes(patterned_bytes(FIVE_MIB)),
        )
        .mount(&server)
        .await;
    let mut command =
        Command::new(HttpRequest::get(format!("{}/bucket/object.bin", server.uri())).unwrap());

    let response = reqwest_executor(&fast_config())
        .execute(&mut command)
        .await
        .unwrap();

    let payload = response.into_payload().expect("response body");
    let declared = payload.metadata().digest.clone().expect("Content-MD5 parsed");
    assert_eq!(declared.to_hex(), FIVE_MIB_MD5);
    assert!(verify_payload(&payload, &declared).await.unwrap().is_match());
}
