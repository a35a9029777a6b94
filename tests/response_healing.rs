//! End-to-end response healing against the queue-service envelope.
//!
//! All traffic is replayed from cassettes; a transport that panics on use
//! proves healing never performs a live round-trip.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use tapedeck::adapters::live::LiveFileSystem;
use tapedeck::adapters::SequenceIdGenerator;
use tapedeck::ports::http::{HttpTransport, Protocol, TransportFuture, TransportRequest};
use tapedeck::{HealSetting, RecorderContext, RecorderOptions, RequestRecorder};

static LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

const SQS_SCOPE: &str = "https://sqs.us-west-2.amazonaws.com:443";

struct NoNetwork;

impl HttpTransport for NoNetwork {
    fn send(&self, _request: &TransportRequest) -> TransportFuture<'_> {
        Box::pin(async { panic!("healing must not perform live network calls") })
    }
}

fn recorder(folder: &Path) -> RequestRecorder {
    let ctx = RecorderContext {
        transport: Arc::new(NoNetwork),
        fs: Arc::new(LiveFileSystem),
        ids: Arc::new(SequenceIdGenerator::new("d28095c6-19f4-4dc2-a7cc-f7640c032967")),
    };
    RequestRecorder::with_context(
        RecorderOptions::new(folder)
            .strip_headers(true)
            .heal(HealSetting::parse("magic").unwrap()),
        ctx,
    )
}

fn temp_folder(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_cassette(folder: &Path, entries: Vec<Value>) {
    let content = serde_json::to_string_pretty(&Value::Array(entries)).unwrap();
    std::fs::write(folder.join("recording.json"), content).unwrap();
}

fn read_cassette(folder: &Path) -> Vec<Value> {
    let content = std::fs::read_to_string(folder.join("recording.json")).unwrap();
    serde_json::from_str::<Value>(&content).unwrap().as_array().unwrap().clone()
}

fn sqs_request(target: &str, body: Value) -> TransportRequest {
    let mut headers = BTreeMap::new();
    headers.insert("x-amz-target".to_string(), target.to_string());
    headers.insert("content-type".to_string(), "application/x-amz-json-1.0".to_string());
    TransportRequest {
        protocol: Protocol::Https,
        method: "POST".into(),
        host: "sqs.us-west-2.amazonaws.com".into(),
        port: 443,
        path: "/".into(),
        headers,
        body: Some(body.to_string()),
    }
}

fn is_md5_hex(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()))
}

#[tokio::test]
async fn send_message_batch_checksums_are_rebuilt_from_the_live_request() {
    let _guard = LOCK.lock().await;
    let folder = temp_folder("tapedeck_sqs_batch_heal");

    let request_body = json!({
        "Entries": [
            {"Id": "0", "MessageBody": "{\"k\":1}"},
            {"Id": "1", "MessageBody": "{\"k\":2}"},
        ],
        "QueueUrl": "https://sqs.us-west-2.amazonaws.com/123456789012/queue",
    });
    write_cassette(
        &folder,
        vec![json!({
            "scope": SQS_SCOPE,
            "method": "POST",
            "path": "/",
            "body": request_body,
            "status": 200,
            "response": {
                "Successful": [
                    {"Id": "0", "MessageId": "existing-id", "MD5OfMessageBody": "stale"},
                ],
            },
            "responseIsBinary": false,
        })],
    );

    let recorder = recorder(&folder);
    recorder.inject("recording.json").unwrap();
    let transport = recorder.transport();

    let response = transport
        .send(&sqs_request("AmazonSQS.SendMessageBatch", request_body))
        .await
        .unwrap();
    let replayed: Value = serde_json::from_slice(&response.body).unwrap();
    let successful = replayed["Successful"].as_array().unwrap();
    assert_eq!(successful.len(), 2);
    // The first entry keeps the message id already present in the stale
    // recording; the second gets one from the seeded generator.
    assert_eq!(successful[0]["MessageId"], json!("existing-id"));
    assert_eq!(
        successful[1]["MessageId"],
        json!("d28095c6-19f4-4dc2-a7cc-f7640c032967-0")
    );
    // Checksums are recomputed from the live message bodies.
    assert!(is_md5_hex(&successful[0]["MD5OfMessageBody"]));
    assert!(is_md5_hex(&successful[1]["MD5OfMessageBody"]));
    assert_ne!(successful[0]["MD5OfMessageBody"], successful[1]["MD5OfMessageBody"]);

    recorder.release().await.unwrap();
    recorder.shutdown().unwrap();

    // The rewritten cassette carries the healed response.
    let cassette = read_cassette(&folder);
    assert_eq!(cassette.len(), 1);
    assert_eq!(cassette[0]["response"], replayed);

    let _ = std::fs::remove_dir_all(&folder);
}

#[tokio::test]
async fn legacy_xml_envelopes_migrate_to_json() {
    let _guard = LOCK.lock().await;
    let folder = temp_folder("tapedeck_sqs_xml_heal");

    let xml = "<?xml version=\"1.0\"?><GetQueueUrlResponse><GetQueueUrlResult>\
               <QueueUrl>https://sqs.us-west-2.amazonaws.com/123456789012/queue</QueueUrl>\
               </GetQueueUrlResult></GetQueueUrlResponse>";
    write_cassette(
        &folder,
        vec![json!({
            "scope": SQS_SCOPE,
            "method": "POST",
            "path": "/",
            "status": 200,
            "response": xml,
            "responseIsBinary": false,
        })],
    );

    let recorder = recorder(&folder);
    recorder.inject("recording.json").unwrap();
    let transport = recorder.transport();

    let response = transport
        .send(&sqs_request("AmazonSQS.GetQueueUrl", json!({"QueueName": "queue"})))
        .await
        .unwrap();
    let replayed: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(
        replayed,
        json!({"QueueUrl": "https://sqs.us-west-2.amazonaws.com/123456789012/queue"})
    );

    recorder.release().await.unwrap();
    recorder.shutdown().unwrap();

    let cassette = read_cassette(&folder);
    assert_eq!(cassette[0]["response"], replayed);

    let _ = std::fs::remove_dir_all(&folder);
}

#[tokio::test]
async fn non_queue_origins_are_left_untouched() {
    let _guard = LOCK.lock().await;
    let folder = temp_folder("tapedeck_sqs_other_origin");

    write_cassette(
        &folder,
        vec![json!({
            "scope": "https://api.example.com:443",
            "method": "POST",
            "path": "/",
            "status": 200,
            "response": {"data": "1"},
            "responseIsBinary": false,
        })],
    );

    let recorder = recorder(&folder);
    recorder.inject("recording.json").unwrap();
    let transport = recorder.transport();

    let mut request = sqs_request("AmazonSQS.SendMessageBatch", json!({"Entries": []}));
    request.host = "api.example.com".into();
    let response = transport.send(&request).await.unwrap();
    assert_eq!(
        serde_json::from_slice::<Value>(&response.body).unwrap(),
        json!({"data": "1"})
    );

    recorder.release().await.unwrap();
    recorder.shutdown().unwrap();
    let _ = std::fs::remove_dir_all(&folder);
}
