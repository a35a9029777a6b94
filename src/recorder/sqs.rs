//! Response envelope healer for the AWS SQS origin.
//!
//! Two fixups keep SQS recordings stable without live calls: legacy XML
//! envelopes are transcoded to the modern JSON shape, and batch-send
//! responses get their per-entry checksums and message ids rebuilt from the
//! live request body.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;
use serde_json::{json, Map, Value};
use sxd_document::dom::{ChildOfElement, Element};
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value as XpathValue};

use crate::ports::IdGenerator;

const TARGET_HEADER: &str = "x-amz-target";

fn sqs_scope() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://sqs\.[\w-]+\.amazonaws\.com:443$").expect("valid scope pattern")
    })
}

/// Heals a recorded SQS response against the live request.
///
/// Pure apart from the injected id generator; activates only for the SQS
/// origin pattern and otherwise returns the response unchanged.
#[must_use]
pub fn heal(
    request_body: Option<&str>,
    response: &Value,
    scope: &str,
    request_headers: &BTreeMap<String, String>,
    ids: &dyn IdGenerator,
) -> Value {
    if !sqs_scope().is_match(scope) {
        return response.clone();
    }
    let target = request_headers.get(TARGET_HEADER).map(String::as_str);

    if let Value::String(body) = response {
        if body.starts_with("<?xml") {
            return migrate(body, target).unwrap_or_else(|| response.clone());
        }
    }

    if target == Some("AmazonSQS.SendMessageBatch") {
        if let Some(healed) = heal_send_message_batch(request_body, response, ids) {
            return healed;
        }
    }

    response.clone()
}

/// Rebuilds a JSON `SendMessageBatch` response from the live request
/// entries: ids are copied, message ids are preferred from the stale
/// response (else freshly generated), and body checksums are recomputed.
fn heal_send_message_batch(
    request_body: Option<&str>,
    response: &Value,
    ids: &dyn IdGenerator,
) -> Option<Value> {
    let request: Value = serde_json::from_str(request_body?).ok()?;
    let entries = request.get("Entries")?.as_array()?;

    let successful: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let message_id = response
                .get("Successful")
                .and_then(|s| s.get(idx))
                .and_then(|e| e.get("MessageId"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map_or_else(|| ids.generate_id(), str::to_string);
            let message_body = entry.get("MessageBody").and_then(Value::as_str).unwrap_or("");
            json!({
                "Id": entry.get("Id").cloned().unwrap_or(Value::Null),
                "MessageId": message_id,
                "MD5OfMessageBody": md5_hex(message_body),
            })
        })
        .collect();

    Some(json!({ "Successful": successful }))
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    crate::util::to_hex(hasher.finalize().as_slice())
}

/// Transcodes a legacy XML envelope to the modern JSON shape for the fixed
/// set of operations. Returns `None` when the XML cannot be parsed or the
/// operation is not recognized, leaving the response untouched.
fn migrate(xml: &str, target: Option<&str>) -> Option<Value> {
    let package = parser::parse(xml).ok()?;
    let document = package.as_document();

    match target? {
        "AmazonSQS.ListQueueTags" => {
            let mut tags = Map::new();
            for tag in elements(&document, "/ListQueueTagsResponse/ListQueueTagsResult/Tag") {
                if let (Some(key), Some(value)) = (child_text(tag, "Key"), child_text(tag, "Value"))
                {
                    tags.insert(key, Value::String(value));
                }
            }
            Some(json!({ "Tags": tags }))
        }
        "AmazonSQS.GetQueueAttributes" => {
            let mut attributes = Map::new();
            for attribute in elements(
                &document,
                "/GetQueueAttributesResponse/GetQueueAttributesResult/Attribute",
            ) {
                if let (Some(name), Some(value)) =
                    (child_text(attribute, "Name"), child_text(attribute, "Value"))
                {
                    attributes.insert(name, Value::String(value));
                }
            }
            Some(json!({ "Attributes": attributes }))
        }
        "AmazonSQS.GetQueueUrl" => {
            if error_code(&document).as_deref()
                == Some("AWS.SimpleQueueService.NonExistentQueue")
            {
                return Some(json!({
                    "__type": "com.amazonaws.sqs#QueueDoesNotExist",
                    "message": "The specified queue does not exist.",
                }));
            }
            match string_at(&document, "/GetQueueUrlResponse/GetQueueUrlResult/QueueUrl") {
                Some(url) => Some(json!({ "QueueUrl": url })),
                None => Some(json!({})),
            }
        }
        "AmazonSQS.CreateQueue" => {
            if error_code(&document).as_deref() == Some("QueueAlreadyExists") {
                return Some(json!({
                    "__type": "com.amazonaws.sqs#QueueNameExists",
                    "message": "The specified queue name does exist.",
                }));
            }
            match string_at(&document, "/CreateQueueResponse/CreateQueueResult/QueueUrl") {
                Some(url) => Some(json!({ "QueueUrl": url })),
                None => Some(json!({})),
            }
        }
        "AmazonSQS.ListQueues" => {
            let urls: Vec<Value> = elements(&document, "/ListQueuesResponse/ListQueuesResult/QueueUrl")
                .into_iter()
                .map(|el| Value::String(text_of(el)))
                .collect();
            let mut result = Map::new();
            result.insert("QueueUrls".to_string(), Value::Array(urls));
            if let Some(token) = string_at(&document, "/ListQueuesResponse/ListQueuesResult/NextToken")
            {
                result.insert("NextToken".to_string(), Value::String(token));
            }
            Some(Value::Object(result))
        }
        "AmazonSQS.TagQueue" | "AmazonSQS.SetQueueAttributes" => Some(json!({})),
        "AmazonSQS.SendMessageBatch" => {
            let successful: Vec<Value> = elements(
                &document,
                "/SendMessageBatchResponse/SendMessageBatchResult/SendMessageBatchResultEntry",
            )
            .into_iter()
            .map(|entry| {
                json!({
                    "Id": child_text(entry, "Id"),
                    "MessageId": child_text(entry, "MessageId"),
                    "MD5OfMessageBody": child_text(entry, "MD5OfMessageBody"),
                })
            })
            .collect();
            let failed: Vec<Value> = elements(
                &document,
                "/SendMessageBatchResponse/SendMessageBatchResult/BatchResultErrorEntry",
            )
            .into_iter()
            .map(|entry| {
                json!({
                    "Id": child_text(entry, "Id"),
                    "SenderFault": child_text(entry, "SenderFault"),
                    "Code": child_text(entry, "Code"),
                })
            })
            .collect();
            Some(json!({ "Successful": successful, "Failed": failed }))
        }
        _ => None,
    }
}

fn error_code<'d>(document: &'d sxd_document::dom::Document<'d>) -> Option<String> {
    string_at(document, "/ErrorResponse/Error/Code")
}

fn elements<'d>(
    document: &'d sxd_document::dom::Document<'d>,
    path: &str,
) -> Vec<Element<'d>> {
    match evaluate_xpath(document, path) {
        Ok(XpathValue::Nodeset(nodes)) => {
            nodes.document_order().into_iter().filter_map(|node| node.element()).collect()
        }
        _ => Vec::new(),
    }
}

fn string_at<'d>(document: &'d sxd_document::dom::Document<'d>, path: &str) -> Option<String> {
    elements(document, path).first().map(|el| text_of(*el))
}

fn child_text(element: Element<'_>, name: &str) -> Option<String> {
    element
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfElement::Element(el) if el.name().local_part() == name => Some(el),
            _ => None,
        })
        .map(text_of)
}

fn text_of(element: Element<'_>) -> String {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Text(text) => Some(text.text().to_string()),
            _ => None,
        })
        .collect()
}
