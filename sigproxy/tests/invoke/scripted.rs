// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use pretty_assertions::assert_eq;
use serde_json::json;
use sigproxy_core::ErrorKind;

use super::*;

const DESCRIBE_REGIONS_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeRegionsResponse xmlns="http://ec2.amazonaws.com/doc/2013-10-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>
    <regionInfo>
        <item>
            <regionName>us-east-1</regionName>
            <regionEndpoint>ec2.us-east-1.amazonaws.com</regionEndpoint>
        </item>
    </regionInfo>
</DescribeRegionsResponse>"#;

#[tokio::test]
async fn test_invoke_xml_response() -> Result<()> {
    let (proxy, http) = proxy(vec![response(
        200,
        "text/xml;charset=UTF-8",
        DESCRIBE_REGIONS_RESPONSE,
    )]);
    let mut call = describe_regions();
    call.make_request = true;

    let result = proxy.invoke(&call).await?;
    let response = result.response.unwrap();

    assert_eq!(http.requests(), 1);
    assert_eq!(
        http.last_header("authorization").as_deref(),
        result.headers.get("authorization")
    );
    assert_eq!(response.status_code, 200);
    assert_eq!(response.status_reason, "OK");
    assert_eq!(
        response.aws_request_id.as_deref(),
        Some("b7dc6e1c-0000-4b1c-9d3e-000000000000")
    );
    assert_eq!(response.mediatype, "text/xml");
    // Charset values compare case-insensitively.
    assert!(response
        .mediatype_parameters
        .get("charset")
        .is_some_and(|v| v.eq_ignore_ascii_case("utf-8")));

    let ns = "http://ec2.amazonaws.com/doc/2013-10-15/";
    assert_eq!(
        response.body_object,
        Some(json!({"DescribeRegionsResponse": {
            "$content": null,
            "$namespace": ns,
            "requestId": {"$content": "59dbff89-35bd-4eac-99ed-be587EXAMPLE", "$namespace": ns},
            "regionInfo": {
                "$content": null,
                "$namespace": ns,
                "item": {
                    "$content": null,
                    "$namespace": ns,
                    "regionName": {"$content": "us-east-1", "$namespace": ns},
                    "regionEndpoint": {"$content": "ec2.us-east-1.amazonaws.com", "$namespace": ns},
                },
            },
        }}))
    );
    Ok(())
}

#[tokio::test]
async fn test_invoke_json_response() -> Result<()> {
    let (proxy, _) = proxy(vec![response(200, "application/json", r#"{"a":1}"#)]);
    let mut call = describe_regions();
    call.make_request = true;

    let response = proxy.invoke(&call).await?.response.unwrap();
    assert_eq!(response.body_object, Some(json!({"a": 1})));
    assert!(response.body_is_utf_8);
    assert_eq!(response.body_base64, "eyJhIjoxfQ==");
    Ok(())
}

#[tokio::test]
async fn test_invoke_invalid_json_is_null() -> Result<()> {
    let (proxy, _) = proxy(vec![response(200, "application/json", "{oops")]);
    let mut call = describe_regions();
    call.make_request = true;

    let response = proxy.invoke(&call).await?.response.unwrap();
    assert_eq!(response.body_object, None);
    Ok(())
}

#[tokio::test]
async fn test_invoke_malformed_xml() {
    let (proxy, _) = proxy(vec![response(200, "text/xml", "<a><b></a>")]);
    let mut call = describe_regions();
    call.make_request = true;

    let err = proxy.invoke(&call).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponseBody);
}

#[tokio::test]
async fn test_invoke_error_status_is_returned() -> Result<()> {
    let (proxy, _) = proxy(vec![response(
        403,
        "text/xml",
        "<Response><Errors><Error><Code>AuthFailure</Code></Error></Errors></Response>",
    )]);
    let mut call = describe_regions();
    call.make_request = true;

    let response = proxy.invoke(&call).await?.response.unwrap();
    assert_eq!(response.status_code, 403);
    assert_eq!(response.status_reason, "Forbidden");
    assert_eq!(
        response.body_object.unwrap()["Response"]["Errors"]["Error"]["Code"]["$content"],
        json!("AuthFailure")
    );
    Ok(())
}

#[tokio::test]
async fn test_invoke_retries_forced_status() -> Result<()> {
    let (proxy, http) = proxy(vec![
        response(503, "text/plain", "slow down"),
        response(200, "application/json", "{}"),
    ]);
    let mut call = describe_regions();
    call.make_request = true;
    call.retry_policy.status = 1;
    call.retry_policy.status_forcelist.insert(503);

    let response = proxy.invoke(&call).await?.response.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(http.requests(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invoke_retry_exhausted() {
    let (proxy, _) = proxy(vec![
        response(500, "text/plain", "boom"),
        response(500, "text/plain", "boom"),
    ]);
    let mut call = describe_regions();
    call.make_request = true;
    call.retry_policy.status = 1;
    call.retry_policy.status_forcelist.insert(500);

    let err = proxy.invoke(&call).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
}

#[tokio::test]
async fn test_invoke_connect_failure() {
    let (proxy, http) = proxy(vec![
        Err(Error::connect("connection refused")),
        Err(Error::connect("connection refused")),
    ]);
    let mut call = describe_regions();
    call.make_request = true;
    call.retry_policy.connect = 1;

    let err = proxy.invoke(&call).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
    assert_eq!(http.requests(), 2);
}

#[tokio::test]
async fn test_invoke_result_serializes() -> Result<()> {
    let (proxy, _) = proxy(vec![response(200, "application/json", "[]")]);
    let mut call = describe_regions();
    call.make_request = true;

    let result = proxy.invoke(&call).await?;
    let value = serde_json::to_value(&result).unwrap();

    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(
        keys,
        vec!["host", "url", "headers", "generated_headers", "response"]
    );
    assert_eq!(value["response"]["body_is_utf_8"], json!(true));
    assert_eq!(value["response"]["body_object"], json!([]));
    Ok(())
}
