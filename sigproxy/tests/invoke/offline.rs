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

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pretty_assertions::assert_eq;
use sigproxy::CallDescription;
use sigproxy_aws_v4::EnvCredentialProvider;
use sigproxy_core::{ErrorKind, ResolveEndpoint};

use super::*;

#[tokio::test]
async fn test_describe_regions_without_request() -> Result<()> {
    let (proxy, http) = proxy(vec![]);

    let result = proxy.invoke(&describe_regions()).await?;

    assert_eq!(result.host, "https://ec2.us-east-1.amazonaws.com");
    assert!(result.url.starts_with("https://ec2.us-east-1.amazonaws.com"));
    assert!(result.url.contains("Action=DescribeRegions"));
    assert!(result.url.contains("Version=2013-10-15"));
    assert_eq!(result.response, None);
    assert_eq!(http.requests(), 0);

    let authorization = result.headers.get("authorization").unwrap();
    assert!(authorization.starts_with(
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/ec2/aws4_request, \
         SignedHeaders=content-length;host;x-amz-date, Signature="
    ));
    assert_eq!(result.headers.get("x-amz-date"), Some("20150830T123600Z"));
    assert_eq!(
        result.headers.get("host"),
        Some("ec2.us-east-1.amazonaws.com")
    );
    Ok(())
}

#[tokio::test]
async fn test_signing_is_deterministic() -> Result<()> {
    let (proxy, _) = proxy(vec![]);

    let first = proxy.invoke(&describe_regions()).await?;
    let second = proxy.invoke(&describe_regions()).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_generated_headers() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let mut call = describe_regions();
    call.headers.insert("X-Custom", "v");

    let result = proxy.invoke(&call).await?;

    let generated = &result.generated_headers;
    assert!(generated.contains("Content-Length"));
    assert!(generated.contains("Authorization"));
    assert!(generated.contains("X-Amz-Date"));
    assert!(!generated.contains("X-Custom"));

    assert_eq!(result.headers.key_of("x-custom"), Some("X-Custom"));
    assert_eq!(result.headers.key_of("x-amz-date"), Some("X-Amz-Date"));
    Ok(())
}

#[tokio::test]
async fn test_caller_content_length_is_not_generated() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let mut call = CallDescription::new("sqs", "eu-west-1", "POST");
    call.headers.insert("content-length", "42");
    call.body = Some(STANDARD.encode("Action=ListQueues"));

    let result = proxy.invoke(&call).await?;

    assert_eq!(result.headers.key_of("Content-Length"), Some("content-length"));
    assert_eq!(result.headers.get("content-length"), Some("17"));
    assert!(!result.generated_headers.contains("content-length"));
    Ok(())
}

#[tokio::test]
async fn test_s3_sends_payload_hash() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let mut call = CallDescription::new("s3", "us-east-1", "PUT");
    call.host = Some("https://examplebucket.s3.amazonaws.com".to_string());
    call.path = "test$file.text".to_string();
    call.body = Some(STANDARD.encode("Welcome to Amazon S3."));

    let result = proxy.invoke(&call).await?;

    assert_eq!(
        result.url,
        "https://examplebucket.s3.amazonaws.com/test$file.text"
    );
    assert_eq!(
        result.generated_headers.get("x-amz-content-sha256"),
        Some("44ce7dd67c959e0d3524ffac1771dfbba87d2b6b4b4e99e42034a8b803f8b072")
    );
    Ok(())
}

#[tokio::test]
async fn test_session_token_is_signed() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let proxy = Proxy::new(
        proxy.context().clone(),
        StaticCredentialProvider::new("AKIDEXAMPLE", "secret").with_session_token("token"),
    );

    let result = proxy.invoke(&describe_regions()).await?;

    assert_eq!(
        result.generated_headers.get("x-amz-security-token"),
        Some("token")
    );
    assert!(result
        .headers
        .get("authorization")
        .unwrap()
        .contains("x-amz-security-token"));
    Ok(())
}

#[tokio::test]
async fn test_endpoint_override_from_env() -> Result<()> {
    let (proxy, _) = proxy_with(
        vec![],
        &[
            ("AWS_ENDPOINT_URL", "http://localhost:4566"),
            ("AWS_ENDPOINT_URL_EC2", "http://localhost:9000/"),
        ],
    );

    let result = proxy.invoke(&describe_regions()).await?;
    assert_eq!(result.host, "http://localhost:9000");
    assert_eq!(result.headers.get("host"), Some("localhost:9000"));

    let mut call = describe_regions();
    call.service = "sqs".to_string();
    let result = proxy.invoke(&call).await?;
    assert_eq!(result.host, "http://localhost:4566");
    Ok(())
}

#[tokio::test]
async fn test_host_override_without_scheme() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let mut call = describe_regions();
    call.host = Some("ec2.eu-central-1.amazonaws.com".to_string());
    call.path = "/".to_string();

    let result = proxy.invoke(&call).await?;

    assert_eq!(result.host, "https://ec2.eu-central-1.amazonaws.com");
    assert_eq!(
        result.url,
        "https://ec2.eu-central-1.amazonaws.com/?Action=DescribeRegions&Version=2013-10-15"
    );
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_stops_before_network() {
    let (proxy, http) = proxy(vec![response(200, "application/json", "{}")]);
    let mut call = describe_regions();
    call.body = Some("%%%".to_string());
    call.make_request = true;

    let err = proxy.invoke(&call).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedBody);
    assert_eq!(http.requests(), 0);
}

#[tokio::test]
async fn test_missing_credentials() {
    let (proxy, http) = proxy(vec![response(200, "application/json", "{}")]);
    let proxy = Proxy::new(proxy.context().clone(), EnvCredentialProvider::new());
    let mut call = describe_regions();
    call.make_request = true;

    let err = proxy.invoke(&call).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CredentialsUnavailable);
    assert_eq!(http.requests(), 0);
}

#[tokio::test]
async fn test_invalid_region() {
    let (proxy, _) = proxy(vec![]);
    let call = CallDescription::new("ec2", "us east 1", "GET");

    let err = proxy.invoke(&call).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[derive(Debug)]
struct FixedEndpoint;

impl ResolveEndpoint for FixedEndpoint {
    fn resolve_default_host(&self, _: &Context, service: &str, region: &str) -> Result<String> {
        Ok(format!("https://{service}.{region}.example.test"))
    }
}

#[tokio::test]
async fn test_custom_endpoint_resolver() -> Result<()> {
    let (proxy, _) = proxy(vec![]);
    let proxy = proxy.with_endpoint_resolver(FixedEndpoint);

    let result = proxy.invoke(&describe_regions()).await?;
    assert_eq!(result.host, "https://ec2.us-east-1.example.test");
    assert_eq!(
        result.url,
        "https://ec2.us-east-1.example.test/?Action=DescribeRegions&Version=2013-10-15"
    );
    assert_eq!(
        result.headers.get("host"),
        Some("ec2.us-east-1.example.test")
    );

    // A host override bypasses the resolver.
    let mut call = describe_regions();
    call.host = Some("https://override.example.test".to_string());
    let result = proxy.invoke(&call).await?;
    assert_eq!(result.host, "https://override.example.test");
    Ok(())
}
