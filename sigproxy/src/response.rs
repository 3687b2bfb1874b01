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

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use indexmap::IndexMap;
use log::debug;
use mime::Mime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigproxy_core::hash::base64_encode;
use sigproxy_core::{Error, Result};

use crate::{xml, Headers};

const X_AMZN_REQUEST_ID: &str = "x-amzn-requestid";
const X_AMZ_REQUEST_ID: &str = "x-amz-request-id";

/// ResponseResult is the normalized form of an HTTP response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub aws_request_id: Option<String>,
    pub status_code: u16,
    /// Canonical reason phrase, empty for unknown codes.
    pub status_reason: String,
    pub headers: Headers,
    pub body_base64: String,
    /// The body as JSON value for `text/xml` and `application/json` payloads.
    pub body_object: Option<Value>,
    pub body_is_utf_8: bool,
    /// `type/subtype` of `Content-Type` as received, empty if missing.
    pub mediatype: String,
    pub mediatype_parameters: IndexMap<String, String>,
}

/// Normalize a response.
///
/// A `text/xml` body that fails to parse is an error, while an invalid
/// `application/json` body only leaves `body_object` empty.
pub fn normalize(resp: http::Response<Bytes>) -> Result<ResponseResult> {
    let (parts, body) = resp.into_parts();
    let headers = Headers::from_header_map(&parts.headers, None);

    let aws_request_id = headers
        .get(X_AMZN_REQUEST_ID)
        .or_else(|| headers.get(X_AMZ_REQUEST_ID))
        .map(str::to_string);

    let (mediatype, mediatype_parameters) = match headers.get(CONTENT_TYPE.as_str()) {
        Some(v) => parse_content_type(v),
        None => (String::new(), IndexMap::new()),
    };

    let text = std::str::from_utf8(&body).ok();
    let body_object = match text {
        Some(text) => decode_body(&mediatype, text)?,
        None => None,
    };

    Ok(ResponseResult {
        aws_request_id,
        status_code: parts.status.as_u16(),
        status_reason: parts
            .status
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
        headers,
        body_base64: base64_encode(&body),
        body_object,
        body_is_utf_8: text.is_some(),
        mediatype,
        mediatype_parameters,
    })
}

fn decode_body(mediatype: &str, text: &str) -> Result<Option<Value>> {
    match mediatype.to_ascii_lowercase().as_str() {
        "text/xml" => {
            let root = xml::parse(text)?;
            let (tag, node) = xml::normalize(&root);
            let node = serde_json::to_value(node).map_err(|e| {
                Error::unexpected("serialize xml body into json failed").with_source(e)
            })?;
            let mut object = serde_json::Map::new();
            object.insert(tag, node);
            Ok(Some(Value::Object(object)))
        }
        "application/json" => match serde_json::from_str(text) {
            Ok(v) => Ok(Some(v)),
            Err(err) => {
                debug!("response body is not valid json, ignoring: {err}");
                Ok(None)
            }
        },
        _ => Ok(None),
    }
}

/// Parse a `Content-Type` value into its media type and parameters.
///
/// The media type keeps the casing it was received with. Parameter names are
/// lowercased and quoted values are unquoted. A value `mime` rejects, such as
/// one with a parameter lacking `=`, keeps its media type but has no parameters.
pub fn parse_content_type(value: &str) -> (String, IndexMap<String, String>) {
    let mediatype = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    let params = match value.parse::<Mime>() {
        Ok(mime) => mime
            .params()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    unquote(value.as_str()),
                )
            })
            .collect(),
        Err(err) => {
            debug!("content type {value:?} is not a valid mime type, dropping parameters: {err}");
            IndexMap::new()
        }
    };
    (mediatype, params)
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\\", "\\").replace("\\\"", "\""),
        None => value.to_string(),
    }
}
