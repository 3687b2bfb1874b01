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

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use sigproxy_core::{Error, Result};
use url::{ParseError, Url};

use crate::{CallDescription, Headers};

/// Characters escaped in a request path. `%` and `/` are kept so callers can
/// pass paths that are already encoded.
static PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'^')
    .add(b'|')
    .add(b'\\')
    .add(b'[')
    .add(b']');

/// Everything except the unreserved characters of RFC 3986.
static QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// UnsignedRequest is a call description resolved into a concrete HTTP request.
#[derive(Clone, Debug)]
pub struct UnsignedRequest {
    /// Effective host, always with a scheme.
    pub host: String,
    /// Full url including the encoded query.
    pub url: String,
    pub method: Method,
    pub uri: Uri,
    /// Caller headers plus `Content-Length`.
    pub headers: Headers,
    /// Lowercased names of the headers the caller supplied.
    pub original_keys: HashSet<String>,
    pub body: Option<Bytes>,
}

impl UnsignedRequest {
    /// Convert into request parts ready to be signed.
    pub fn to_parts(&self) -> Result<http::request::Parts> {
        let (mut parts, _) = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(())?
            .into_parts();
        parts.headers = header_map(&self.headers)?;
        Ok(parts)
    }

    /// The body bytes, empty if there is no body.
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone().unwrap_or_default()
    }
}

/// Build the unsigned request for `call`.
///
/// `resolved_host` is used when the call carries no host override.
pub fn build(call: &CallDescription, resolved_host: &str) -> Result<UnsignedRequest> {
    let body = match &call.body {
        Some(encoded) => Some(Bytes::from(STANDARD.decode(encoded).map_err(|e| {
            Error::malformed_body("field `body` is not valid base64").with_source(e)
        })?)),
        None => None,
    };

    let method = Method::from_bytes(call.method.as_bytes()).map_err(|e| {
        Error::request_invalid(format!("method `{}` is invalid", call.method)).with_source(e)
    })?;

    let (host, mut url) = base_url(call.host.as_deref().unwrap_or(resolved_host))?;
    let path = normalize_path(&call.path);
    if !path.is_empty() {
        let joined = format!("{}{path}", url.path().trim_end_matches('/'));
        url.set_path(&joined);
    }
    let query = encode_query(call);
    if !query.is_empty() {
        url.set_query(Some(&query));
    }
    let uri: Uri = url.as_str().parse().map_err(|e| {
        Error::request_invalid(format!("url `{url}` is invalid")).with_source(e)
    })?;
    let url = url.to_string();

    let original_keys = call.headers.lowercase_keys();
    let mut headers = call.headers.clone();
    let length = body.as_ref().map(|b| b.len()).unwrap_or(0);
    // Replaces a caller supplied value in place, keeping its casing.
    headers.insert("Content-Length", length.to_string());

    debug!("built {method} request to {url}");
    Ok(UnsignedRequest {
        host,
        url,
        method,
        uri,
        headers,
        original_keys,
        body,
    })
}

/// Parse the effective host, assuming `https` when it carries no scheme.
///
/// Returns the host as it will be reported together with its parsed form.
fn base_url(host: &str) -> Result<(String, Url)> {
    let invalid = |e: ParseError| {
        Error::request_invalid(format!("host `{host}` is invalid")).with_source(e)
    };
    match Url::parse(host) {
        // `localhost:4566` parses as scheme `localhost` with an opaque path.
        Ok(url) if !url.cannot_be_a_base() => Ok((host.to_string(), url)),
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) => {
            let host = format!("https://{host}");
            let url = Url::parse(&host).map_err(invalid)?;
            Ok((host, url))
        }
        Err(e) => Err(invalid(e)),
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let encoded = utf8_percent_encode(path, PATH_ENCODE_SET).to_string();
    if encoded.starts_with('/') {
        encoded
    } else {
        format!("/{encoded}")
    }
}

fn encode_query(call: &CallDescription) -> String {
    call.query_parameters
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, QUERY_ENCODE_SET),
                utf8_percent_encode(v, QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            Error::request_invalid(format!("header name `{name}` is invalid")).with_source(e)
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            Error::request_invalid(format!("value of header `{name}` is invalid")).with_source(e)
        })?;
        map.append(name, value);
    }
    Ok(map)
}
