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

use std::borrow::Cow;
use std::mem;

use http::uri::Authority;
use http::uri::Scheme;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;

use crate::{Error, Result};

/// Signing context for request.
///
/// Only the headers are taken out of the request; the URI is read but never rewritten,
/// so signing can't change the path or query that will be sent.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path, as it appears on the wire.
    pub path: String,
    /// HTTP query parameters, percent decoded.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let authority = parts.uri.authority().cloned().ok_or_else(|| {
            Error::request_invalid("request without authority is invalid for signing")
        })?;

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: parts.uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            path: parts.uri.path().to_string(),
            query: parts
                .uri
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) {
        mem::swap(&mut parts.headers, &mut self.headers);
    }

    /// Get the path percent decoded.
    pub fn path_percent_decoded(&self) -> Cow<str> {
        percent_encoding::percent_decode_str(&self.path).decode_utf8_lossy()
    }

    /// Authority without the default port of the scheme, as used in the `host` header.
    pub fn host(&self) -> &str {
        match (self.scheme.as_str(), self.authority.port_u16()) {
            ("https", Some(443)) | ("http", Some(80)) => self.authority.host(),
            _ => self.authority.as_str(),
        }
    }

    /// Normalize header value: trim leading and trailing spaces, collapse inner runs.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bs = v.as_bytes();

        let mut normalized = Vec::with_capacity(bs.len());
        let mut last_space = false;
        for b in bs.iter().copied() {
            if b == b' ' {
                if !last_space && !normalized.is_empty() {
                    normalized.push(b);
                }
                last_space = true;
            } else {
                normalized.push(b);
                last_space = false;
            }
        }
        if normalized.last() == Some(&b' ') {
            normalized.pop();
        }

        if normalized.len() == bs.len() {
            return;
        }
        let sensitive = v.is_sensitive();
        // Only spaces were removed from a valid value, so it stays valid.
        if let Ok(mut value) = HeaderValue::from_bytes(&normalized) {
            value.set_sensitive(sensitive);
            *v = value;
        }
    }

    /// Get header names as sorted vector.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut h = self
            .headers
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<&str>>();
        h.sort_unstable();

        h
    }
}
