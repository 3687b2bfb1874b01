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

//! [`HttpSend`] implementation backed by a pooled [`reqwest::Client`].
//!
//! The client is cheap to clone and keeps its connection pool behind an `Arc`, so a
//! single `ReqwestHttpSend` can be shared by every concurrent invocation.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use log::debug;
use reqwest::{redirect, Client, Request};
use sigproxy_core::{Error, HttpSend, Result};

/// ReqwestHttpSend sends requests through a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl Default for ReqwestHttpSend {
    /// Build a client that never follows redirects on its own.
    fn default() -> Self {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .expect("reqwest client without redirects must build");
        Self { client }
    }
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    ///
    /// The client should be built with `redirect::Policy::none()`; redirects are
    /// followed by the caller's retry policy.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(|e| {
            Error::request_invalid("failed to convert request for reqwest").with_source(e)
        })?;
        debug!("sending {} {}", req.method(), req.url());

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| classify(e, "sending request"))?;
        let resp: http::Response<_> = resp.into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| classify(e, "reading response body"))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

/// Map a reqwest failure onto the transport error kinds the retry policy budgets for.
fn classify(err: reqwest::Error, phase: &str) -> Error {
    let message = format!("{phase} failed: {err}");
    let classified = if err.is_connect() {
        Error::connect(message)
    } else if err.is_timeout() || err.is_body() || err.is_decode() {
        Error::read_timeout(message)
    } else if err.is_redirect() {
        Error::too_many_redirects(message)
    } else {
        Error::unexpected(message)
    };
    classified.with_source(err)
}
