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
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use log::debug;
use serde::{Deserialize, Serialize};
use sigproxy_aws_v4::{Credential, EndpointConfig, EndpointResolver, RequestSigner};
use sigproxy_core::time::DateTime;
use sigproxy_core::{Context, ProvideCredential, ResolveEndpoint, Result, Signer};

use crate::builder::build;
use crate::{response, transport, CallDescription, Headers, ResponseResult, RetryPolicy};

/// InvocationResult is everything one call produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Effective host, with scheme.
    pub host: String,
    pub url: String,
    /// Final request headers after signing.
    pub headers: Headers,
    /// Headers the caller did not supply.
    pub generated_headers: Headers,
    /// `None` unless the call asked for the request to be made.
    pub response: Option<ResponseResult>,
}

/// SignedRequest is a request ready to be sent.
#[derive(Clone, Debug)]
pub struct SignedRequest {
    pub host: String,
    pub url: String,
    pub method: Method,
    pub uri: Uri,
    /// Final headers, caller casing kept and signer headers in canonical form.
    pub headers: Headers,
    /// The same headers as sent on the wire.
    pub header_map: HeaderMap,
    pub body: Bytes,
    original_keys: HashSet<String>,
}

impl SignedRequest {
    /// Headers whose name was absent from the call, ignoring case.
    pub fn generated_headers(&self) -> Headers {
        self.headers.difference(&self.original_keys)
    }

    /// Convert into an http request.
    pub fn to_request(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(self.body.clone())?;
        *req.headers_mut() = self.header_map.clone();
        Ok(req)
    }
}

/// Proxy signs and executes AWS API calls.
///
/// A proxy is cheap to clone; clones share the credential cache and the
/// HTTP client of their [`Context`].
#[derive(Clone, Debug)]
pub struct Proxy {
    signer: Signer<Credential>,
    resolver: Arc<dyn ResolveEndpoint>,

    time: Option<DateTime>,
}

impl Proxy {
    /// Create a proxy loading credentials from `provider`.
    ///
    /// Endpoints are resolved with overrides read from the context's
    /// environment.
    pub fn new(ctx: Context, provider: impl ProvideCredential<Credential = Credential>) -> Self {
        let resolver = EndpointResolver::new(EndpointConfig::from_env(&ctx));
        Self {
            signer: Signer::new(ctx, provider),
            resolver: Arc::new(resolver),
            time: None,
        }
    }

    /// Replace the endpoint resolver.
    pub fn with_endpoint_resolver(mut self, resolver: impl ResolveEndpoint) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn context(&self) -> &Context {
        self.signer.context()
    }

    /// Build and sign the request for `call` without sending it.
    pub async fn sign(&self, call: &CallDescription) -> Result<SignedRequest> {
        let host = match &call.host {
            Some(host) => host.clone(),
            None => self
                .resolver
                .resolve_default_host(self.context(), &call.service, &call.region)?,
        };
        let unsigned = build(call, &host)?;

        let mut parts = unsigned.to_parts()?;
        let body = unsigned.body_bytes();
        let mut builder = RequestSigner::new(&call.service, &call.region);
        if let Some(time) = self.time {
            builder = builder.with_time(time);
        }
        self.signer.sign(&builder, &mut parts, &body).await?;

        debug!("signed {} {} for {}", parts.method, unsigned.url, call.service);
        Ok(SignedRequest {
            headers: Headers::from_header_map(&parts.headers, Some(&unsigned.headers)),
            host: unsigned.host,
            url: unsigned.url,
            method: parts.method,
            uri: parts.uri,
            header_map: parts.headers,
            body,
            original_keys: unsigned.original_keys,
        })
    }

    /// Send a signed request under `policy` and normalize the response.
    pub async fn execute(
        &self,
        signed: &SignedRequest,
        policy: &RetryPolicy,
    ) -> Result<ResponseResult> {
        let resp = transport::send(self.context(), signed.to_request()?, policy).await?;
        response::normalize(resp)
    }

    /// Sign `call`, send it when `make_request` is set and normalize the
    /// response.
    pub async fn invoke(&self, call: &CallDescription) -> Result<InvocationResult> {
        let signed = self.sign(call).await?;

        let response = if call.make_request {
            Some(self.execute(&signed, &call.retry_policy).await?)
        } else {
            None
        };

        Ok(InvocationResult {
            generated_headers: signed.generated_headers(),
            host: signed.host,
            url: signed.url,
            headers: signed.headers,
            response,
        })
    }
}
