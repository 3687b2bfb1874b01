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
use http::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION,
    PROXY_AUTHORIZATION,
};
use http::{HeaderMap, Method, StatusCode, Uri};
use log::debug;
use sigproxy_core::{Context, Error, Result};
use url::Url;

use crate::retry::{is_redirect, Decision, RetryState};
use crate::RetryPolicy;

/// One request as sent on the wire, rebuilt for every attempt.
#[derive(Clone, Debug)]
struct Attempt {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl Attempt {
    fn to_request(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(self.body.clone())?;
        *req.headers_mut() = self.headers.clone();
        Ok(req)
    }

    /// Point this attempt at the redirect target.
    fn redirect(&mut self, status: StatusCode, location: &str) -> Result<()> {
        let target = resolve_location(&self.uri, location)?;

        if status == StatusCode::SEE_OTHER {
            if self.method != Method::HEAD {
                self.method = Method::GET;
            }
            self.body = Bytes::new();
            for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_ENCODING] {
                self.headers.remove(name);
            }
        }
        if target.authority() != self.uri.authority() {
            for name in [AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION] {
                self.headers.remove(name);
            }
        }

        debug!("redirecting {} {} to {target}", self.method, self.uri);
        self.uri = target;
        Ok(())
    }
}

/// Send `req` through the context's [`sigproxy_core::HttpSend`], retrying and
/// following redirects as `policy` allows.
///
/// Connect and read failures are returned once their budget is spent. A
/// redirect or retryable status past its budget is returned as an error only
/// when `raise_on_redirect` or `raise_on_status` is set, otherwise the last
/// response is returned.
pub async fn send(
    ctx: &Context,
    req: http::Request<Bytes>,
    policy: &RetryPolicy,
) -> Result<http::Response<Bytes>> {
    let (parts, body) = req.into_parts();
    let mut attempt = Attempt {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };
    let mut state = RetryState::new(policy);

    loop {
        let resp = match ctx.http_send(attempt.to_request()?).await {
            Ok(resp) => resp,
            Err(err) => match state.on_error(&err) {
                Some(Decision::Retry(delay)) => {
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Some(Decision::Exhausted) => {
                    return Err(Error::new(
                        err.kind(),
                        format!(
                            "{} {} failed after {} retries",
                            attempt.method,
                            attempt.uri,
                            state.attempts()
                        ),
                    )
                    .with_source(err));
                }
                None => return Err(err),
            },
        };

        let status = resp.status();
        if let Some(location) = redirect_location(&resp) {
            match state.on_redirect(status) {
                Decision::Retry(_) => {
                    attempt.redirect(status, &location)?;
                    continue;
                }
                Decision::Exhausted if policy.raise_on_redirect => {
                    return Err(Error::too_many_redirects(format!(
                        "{} {} redirected to {location} after {} attempts",
                        attempt.method,
                        attempt.uri,
                        state.attempts()
                    )));
                }
                Decision::Exhausted => return Ok(resp),
            }
        }

        match state.on_status(status, resp.headers()) {
            Some(Decision::Retry(delay)) => {
                tokio::time::sleep(delay).await;
            }
            Some(Decision::Exhausted) if policy.raise_on_status => {
                return Err(Error::retry_exhausted(format!(
                    "{} {} still returned {status} after {} attempts",
                    attempt.method,
                    attempt.uri,
                    state.attempts()
                )));
            }
            Some(Decision::Exhausted) | None => return Ok(resp),
        }
    }
}

fn redirect_location(resp: &http::Response<Bytes>) -> Option<String> {
    if !is_redirect(resp.status()) {
        return None;
    }
    let location = resp.headers().get(LOCATION)?.to_str().ok()?;
    Some(location.to_string())
}

/// Resolve a `Location` value against the uri that returned it.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri> {
    let invalid = || Error::request_invalid(format!("redirect location `{location}` is invalid"));
    let target = Url::parse(&base.to_string())
        .and_then(|base| base.join(location))
        .map_err(|e| invalid().with_source(e))?;
    target
        .as_str()
        .parse()
        .map_err(|e: http::uri::InvalidUri| invalid().with_source(e))
}
