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

mod standard;

use anyhow::Result;
use bytes::Bytes;
use http::{Request, StatusCode};
use log::debug;
use sigproxy_aws_v4::{Credential, EnvCredentialProvider, RequestSigner};
use sigproxy_core::{Context, OsEnv, Signer};
use sigproxy_http_send_reqwest::ReqwestHttpSend;
use std::env;

/// Initialize test environment
///
/// Credentials are read from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
/// `AWS_SESSION_TOKEN`.
pub fn init_signing_test() -> Option<(Signer<Credential>, RequestSigner, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("SIGPROXY_AWS_V4_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let region = env::var("SIGPROXY_AWS_V4_REGION").expect("SIGPROXY_AWS_V4_REGION must be set");
    let service = env::var("SIGPROXY_AWS_V4_SERVICE").unwrap_or_else(|_| "s3".to_string());
    let url = env::var("SIGPROXY_AWS_V4_URL").expect("SIGPROXY_AWS_V4_URL must be set");

    let context = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let signer = Signer::new(context, EnvCredentialProvider::new());
    let builder = RequestSigner::new(&service, &region);

    Some((signer, builder, url))
}

/// Send signed request and return response
pub async fn send_signed_request(
    signer: &Signer<Credential>,
    builder: &RequestSigner,
    req: Request<Bytes>,
) -> Result<(StatusCode, Bytes)> {
    let (mut parts, body) = req.into_parts();
    signer.sign(builder, &mut parts, &body).await?;
    let req = Request::from_parts(parts, body);

    debug!("signed request: {req:?}");

    let resp = signer.context().http_send(req).await?;
    let status = resp.status();

    debug!("response status: {status}");
    Ok((status, resp.into_body()))
}
