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

use crate::constants::{
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, SIGNED_HEADERS_EXCLUDED, X_AMZ_CONTENT_SHA_256,
    X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::Credential;
use async_trait::async_trait;
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::utf8_percent_encode;
use sigproxy_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use sigproxy_core::time::{format_date, format_iso8601, now, DateTime};
use sigproxy_core::{Context, Error, Result, SignRequest, SigningRequest};
use std::fmt::Write;

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// The signer adds or overwrites `authorization`, `x-amz-date`, `host` and, for
/// credentials carrying a session token, `x-amz-security-token`. Requests to `s3`
/// also get `x-amz-content-sha256`. Body and query are never touched.
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new builder for AWS V4 signer.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    fn is_s3(&self) -> bool {
        self.service == "s3" || self.service == "s3-object-lambda"
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        body: &[u8],
        cred: &Self::Credential,
    ) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        let mut signed_req = SigningRequest::build(req)?;

        // canonicalize context
        let payload_hash = canonicalize_header(&mut signed_req, cred, body, now, self.is_s3())?;

        // build canonical request and string to sign.
        let creq = canonical_request_string(&signed_req, &payload_hash, self.is_s3())?;
        debug!("calculated canonical request: {creq}");
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "AWS4-HMAC-SHA256")?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", &encoded_req)?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_header_names(&signed_req).join(";"),
            signature
        ))
        .map_err(|e| {
            Error::credential_invalid("access key id can't be used in authorization header")
                .with_source(e)
        })?;
        authorization.set_sensitive(true);

        signed_req
            .headers
            .insert(header::AUTHORIZATION, authorization);

        // Apply to the request.
        signed_req.apply(req);
        Ok(())
    }
}

/// Sorted, lowercase names of the headers covered by the signature.
fn signed_header_names(ctx: &SigningRequest) -> Vec<&str> {
    ctx.header_name_to_vec_sorted()
        .into_iter()
        .filter(|name| !SIGNED_HEADERS_EXCLUDED.contains(name))
        .collect()
}

fn canonical_request_string(
    ctx: &SigningRequest,
    payload_hash: &str,
    is_s3: bool,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)?;
    // Insert encoded path
    //
    // S3 encodes the decoded path once, every other service encodes the wire path again.
    if is_s3 {
        writeln!(
            f,
            "{}",
            utf8_percent_encode(&ctx.path_percent_decoded(), &AWS_URI_ENCODE_SET)
        )?;
    } else {
        writeln!(f, "{}", utf8_percent_encode(&ctx.path, &AWS_URI_ENCODE_SET))?;
    }
    // Insert query
    writeln!(f, "{}", canonical_query_string(ctx))?;
    // Insert signed headers
    let signed_headers = signed_header_names(ctx);
    for name in signed_headers.iter() {
        let values = ctx
            .headers
            .get_all(*name)
            .iter()
            .map(|v| v.to_str())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        writeln!(f, "{}:{}", name, values.join(","))?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;
    write!(f, "{payload_hash}")?;

    Ok(f)
}

/// Query pairs encoded with the AWS query encode set, sorted by encoded key then value.
fn canonical_query_string(ctx: &SigningRequest) -> String {
    let mut query = ctx
        .query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect::<Vec<_>>();
    query.sort();

    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Prepare headers for signing and return the payload hash to sign with.
fn canonicalize_header(
    ctx: &mut SigningRequest,
    cred: &Credential,
    body: &[u8],
    now: DateTime,
    is_s3: bool,
) -> Result<String> {
    // A stale signature must never leak into the new one.
    ctx.headers.remove(header::AUTHORIZATION);

    // Header names and values need to be normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
    for (_, value) in ctx.headers.iter_mut() {
        SigningRequest::header_value_normalize(value)
    }

    // Insert HOST header if not present.
    if ctx.headers.get(header::HOST).is_none() {
        let host = HeaderValue::from_str(ctx.host())?;
        ctx.headers.insert(header::HOST, host);
    }

    ctx.headers
        .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

    // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token).map_err(|e| {
            Error::credential_invalid("session token can't be used as header value")
                .with_source(e)
        })?;
        // Set token value sensitive to valid leaking.
        value.set_sensitive(true);

        ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }

    // A caller supplied payload hash (e.g. `UNSIGNED-PAYLOAD`) wins over the computed one.
    let payload_hash = match ctx.headers.get(X_AMZ_CONTENT_SHA_256) {
        Some(v) => v.to_str()?.to_string(),
        None => {
            let hash = hex_sha256(body);
            if is_s3 {
                ctx.headers
                    .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(&hash)?);
            }
            hash
        }
    };

    Ok(payload_hash)
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
