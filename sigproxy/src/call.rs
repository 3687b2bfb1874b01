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

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::Headers;

/// CallDescription describes one AWS API call.
///
/// It deserializes from the flat JSON event used by the invocation layer:
///
/// ```json
/// {
///   "service": "ec2",
///   "region": "us-east-1",
///   "method": "GET",
///   "host": null,
///   "path": "",
///   "query_parameters": {"Action": "DescribeRegions", "Version": "2013-10-15"},
///   "headers": {},
///   "body": null,
///   "make_request": true,
///   "connect": 3,
///   "backoff_factor": 0.5
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallDescription {
    /// Service id used for signing and endpoint lookup, e.g. `ec2`.
    pub service: String,
    pub region: String,
    pub method: String,
    /// Host override with or without scheme, e.g. `https://localhost:4566`.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: Headers,
    /// Request body, base64 encoded.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub make_request: bool,
    #[serde(flatten)]
    pub retry_policy: RetryPolicy,
}

impl CallDescription {
    /// Create a call without body, headers or query parameters.
    pub fn new(service: &str, region: &str, method: &str) -> Self {
        Self {
            service: service.to_string(),
            region: region.to_string(),
            method: method.to_string(),
            host: None,
            path: String::new(),
            query_parameters: BTreeMap::new(),
            headers: Headers::new(),
            body: None,
            make_request: false,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// RetryPolicy bounds how hard the transport tries before giving up.
///
/// Every budget counts retries, not attempts: `connect: 0` sends once and
/// fails on the first connect error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after connection failures.
    pub connect: u32,
    /// Retries after failures while reading the response.
    pub read: u32,
    /// Redirects to follow.
    pub redirect: u32,
    /// Retries on statuses listed in `status_forcelist`.
    pub status: u32,
    /// Retries after any other transport failure.
    pub other: u32,
    /// Seconds multiplied by `2^(n-1)` for the n-th consecutive retry.
    pub backoff_factor: f64,
    pub raise_on_redirect: bool,
    pub raise_on_status: bool,
    pub status_forcelist: BTreeSet<u16>,
    pub respect_retry_after_header: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect: 3,
            read: 3,
            redirect: 3,
            status: 0,
            other: 0,
            backoff_factor: 0.0,
            raise_on_redirect: true,
            raise_on_status: true,
            status_forcelist: BTreeSet::new(),
            respect_retry_after_header: true,
        }
    }
}
