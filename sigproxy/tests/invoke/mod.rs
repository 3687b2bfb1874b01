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

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use sigproxy::{CallDescription, Proxy};
use sigproxy_aws_v4::StaticCredentialProvider;
use sigproxy_core::{Context, Error, HttpSend, Result, StaticEnv};

mod offline;
mod scripted;

pub type Step = Result<http::Response<Bytes>>;

/// ScriptedHttpSend answers requests from a fixed script and records them.
#[derive(Clone, Debug, Default)]
pub struct ScriptedHttpSend {
    steps: Arc<Mutex<VecDeque<Step>>>,
    seen: Arc<Mutex<Vec<http::Request<Bytes>>>>,
}

impl ScriptedHttpSend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            seen: Arc::default(),
        }
    }

    pub fn requests(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_header(&self, name: &str) -> Option<String> {
        self.seen
            .lock()
            .unwrap()
            .last()?
            .headers()
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
    }
}

#[async_trait]
impl HttpSend for ScriptedHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.seen.lock().unwrap().push(req);
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::unexpected("no scripted response left")))
    }
}

pub fn response(status: u16, content_type: &str, body: &'static str) -> Step {
    Ok(http::Response::builder()
        .status(status)
        .header("content-type", content_type)
        .header("x-amzn-RequestId", "b7dc6e1c-0000-4b1c-9d3e-000000000000")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap())
}

pub fn proxy_with(steps: Vec<Step>, envs: &[(&str, &str)]) -> (Proxy, ScriptedHttpSend) {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = ScriptedHttpSend::new(steps);
    let env = StaticEnv {
        envs: envs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    };
    let ctx = Context::new().with_http_send(http.clone()).with_env(env);
    let proxy = Proxy::new(
        ctx,
        StaticCredentialProvider::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
    )
    .with_time(Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap());
    (proxy, http)
}

pub fn proxy(steps: Vec<Step>) -> (Proxy, ScriptedHttpSend) {
    proxy_with(steps, &[])
}

pub fn describe_regions() -> CallDescription {
    let mut call = CallDescription::new("ec2", "us-east-1", "GET");
    call.query_parameters
        .insert("Action".to_string(), "DescribeRegions".to_string());
    call.query_parameters
        .insert("Version".to_string(), "2013-10-15".to_string());
    call
}
