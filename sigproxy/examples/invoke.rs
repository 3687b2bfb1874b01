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

//! Read a call description as JSON from stdin and print the result.
//!
//! ```shell
//! echo '{"service":"ec2","region":"us-east-1","method":"GET","path":"",
//!   "query_parameters":{"Action":"DescribeRegions","Version":"2013-10-15"},
//!   "make_request":true}' | cargo run --example invoke
//! ```

use std::io::Read;

use anyhow::Result;
use sigproxy::{CallDescription, Proxy};
use sigproxy_aws_v4::DefaultCredentialProvider;
use sigproxy_core::{Context, OsEnv};
use sigproxy_http_send_reqwest::ReqwestHttpSend;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let call: CallDescription = serde_json::from_str(&input)?;

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let proxy = Proxy::new(ctx, DefaultCredentialProvider::new());

    let result = proxy.invoke(&call).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
