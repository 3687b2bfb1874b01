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

//! Sign, send and normalize AWS API calls.
//!
//! sigproxy takes a [`CallDescription`], builds the HTTP request it
//! describes, signs it with AWS Signature Version 4 and, when asked, sends it
//! and turns the response into an [`InvocationResult`]: raw bytes, decoded
//! text, and a generic JSON form for XML and JSON payloads.
//!
//! ## Example
//!
//! ```no_run
//! use sigproxy::{CallDescription, Proxy};
//! use sigproxy_aws_v4::DefaultCredentialProvider;
//! use sigproxy_core::{Context, OsEnv, Result};
//! use sigproxy_http_send_reqwest::ReqwestHttpSend;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!     let proxy = Proxy::new(ctx, DefaultCredentialProvider::new());
//!
//!     let mut call = CallDescription::new("ec2", "us-east-1", "GET");
//!     call.query_parameters.insert("Action".into(), "DescribeRegions".into());
//!     call.query_parameters.insert("Version".into(), "2013-10-15".into());
//!     call.make_request = true;
//!
//!     let result = proxy.invoke(&call).await?;
//!     println!("{}", result.url);
//!     Ok(())
//! }
//! ```

mod builder;
pub use builder::{build, UnsignedRequest};

mod call;
pub use call::{CallDescription, RetryPolicy};

mod headers;
pub use headers::Headers;

mod proxy;
pub use proxy::{InvocationResult, Proxy, SignedRequest};

mod response;
pub use response::{normalize as normalize_response, parse_content_type, ResponseResult};

pub mod retry;
pub mod transport;
pub mod xml;
