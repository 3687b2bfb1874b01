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

//! Default endpoint resolution for AWS services.

use crate::constants::AWS_ENDPOINT_URL;
use log::debug;
use sigproxy_core::{Context, Error, ResolveEndpoint, Result};
use std::collections::HashMap;

/// Services served from a single partition-wide host instead of one host per region.
const GLOBAL_SERVICES: &[(&str, &str)] = &[
    ("cloudfront", "https://cloudfront.amazonaws.com"),
    ("iam", "https://iam.amazonaws.com"),
    ("organizations", "https://organizations.us-east-1.amazonaws.com"),
    ("route53", "https://route53.amazonaws.com"),
];

/// Endpoint overrides loaded from the environment.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    /// Endpoint used for every service, from `AWS_ENDPOINT_URL`.
    pub endpoint_url: Option<String>,
    /// Per service endpoints from `AWS_ENDPOINT_URL_<SERVICE>`, keyed by the
    /// upper-cased service id with `-` replaced by `_`.
    pub service_endpoint_urls: HashMap<String, String>,
}

impl EndpointConfig {
    /// Load endpoint overrides from env.
    pub fn from_env(ctx: &Context) -> Self {
        let prefix = format!("{AWS_ENDPOINT_URL}_");
        let service_endpoint_urls = ctx
            .env_vars()
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|s| (s.to_string(), v)))
            .collect();

        Self {
            endpoint_url: ctx.env_var(AWS_ENDPOINT_URL).filter(|v| !v.is_empty()),
            service_endpoint_urls,
        }
    }

    fn service_override(&self, service: &str) -> Option<&str> {
        let key = service.to_ascii_uppercase().replace('-', "_");
        self.service_endpoint_urls.get(&key).map(String::as_str)
    }
}

/// EndpointResolver resolves `https://{service}.{region}.{dns_suffix}` style hosts.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    config: EndpointConfig,
}

impl EndpointResolver {
    /// Create a resolver with the given overrides.
    pub fn new(config: EndpointConfig) -> Self {
        Self { config }
    }
}

impl ResolveEndpoint for EndpointResolver {
    fn resolve_default_host(&self, _: &Context, service: &str, region: &str) -> Result<String> {
        validate_label("service", service)?;
        validate_label("region", region)?;

        if let Some(host) = self.config.service_override(service) {
            debug!("using endpoint override for service {service}: {host}");
            return Ok(host.trim_end_matches('/').to_string());
        }
        if let Some(host) = &self.config.endpoint_url {
            debug!("using global endpoint override: {host}");
            return Ok(host.trim_end_matches('/').to_string());
        }

        let dns_suffix = if region.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };

        if dns_suffix == "amazonaws.com" && !region.starts_with("us-gov-") {
            if let Some((_, host)) = GLOBAL_SERVICES.iter().find(|(name, _)| *name == service) {
                return Ok(host.to_string());
            }
        }

        Ok(format!("https://{service}.{region}.{dns_suffix}"))
    }
}

fn validate_label(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::config_invalid(format!("{field} must not be empty")));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(Error::config_invalid(format!(
            "{field} '{value}' must only contain lowercase letters, digits and '-'"
        )));
    }
    Ok(())
}
