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

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use http::header::RETRY_AFTER;
use http::{HeaderMap, StatusCode};
use log::{debug, warn};
use sigproxy_core::time::{now, parse_http_date};
use sigproxy_core::{Error, ErrorKind};

use crate::RetryPolicy;

/// The longest a single backoff may wait.
pub const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Statuses whose `Retry-After` header is honored.
const RETRY_AFTER_STATUS_CODES: [StatusCode; 3] = [
    StatusCode::PAYLOAD_TOO_LARGE,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::SERVICE_UNAVAILABLE,
];

/// Statuses followed as redirects when a `Location` is present.
const REDIRECT_STATUS_CODES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// The budget an attempt's outcome draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Connect,
    Read,
    Redirect,
    Status,
    Other,
}

/// What the transport should do after an attempt.
#[derive(Debug, PartialEq)]
pub enum Decision {
    /// Try again after waiting.
    Retry(Duration),
    /// The budget of this category is spent.
    Exhausted,
}

/// RetryState tracks the budgets left while executing one request.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,

    connect: u32,
    read: u32,
    redirect: u32,
    status: u32,
    other: u32,

    backoff: ExponentialBackoff,
    /// Retries since the last redirect, used for backoff.
    consecutive: u32,
    /// Total retries and redirects taken.
    attempts: u32,
}

impl<'a> RetryState<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            connect: policy.connect,
            read: policy.read,
            redirect: policy.redirect,
            status: policy.status,
            other: policy.other,
            backoff: exponential_backoff(policy.backoff_factor),
            consecutive: 0,
            attempts: 0,
        }
    }

    /// Retries and redirects taken so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Draw from the budget of `category`, returning false when it is spent.
    fn take(&mut self, category: Category) -> bool {
        let budget = match category {
            Category::Connect => &mut self.connect,
            Category::Read => &mut self.read,
            Category::Redirect => &mut self.redirect,
            Category::Status => &mut self.status,
            Category::Other => &mut self.other,
        };
        if *budget == 0 {
            warn!("retry budget for {category:?} exhausted after {} attempts", self.attempts);
            return false;
        }
        *budget -= 1;
        self.attempts += 1;
        true
    }

    /// Wait before the next retry: nothing for the first consecutive retry,
    /// then `backoff_factor * 2^(n-1)` seconds capped at [`BACKOFF_MAX`].
    fn next_backoff(&mut self) -> Duration {
        self.consecutive += 1;
        // The first interval only advances the sequence.
        let delay = self.backoff.next_backoff().unwrap_or(BACKOFF_MAX);
        if self.consecutive <= 1 {
            return Duration::ZERO;
        }
        delay
    }

    /// Decide whether to retry after a transport error.
    ///
    /// Errors that never reached the network are not retried.
    pub fn on_error(&mut self, err: &Error) -> Option<Decision> {
        let category = match err.kind() {
            ErrorKind::Connect => Category::Connect,
            ErrorKind::ReadTimeout => Category::Read,
            ErrorKind::RequestInvalid | ErrorKind::MalformedBody => return None,
            _ => Category::Other,
        };
        if !self.take(category) {
            return Some(Decision::Exhausted);
        }
        let delay = self.next_backoff();
        debug!(
            "retrying after {category:?} error, attempt {} in {delay:?}: {err}",
            self.attempts
        );
        Some(Decision::Retry(delay))
    }

    /// Decide whether to retry a response with `status`.
    ///
    /// Returns `None` if the status is not listed as retryable.
    pub fn on_status(&mut self, status: StatusCode, headers: &HeaderMap) -> Option<Decision> {
        if !self.policy.status_forcelist.contains(&status.as_u16()) {
            return None;
        }
        if !self.take(Category::Status) {
            return Some(Decision::Exhausted);
        }
        let backoff = self.next_backoff();
        let delay = self.retry_after(status, headers).unwrap_or(backoff);
        debug!(
            "retrying after status {status}, attempt {} in {delay:?}",
            self.attempts
        );
        Some(Decision::Retry(delay))
    }

    /// Decide whether to follow a redirect. Redirects reset the backoff.
    pub fn on_redirect(&mut self, status: StatusCode) -> Decision {
        if !self.take(Category::Redirect) {
            return Decision::Exhausted;
        }
        self.backoff.reset();
        self.consecutive = 0;
        debug!("following redirect {status}, attempt {}", self.attempts);
        Decision::Retry(Duration::ZERO)
    }

    fn retry_after(&self, status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
        if !self.policy.respect_retry_after_header || !RETRY_AFTER_STATUS_CODES.contains(&status) {
            return None;
        }
        let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
        let delay = parse_retry_after(value);
        if delay.is_none() {
            warn!("ignoring invalid Retry-After value: {value}");
        }
        delay
    }
}

/// Build a jitter-free exponential backoff starting at `factor` seconds.
///
/// Factors that are negative or not finite wait nothing.
fn exponential_backoff(factor: f64) -> ExponentialBackoff {
    let factor = if factor.is_finite() { factor.max(0.0) } else { 0.0 };
    let initial = Duration::try_from_secs_f64(factor)
        .unwrap_or(BACKOFF_MAX)
        .min(BACKOFF_MAX);
    ExponentialBackoff {
        current_interval: initial,
        initial_interval: initial,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: BACKOFF_MAX,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Check whether `status` is a redirect the transport follows.
pub fn is_redirect(status: StatusCode) -> bool {
    REDIRECT_STATUS_CODES.contains(&status)
}

/// Parse a `Retry-After` value given as delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero wait.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<u64>().ok().map(Duration::from_secs);
    }
    let date = parse_http_date(value).ok()?;
    Some((date - now()).to_std().unwrap_or(Duration::ZERO))
}
