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

use crate::{Context, Error, ProvideCredential, Result, SignRequest, SigningCredential};
use log::debug;
use std::sync::{Arc, Mutex};

/// Signer loads credentials through a provider, caches them and signs requests.
///
/// The cache is shared by every clone of the signer, so one signer can serve
/// concurrent invocations for different services and regions.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = K>>,
    credential: Arc<Mutex<Option<K>>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer.
    pub fn new(ctx: Context, loader: impl ProvideCredential<Credential = K>) -> Self {
        Self {
            ctx,
            loader: Arc::new(loader),
            credential: Arc::new(Mutex::new(None)),
        }
    }

    /// The context this signer loads credentials with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Get a valid credential, reloading it from the provider when the cached one
    /// is missing or about to expire.
    pub async fn credential(&self) -> Result<K> {
        let cached = self.credential.lock().expect("lock poisoned").clone();
        if let Some(cred) = cached.filter(|v| v.is_valid()) {
            return Ok(cred);
        }

        debug!("no valid cached credential, loading from provider");
        let loaded = self.loader.provide_credential(&self.ctx).await?;
        let Some(cred) = loaded.filter(|v| v.is_valid()) else {
            return Err(Error::credentials_unavailable(
                "no valid credential found from any provider",
            ));
        };

        *self.credential.lock().expect("lock poisoned") = Some(cred.clone());
        Ok(cred)
    }

    /// Sign the request with `builder`.
    pub async fn sign(
        &self,
        builder: &impl SignRequest<Credential = K>,
        req: &mut http::request::Parts,
        body: &[u8],
    ) -> Result<()> {
        let cred = self.credential().await?;
        builder.sign_request(&self.ctx, req, body, &cred).await
    }
}
