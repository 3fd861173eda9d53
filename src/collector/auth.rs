// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

/// Opaque credential for one authenticated domain. The token is
/// whatever the external login flow produced (session cookie or bearer
/// token); this store never speaks an authentication protocol itself.
#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Per-domain credential store, the seam to the external
/// credential/session provider. Expired tokens are dropped on read.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: Mutex<HashMap<String, Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from `WISSEN_TOKEN_<HOST>` environment variables, with
    /// dots and dashes in the host mapped to underscores.
    pub fn from_env(hosts: &[String]) -> Self {
        let store = Self::new();
        for host in hosts {
            let var = format!(
                "WISSEN_TOKEN_{}",
                host.to_uppercase().replace(['.', '-'], "_")
            );
            if let Ok(token) = std::env::var(&var) {
                if !token.trim().is_empty() {
                    store.store(host, token, None);
                }
            }
        }
        store
    }

    pub fn store(&self, domain: &str, token: String, expires_at: Option<DateTime<Utc>>) {
        let mut entries = self.entries.lock().expect("credential store poisoned");
        entries.insert(domain.to_string(), Credential { token, expires_at });
        info!("credentials stored for {}", domain);
    }

    pub fn clear(&self, domain: &str) {
        let mut entries = self.entries.lock().expect("credential store poisoned");
        entries.remove(domain);
    }

    pub fn is_valid(&self, domain: &str) -> bool {
        let mut entries = self.entries.lock().expect("credential store poisoned");
        match entries.get(domain) {
            None => false,
            Some(credential) => {
                if let Some(expiry) = credential.expires_at {
                    if Utc::now() > expiry {
                        warn!("credentials for {} have expired", domain);
                        entries.remove(domain);
                        return false;
                    }
                }
                true
            }
        }
    }

    /// HTTP headers for an authenticated request. Tokens starting with
    /// "Bearer " become an Authorization header, anything else is sent
    /// as a session cookie.
    pub fn headers_for(&self, domain: &str) -> Vec<(String, String)> {
        if !self.is_valid(domain) {
            return Vec::new();
        }
        let entries = self.entries.lock().expect("credential store poisoned");
        match entries.get(domain) {
            None => Vec::new(),
            Some(credential) => {
                if credential.token.starts_with("Bearer ") {
                    vec![("Authorization".to_string(), credential.token.clone())]
                } else {
                    vec![("Cookie".to_string(), credential.token.clone())]
                }
            }
        }
    }
}
