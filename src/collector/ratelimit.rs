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

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Per-domain request spacing, shared across concurrent callers.
///
/// Each caller reserves the next free slot for its domain under the
/// lock, then sleeps outside it, so N requests against one domain take
/// at least (N-1) * min_interval of wall-clock time regardless of
/// concurrency. The floor also holds under retries.
pub struct DomainRateLimiter {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl DomainRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until this domain's next request slot is due.
    pub async fn acquire(&self, domain: &str) {
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(domain).copied().map_or(now, |t| t.max(now));
            slots.insert(domain.to_string(), slot + self.min_interval);
            slot
        };
        sleep_until(slot).await;
    }
}
