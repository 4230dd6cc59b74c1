// Smart-contract scripting engine for Open-Transactions
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2010-2025 by the Open-Transactions Developers.
//
// Copyright (C) 2010-2025 Open-Transactions Developers.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

use std::time::{Duration, Instant};

use crate::bylaw::DEFAULT_LANGUAGE;

/// Settings of a scriptable contract runtime.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase", default))]
pub struct Config {
    /// Scripting language assumed for bylaws which do not name one.
    pub default_language: String,

    /// Upper bound on a single script execution, in milliseconds. Scripts run
    /// without a deadline when unset.
    pub script_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self { Config { default_language: DEFAULT_LANGUAGE.to_owned(), script_timeout_ms: None } }
}

impl Config {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn script_timeout(&self) -> Option<Duration> { self.script_timeout_ms.map(Duration::from_millis) }

    /// Deadline for a script starting now.
    pub fn script_deadline(&self) -> Option<Instant> {
        self.script_timeout().and_then(|timeout| Instant::now().checked_add(timeout))
    }
}
