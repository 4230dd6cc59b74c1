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

//! Name rules shared by variables, clauses, hooks, callbacks, parties and bylaws.
//!
//! All checks here are pure predicates: they log the reason of a rejection and
//! leave it to the caller to refuse the operation.

use tracing::warn;

/// Prefix of variables carrying callback parameters.
pub const PREFIX_PARAM: &str = "param_";
/// Prefix of variables receiving callback return values.
pub const PREFIX_RETURN: &str = "return_";
/// Prefix of hooks triggered by cron processing.
pub const PREFIX_CRON: &str = "cron_";
/// Prefix of hooks triggered by contract events.
pub const PREFIX_HOOK: &str = "hook_";
/// Prefix of callbacks consulted by the engine.
pub const PREFIX_CALLBACK: &str = "callback_";

/// Whether a clause name would only be reachable through hook or callback
/// dispatch, and thus must never be triggered directly by a party.
pub fn is_reserved_clause_name(name: &str) -> bool {
    name.starts_with(PREFIX_CRON) ||
        name.starts_with(PREFIX_HOOK) ||
        name.starts_with(PREFIX_CALLBACK)
}

/// A name is valid iff it is non-empty and built only of ASCII alphanumerics and
/// underscores.
pub fn validate_name(name: &str) -> bool {
    if name.is_empty() {
        warn!("empty name");
        return false;
    }
    if let Some(ch) = name.chars().find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
        warn!(name, "name contains invalid character {ch:?}");
        return false;
    }
    true
}

pub fn validate_party_name(name: &str) -> bool { validate_name(name) }

pub fn validate_bylaw_name(name: &str) -> bool { validate_name(name) }

pub fn validate_agent_name(name: &str) -> bool { validate_name(name) }

pub fn validate_account_name(name: &str) -> bool { validate_name(name) }

pub fn validate_variable_name(name: &str) -> bool {
    if !validate_name(name) {
        return false;
    }
    if name.starts_with(PREFIX_PARAM) || name.starts_with(PREFIX_RETURN) {
        warn!(name, "variable name uses a prefix reserved for callback parameters and return values");
        return false;
    }
    true
}

pub fn validate_clause_name(name: &str) -> bool {
    if !validate_name(name) {
        return false;
    }
    if is_reserved_clause_name(name) {
        warn!(name, "clause name uses a prefix reserved for hooks and callbacks");
        return false;
    }
    true
}

pub fn validate_hook_name(name: &str) -> bool {
    if !validate_name(name) {
        return false;
    }
    if !name.starts_with(PREFIX_CRON) && !name.starts_with(PREFIX_HOOK) {
        warn!(name, "hook name must start with `{PREFIX_CRON}` or `{PREFIX_HOOK}`");
        return false;
    }
    true
}

pub fn validate_callback_name(name: &str) -> bool {
    if !validate_name(name) {
        return false;
    }
    if !name.starts_with(PREFIX_CALLBACK) {
        warn!(name, "callback name must start with `{PREFIX_CALLBACK}`");
        return false;
    }
    true
}
