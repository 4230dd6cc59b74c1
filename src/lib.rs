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

#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    // missing_docs
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

// CONTRACT MODEL:
// Scriptable   :: {Party}, {Bylaw}, [opening numbers in order of signing]
// Party        :: {Agent}, {PartyAccount}, signed copy
// Bylaw        :: language, {Variable}, {Clause}, hook -> {Clause}, callback -> Clause
//
// LIFECYCLE:
// draft    :: template parties + bylaws -> ContractId (id form of the text)
// confirm  :: Scriptable, Party, NymSigner -> Scriptable -- replaces template,
//                                                      -- stores signed copy
// verify   :: Scriptable, Party, AuthContext -> () -- signed copy, signature,
//                                               -- opening number burn
// dispatch :: Scriptable, hook -> HookOutcome -- runs bound clauses through
//                                            -- ScriptEngine

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

pub mod names;
pub mod ids;
pub mod armor;
pub mod tag;
pub mod variable;
pub mod clause;
pub mod script;
pub mod bylaw;
pub mod party;
pub mod ledger;
pub mod identity;
pub mod contract;
pub mod config;
pub mod scriptable;
mod auth;

pub use armor::ArmorError;
pub use auth::{AuthContext, AuthError, ConfirmError};
pub use bylaw::{Bylaw, BylawError, DEFAULT_LANGUAGE};
pub use clause::{Clause, EMPTY_CLAUSE_CODE};
pub use config::Config;
pub use contract::{ContractError, ContractSignature, SignedContract};
pub use identity::{MemNym, MemNymStore, Nym, NymResolver, NymSigner, PublicNym, Signature};
pub use ids::{AccountId, ContractId, InstrumentDefinitionId, NotaryId, NymId, TransNo};
pub use ledger::{AccountDirectory, AccountInfo, MemAccounts, MemLedger, TransactionLedger};
pub use party::{Agent, Party, PartyAccount, PartyError};
pub use script::{NativeCall, NoopEngine, ScriptEngine, ScriptError, ScriptHost, ScriptRegistry, LANGUAGE_NOOP};
pub use scriptable::{
    HookOutcome, Scriptable, ScriptableError, CALLBACK_PARTY_MAY_CANCEL_CONTRACT,
    CALLBACK_PARTY_MAY_EXECUTE_CLAUSE, PARAM_CLAUSE_NAME, PARAM_PARTY_NAME, RETURN_VALUE,
};
pub use tag::{ParseError, Tag};
pub use variable::{Value, Variable, VariableAccess, VariableError, VariableType};
