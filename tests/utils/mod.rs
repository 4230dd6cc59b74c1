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

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

use rand::{rng, Rng};

use scriptable::{
    AccountInfo, Agent, AuthContext, Bylaw, Clause, MemAccounts, MemLedger, MemNym, MemNymStore,
    NativeCall, NotaryId, Nym, NymId, Party, PartyAccount, ScriptEngine, ScriptError, ScriptHost,
    ScriptRegistry, Scriptable, TransNo, Value, Variable,
};

pub const LANGUAGE: &str = "rec";
pub const NOTARY: &str = "notary_main";

/// What a single engine instance was given and what it did.
#[derive(Clone, Debug, Default)]
pub struct Run {
    pub filename: String,
    pub natives: Vec<NativeCall>,
    pub parties: Vec<String>,
    pub variables: BTreeMap<String, Value>,
    pub deadline: Option<Instant>,
    pub executed: bool,
}

pub type Log = Rc<RefCell<Vec<Run>>>;

/// Line-based toy language:
///
/// - `set NAME VALUE`, `incr NAME`
/// - `return VALUE`, `return_eq NAME VALUE`
/// - `native CALL ARGS..` (returns the call result)
/// - `fail`
pub struct RecordingEngine {
    code: String,
    log: Log,
    run: Run,
}

impl RecordingEngine {
    pub fn new(code: &str, log: Log) -> Self { RecordingEngine { code: code.to_owned(), log, run: Run::default() } }

    fn parse_value(&self, name: &str, text: &str) -> Value {
        match self.run.variables.get(name) {
            Some(Value::String(_)) => Value::from(text),
            _ => parse_value(text),
        }
    }
}

pub fn parse_value(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => text
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::from(text)),
    }
}

impl ScriptEngine for RecordingEngine {
    fn language(&self) -> &str { LANGUAGE }

    fn register_native_call(&mut self, call: NativeCall) { self.run.natives.push(call) }

    fn add_party(&mut self, name: &str, _party: &Party) { self.run.parties.push(name.to_owned()) }

    fn add_variable(&mut self, variable: &Variable) {
        self.run
            .variables
            .insert(variable.name().to_owned(), variable.value().clone());
    }

    fn set_display_filename(&mut self, name: &str) { self.run.filename = name.to_owned() }

    fn set_deadline(&mut self, deadline: Instant) { self.run.deadline = Some(deadline) }

    fn execute(&mut self, host: &mut dyn ScriptHost) -> Result<Option<Value>, ScriptError> {
        self.run.executed = true;
        self.log.borrow_mut().push(self.run.clone());
        let mut result = None;
        for line in self.code.clone().lines() {
            let words = line.split_whitespace().collect::<Vec<_>>();
            match words.as_slice() {
                [] => {}
                ["set", name, value] => {
                    let value = self.parse_value(name, value);
                    self.run.variables.insert(name.to_string(), value);
                }
                ["incr", name] => {
                    let next = match self.run.variables.get(*name) {
                        Some(Value::Integer(val)) => val + 1,
                        _ => 1,
                    };
                    self.run
                        .variables
                        .insert(name.to_string(), Value::Integer(next));
                }
                ["return", value] => result = Some(parse_value(value)),
                ["return_eq", name, value] => {
                    let equal = self
                        .run
                        .variables
                        .get(*name)
                        .is_some_and(|val| val.to_string() == *value);
                    result = Some(Value::Bool(equal));
                }
                ["native", call, args @ ..] => {
                    let call = NativeCall::from_name(call).ok_or_else(|| ScriptError::Execution {
                        script: self.run.filename.clone(),
                        details: format!("unknown native call {call}"),
                    })?;
                    let args = args.iter().map(|arg| parse_value(arg)).collect::<Vec<_>>();
                    result = Some(host.call_native(call, &args)?);
                }
                ["fail"] => {
                    return Err(ScriptError::Execution {
                        script: self.run.filename.clone(),
                        details: s!("failure requested"),
                    });
                }
                _ => {
                    return Err(ScriptError::Execution {
                        script: self.run.filename.clone(),
                        details: format!("can't parse `{line}`"),
                    });
                }
            }
        }
        Ok(result)
    }

    fn variable(&self, name: &str) -> Option<Value> { self.run.variables.get(name).cloned() }
}

pub fn recording_registry(log: &Log) -> ScriptRegistry {
    let mut registry = ScriptRegistry::default();
    let log = log.clone();
    registry.register(LANGUAGE, move |code| Box::new(RecordingEngine::new(code, log.clone())));
    registry
}

pub fn template_party(name: &str) -> Party {
    let mut party = Party::template(name);
    party
        .add_agent(Agent::template(format!("{name}_agent")))
        .unwrap();
    party
        .add_account(PartyAccount::template(format!("{name}_acct"), "usd"))
        .unwrap();
    party
}

pub fn concrete_party(name: &str, nym: &MemNym, opening: TransNo, closing: TransNo) -> Party {
    let agent = format!("{name}_agent");
    let mut party = Party::with_nym(name, nym.id().clone(), agent.clone(), opening).unwrap();
    party
        .add_account(PartyAccount::new(format!("{name}_acct"), agent, format!("acct_{name}"), "usd", closing))
        .unwrap();
    party
}

/// Escrow bylaw in the recording language.
pub fn escrow_bylaw() -> Bylaw {
    let mut bylaw = Bylaw::new("escrow", LANGUAGE);
    bylaw.add_variable(Variable::persistent("counter", 0)).unwrap();
    bylaw.add_variable(Variable::important("status", "open")).unwrap();
    bylaw.add_variable(Variable::constant("fee", 5)).unwrap();
    bylaw.add_clause(Clause::new("tick", "incr counter")).unwrap();
    bylaw.add_clause(Clause::new("close", "set status closed")).unwrap();
    bylaw.add_clause(Clause::new("pay", "set counter 100")).unwrap();
    bylaw.add_clause(Clause::new("bump_fee", "set fee 10")).unwrap();
    bylaw.add_hook("cron_daily", "tick").unwrap();
    bylaw.add_hook("hook_a", "tick").unwrap();
    bylaw.add_hook("hook_a", "close").unwrap();
    bylaw.add_hook("hook_b", "tick").unwrap();
    bylaw
}

pub fn draft(log: &Log) -> Scriptable {
    let mut contract = Scriptable::with_registry(Default::default(), recording_registry(log));
    contract.add_party(template_party("buyer")).unwrap();
    contract.add_party(template_party("seller")).unwrap();
    contract.add_bylaw(escrow_bylaw()).unwrap();
    contract
}

pub fn new_log() -> Log { Rc::new(RefCell::new(vec![])) }

/// Nym with a fresh random signing key.
pub fn new_nym(id: &str) -> MemNym {
    let mut seed = [0u8; 32];
    rng().fill(&mut seed);
    MemNym::from_seed(id, &seed)
}

/// Ledger, wallet and account registry of a notary.
pub struct Notary {
    pub id: NotaryId,
    pub nyms: MemNymStore,
    pub ledger: MemLedger,
    pub accounts: MemAccounts,
}

impl Notary {
    pub fn new(nyms: &[&MemNym]) -> Self {
        let mut store = MemNymStore::new();
        for nym in nyms {
            store.insert(nym.public());
        }
        Notary { id: NotaryId::from(NOTARY), nyms: store, ledger: MemLedger::new(), accounts: MemAccounts::new() }
    }

    pub fn issue(&mut self, nym: &MemNym, number: TransNo) {
        self.ledger
            .issue(nym.id(), &self.id, number)
    }

    pub fn open_account(&mut self, id: &str, owner: &MemNym, instrument: &str) {
        self.accounts.insert(AccountInfo {
            id: id.into(),
            owner: owner.id().clone(),
            instrument_definition_id: instrument.into(),
        });
    }

    pub fn ctx<'a>(&'a mut self, signer: &NymId) -> AuthContext<'a> {
        AuthContext {
            notary_id: self.id.clone(),
            signer_id: signer.clone(),
            loaded_nyms: None,
            resolver: &self.nyms,
            ledger: &mut self.ledger,
            accounts: &self.accounts,
        }
    }
}
