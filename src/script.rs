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

//! Boundary to the embedded script interpreters.
//!
//! Interpreters are plugged in through [`ScriptRegistry`], which maps the
//! language tag declared by a bylaw onto a factory producing a fresh
//! [`ScriptEngine`] for each clause execution. Values cross the boundary by
//! copy: variables are pushed in before execution and the values the engine
//! ends up with are read back afterwards.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use std::time::Instant;

use crate::party::Party;
use crate::variable::{Value, Variable};

/// Language served by the built-in engine which executes nothing.
pub const LANGUAGE_NOOP: &str = "noop";

/// Functions the host exposes to every script.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum NativeCall {
    /// `get_time()`: current UNIX time in seconds.
    #[display("get_time")]
    GetTime,

    /// `party_may_execute_clause(party_name, clause_name)`: the direct execution
    /// gate of the contract.
    #[display("party_may_execute_clause")]
    PartyMayExecuteClause,
}

impl NativeCall {
    pub const ALL: [NativeCall; 2] = [NativeCall::GetTime, NativeCall::PartyMayExecuteClause];

    pub fn from_name(name: &str) -> Option<Self> {
        NativeCall::ALL
            .into_iter()
            .find(|call| call.to_string() == name)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ScriptError {
    /// no script engine is registered for language `{0}`.
    UnsupportedLanguage(String),

    /// script `{script}` failed: {details}.
    Execution { script: String, details: String },

    /// script `{0}` exceeded its execution deadline.
    Timeout(String),

    /// native call `{call}` failed: {details}.
    NativeCall { call: NativeCall, details: String },
}

/// Callback interface through which a running script reaches the contract.
pub trait ScriptHost {
    fn call_native(&mut self, call: NativeCall, args: &[Value]) -> Result<Value, ScriptError>;
}

pub trait ScriptEngine {
    fn language(&self) -> &str;

    fn register_native_call(&mut self, call: NativeCall);

    fn add_party(&mut self, name: &str, party: &Party);

    /// Copies the variable into the script symbol table under its name.
    fn add_variable(&mut self, variable: &Variable);

    /// Name under which the script is reported in diagnostics.
    fn set_display_filename(&mut self, name: &str);

    /// Engines able to interrupt a running script must give up once the
    /// deadline passes and report [`ScriptError::Timeout`].
    fn set_deadline(&mut self, deadline: Instant) { let _ = deadline; }

    /// Runs the script, returning the value of its final expression, if any.
    fn execute(&mut self, host: &mut dyn ScriptHost) -> Result<Option<Value>, ScriptError>;

    /// Value of a registered variable as the script left it.
    fn variable(&self, name: &str) -> Option<Value>;
}

pub type ScriptFactory = Rc<dyn Fn(&str) -> Box<dyn ScriptEngine>>;

/// Maps language tags onto engine factories.
#[derive(Clone)]
pub struct ScriptRegistry {
    factories: BTreeMap<String, ScriptFactory>,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        let mut registry = ScriptRegistry::empty();
        registry.register(LANGUAGE_NOOP, |code| Box::new(NoopEngine::new(code)));
        registry
    }
}

impl Debug for ScriptRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("languages", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptRegistry {
    pub fn empty() -> Self { ScriptRegistry { factories: none!() } }

    /// Registers (or replaces) the engine factory for a language.
    pub fn register(
        &mut self,
        language: impl Into<String>,
        factory: impl Fn(&str) -> Box<dyn ScriptEngine> + 'static,
    ) {
        self.factories.insert(language.into(), Rc::new(factory));
    }

    pub fn supports(&self, language: &str) -> bool { self.factories.contains_key(language) }

    pub fn languages(&self) -> impl Iterator<Item = &str> { self.factories.keys().map(String::as_str) }

    pub fn instantiate(&self, language: &str, code: &str) -> Result<Box<dyn ScriptEngine>, ScriptError> {
        let factory = self
            .factories
            .get(language)
            .ok_or_else(|| ScriptError::UnsupportedLanguage(language.to_owned()))?;
        Ok(factory(code))
    }
}

/// Engine which accepts any code and executes nothing.
#[derive(Clone, Debug, Default)]
pub struct NoopEngine {
    filename: String,
    variables: BTreeMap<String, Value>,
}

impl NoopEngine {
    pub fn new(_code: &str) -> Self { NoopEngine::default() }

    pub fn filename(&self) -> &str { &self.filename }
}

impl ScriptEngine for NoopEngine {
    fn language(&self) -> &str { LANGUAGE_NOOP }

    fn register_native_call(&mut self, _call: NativeCall) {}

    fn add_party(&mut self, _name: &str, _party: &Party) {}

    fn add_variable(&mut self, variable: &Variable) {
        self.variables
            .insert(variable.name().to_owned(), variable.value().clone());
    }

    fn set_display_filename(&mut self, name: &str) { self.filename = name.to_owned() }

    fn execute(&mut self, _host: &mut dyn ScriptHost) -> Result<Option<Value>, ScriptError> {
        Ok(None)
    }

    fn variable(&self, name: &str) -> Option<Value> { self.variables.get(name).cloned() }
}

#[cfg(test)]
mod test {
    use super::*;

    struct NoHost;
    impl ScriptHost for NoHost {
        fn call_native(&mut self, call: NativeCall, _: &[Value]) -> Result<Value, ScriptError> {
            Err(ScriptError::NativeCall { call, details: s!("no host") })
        }
    }

    #[test]
    fn native_call_names() {
        assert_eq!(NativeCall::from_name("get_time"), Some(NativeCall::GetTime));
        assert_eq!(
            NativeCall::from_name("party_may_execute_clause"),
            Some(NativeCall::PartyMayExecuteClause)
        );
        assert_eq!(NativeCall::from_name("transfer"), None);
    }

    #[test]
    fn registry_dispatch() {
        let registry = ScriptRegistry::default();
        assert!(registry.supports(LANGUAGE_NOOP));
        assert!(!registry.supports("chai"));
        assert_eq!(
            registry.instantiate("chai", "1;").err(),
            Some(ScriptError::UnsupportedLanguage(s!("chai")))
        );

        let mut engine = registry.instantiate(LANGUAGE_NOOP, "anything").unwrap();
        engine.add_variable(&Variable::persistent("x", 5));
        assert_eq!(engine.execute(&mut NoHost), Ok(None));
        assert_eq!(engine.variable("x"), Some(Value::Integer(5)));
        assert_eq!(engine.language(), LANGUAGE_NOOP);
    }
}
