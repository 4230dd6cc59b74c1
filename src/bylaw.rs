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

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use tracing::{error, warn};

use crate::clause::Clause;
use crate::names::{
    validate_bylaw_name, validate_callback_name, validate_clause_name, validate_hook_name,
    validate_variable_name,
};
use crate::script::ScriptEngine;
use crate::tag::{ParseError, Tag};
use crate::variable::Variable;

/// Scripting language assumed when a bylaw does not name one.
pub const DEFAULT_LANGUAGE: &str = "chai";

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum BylawError {
    /// invalid bylaw name `{0}`.
    InvalidBylawName(String),

    /// invalid variable name `{0}`.
    InvalidVariableName(String),

    /// invalid clause name `{0}`.
    InvalidClauseName(String),

    /// invalid hook name `{0}`.
    InvalidHookName(String),

    /// invalid callback name `{0}`.
    InvalidCallbackName(String),

    /// variable `{0}` already exists.
    DuplicateVariable(String),

    /// clause `{0}` already exists.
    DuplicateClause(String),

    /// clause `{clause}` is already bound to hook `{hook}`.
    DuplicateHook { hook: String, clause: String },

    /// callback `{0}` is already bound to a clause.
    DuplicateCallback(String),

    /// unknown clause `{0}`.
    UnknownClause(String),

    /// unknown callback `{0}`.
    UnknownCallback(String),
}

/// Aggregate of variables and clauses, together with the bindings of hooks
/// and callbacks to the clauses.
///
/// A hook may fire any number of clauses, while each callback is served by
/// exactly one clause.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Bylaw {
    name: String,
    language: String,
    variables: BTreeMap<String, Variable>,
    clauses: BTreeMap<String, Clause>,
    hooks: BTreeMap<String, IndexSet<String>>,
    callbacks: BTreeMap<String, String>,
}

impl Bylaw {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Bylaw {
            name: name.into(),
            language: language.into(),
            variables: none!(),
            clauses: none!(),
            hooks: none!(),
            callbacks: none!(),
        }
    }

    pub fn with_default_language(name: impl Into<String>) -> Self { Self::new(name, DEFAULT_LANGUAGE) }

    pub fn name(&self) -> &str { &self.name }

    pub fn language(&self) -> &str { &self.language }

    pub fn variable_count(&self) -> usize { self.variables.len() }

    pub fn clause_count(&self) -> usize { self.clauses.len() }

    /// Number of hook-to-clause bindings.
    pub fn hook_count(&self) -> usize { self.hooks.values().map(IndexSet::len).sum() }

    pub fn callback_count(&self) -> usize { self.callbacks.len() }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> { self.variables.values() }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> { self.clauses.values() }

    /// All hook-to-clause bindings, as `(hook, clause)` name pairs.
    pub fn hooks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.hooks.iter().flat_map(|(hook, clauses)| {
            clauses
                .iter()
                .map(move |clause| (hook.as_str(), clause.as_str()))
        })
    }

    /// All callback bindings, as `(callback, clause)` name pairs.
    pub fn callbacks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.callbacks
            .iter()
            .map(|(callback, clause)| (callback.as_str(), clause.as_str()))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> { self.variables.get(name) }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> { self.variables.get_mut(name) }

    pub fn clause(&self, name: &str) -> Option<&Clause> { self.clauses.get(name) }

    pub fn clause_mut(&mut self, name: &str) -> Option<&mut Clause> { self.clauses.get_mut(name) }

    /// Clause serving the callback, if the callback is bound here.
    pub fn callback(&self, name: &str) -> Option<&Clause> {
        let clause = self.callbacks.get(name)?;
        let found = self.clauses.get(clause);
        if found.is_none() {
            error!(bylaw = %self.name, callback = name, clause = %clause, "callback bound to a missing clause");
        }
        found
    }

    pub fn has_callback(&self, name: &str) -> bool { self.callbacks.contains_key(name) }

    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), BylawError> {
        let name = variable.name().to_owned();
        if !validate_variable_name(&name) {
            return Err(BylawError::InvalidVariableName(name));
        }
        if self.variables.contains_key(&name) {
            warn!(bylaw = %self.name, variable = %name, "variable already exists");
            return Err(BylawError::DuplicateVariable(name));
        }
        variable.set_bylaw(&self.name);
        self.variables.insert(name, variable);
        Ok(())
    }

    pub fn add_clause(&mut self, mut clause: Clause) -> Result<(), BylawError> {
        let name = clause.name().to_owned();
        if !validate_clause_name(&name) {
            return Err(BylawError::InvalidClauseName(name));
        }
        if self.clauses.contains_key(&name) {
            warn!(bylaw = %self.name, clause = %name, "clause already exists");
            return Err(BylawError::DuplicateClause(name));
        }
        clause.set_bylaw(&self.name);
        self.clauses.insert(name, clause);
        Ok(())
    }

    pub fn add_hook(&mut self, hook: impl Into<String>, clause: impl Into<String>) -> Result<(), BylawError> {
        let (hook, clause) = (hook.into(), clause.into());
        if !validate_hook_name(&hook) {
            return Err(BylawError::InvalidHookName(hook));
        }
        if !validate_clause_name(&clause) {
            return Err(BylawError::InvalidClauseName(clause));
        }
        if !self.clauses.contains_key(&clause) {
            return Err(BylawError::UnknownClause(clause));
        }
        let bound = self.hooks.entry(hook.clone()).or_default();
        if bound.contains(&clause) {
            return Err(BylawError::DuplicateHook { hook, clause });
        }
        bound.insert(clause);
        Ok(())
    }

    pub fn add_callback(&mut self, callback: impl Into<String>, clause: impl Into<String>) -> Result<(), BylawError> {
        let (callback, clause) = (callback.into(), clause.into());
        if !validate_callback_name(&callback) {
            return Err(BylawError::InvalidCallbackName(callback));
        }
        if !validate_clause_name(&clause) {
            return Err(BylawError::InvalidClauseName(clause));
        }
        if !self.clauses.contains_key(&clause) {
            return Err(BylawError::UnknownClause(clause));
        }
        if self.callbacks.contains_key(&callback) {
            warn!(bylaw = %self.name, callback = %callback, "callback already bound");
            return Err(BylawError::DuplicateCallback(callback));
        }
        self.callbacks.insert(callback, clause);
        Ok(())
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Variable> { self.variables.remove(name) }

    /// Removes the clause together with every hook and callback binding
    /// pointing to it.
    pub fn remove_clause(&mut self, name: &str) -> Result<Clause, BylawError> {
        self.remove_clause_and_bindings(name)
    }

    /// Unbinds the callback and removes the clause which served it, with all
    /// of the clause's other bindings.
    pub fn remove_callback(&mut self, name: &str) -> Result<Clause, BylawError> {
        let clause = self
            .callbacks
            .remove(name)
            .ok_or_else(|| BylawError::UnknownCallback(name.to_owned()))?;
        self.remove_clause_and_bindings(&clause)
    }

    /// Unbinds a single clause from a hook; the clause itself stays.
    pub fn remove_hook(&mut self, hook: &str, clause: &str) -> bool {
        let Some(bound) = self.hooks.get_mut(hook) else {
            return false;
        };
        let removed = bound.shift_remove(clause);
        if bound.is_empty() {
            self.hooks.remove(hook);
        }
        removed
    }

    fn remove_clause_and_bindings(&mut self, name: &str) -> Result<Clause, BylawError> {
        let clause = self
            .clauses
            .remove(name)
            .ok_or_else(|| BylawError::UnknownClause(name.to_owned()))?;
        self.callbacks.retain(|_, bound| bound != name);
        self.hooks.retain(|_, bound| {
            bound.shift_remove(name);
            !bound.is_empty()
        });
        Ok(clause)
    }

    /// Collects the clauses bound to a hook into `out`, keyed by clause name.
    ///
    /// Returns whether any clause was found.
    pub fn get_hooks<'a>(&'a self, hook: &str, out: &mut BTreeMap<String, &'a Clause>) -> bool {
        let Some(bound) = self.hooks.get(hook) else {
            return false;
        };
        let mut found = false;
        for name in bound {
            match self.clauses.get(name) {
                Some(clause) => {
                    out.insert(name.clone(), clause);
                    found = true;
                }
                None => error!(bylaw = %self.name, hook, clause = %name, "hook bound to a missing clause"),
            }
        }
        found
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> { self.hooks.keys().map(String::as_str) }

    pub fn is_dirty(&self) -> bool {
        self.variables.values().any(|variable| {
            if !variable.is_dirty() {
                return false;
            }
            if variable.is_constant() {
                error!(bylaw = %self.name, variable = %variable.name(), "constant variable is dirty");
                debug_assert!(false, "constant variable `{}` is dirty", variable.name());
                return false;
            }
            true
        })
    }

    pub fn is_dirty_important(&self) -> bool { self.variables.values().any(Variable::is_dirty_important) }

    pub fn set_as_clean(&mut self) { self.variables.values_mut().for_each(Variable::set_clean) }

    /// Pushes every variable into the script, resetting their dirty-tracking
    /// baselines.
    pub fn register_variables_for_execution(&mut self, script: &mut dyn ScriptEngine) {
        for variable in self.variables.values_mut() {
            variable.register_for_execution(script);
        }
    }

    /// Copies back the values the script left in its copies of the variables.
    /// Constants are never written back.
    pub(crate) fn accept_script_values(&mut self, script: &dyn ScriptEngine) {
        for variable in self.variables.values_mut() {
            if variable.is_constant() {
                continue;
            }
            let Some(value) = script.variable(variable.name()) else {
                continue;
            };
            if !variable.accept_script_value(value) {
                warn!(bylaw = %self.name, variable = %variable.name(), "script produced a value of a wrong type");
            }
        }
    }

    pub fn compare(&self, rhs: &Bylaw) -> bool {
        if self.name != rhs.name || self.language != rhs.language {
            warn!(left = %self.name, right = %rhs.name, "bylaw names or languages differ");
            return false;
        }
        if self.variable_count() != rhs.variable_count() ||
            self.clause_count() != rhs.clause_count() ||
            self.hook_count() != rhs.hook_count() ||
            self.callback_count() != rhs.callback_count()
        {
            warn!(bylaw = %self.name, "bylaws differ in number of variables, clauses, hooks or callbacks");
            return false;
        }
        for variable in self.variables.values() {
            match rhs.variable(variable.name()) {
                Some(other) if variable.compare(other) => {}
                _ => return false,
            }
        }
        for clause in self.clauses.values() {
            match rhs.clause(clause.name()) {
                Some(other) if clause.compare(other) => {}
                _ => return false,
            }
        }
        let hook_names = self
            .hook_names()
            .chain(rhs.hook_names())
            .collect::<BTreeSet<_>>();
        for hook in hook_names {
            let mut mine = BTreeMap::new();
            let mut theirs = BTreeMap::new();
            self.get_hooks(hook, &mut mine);
            rhs.get_hooks(hook, &mut theirs);
            if mine.len() != theirs.len() || mine.keys().any(|name| !theirs.contains_key(name)) {
                warn!(bylaw = %self.name, hook, "bylaws bind different clauses to the hook");
                return false;
            }
        }
        if self.callbacks != rhs.callbacks {
            warn!(bylaw = %self.name, "bylaws bind callbacks differently");
            return false;
        }
        true
    }

    pub fn to_tag(&self, for_id: bool) -> Tag {
        let mut tag = Tag::new("bylaw");
        tag.add_attribute("name", &self.name);
        tag.add_attribute("language", &self.language);
        tag.add_attribute("numVariables", self.variable_count());
        tag.add_attribute("numClauses", self.clause_count());
        tag.add_attribute("numHooks", self.hook_count());
        tag.add_attribute("numCallbacks", self.callback_count());
        for variable in self.variables.values() {
            tag.add_tag(variable.to_tag(for_id));
        }
        for clause in self.clauses.values() {
            tag.add_tag(clause.to_tag());
        }
        for (hook, clause) in self.hooks() {
            let mut child = Tag::new("hook");
            child.add_attribute("name", hook);
            child.add_attribute("clause", clause);
            tag.add_tag(child);
        }
        for (callback, clause) in self.callbacks() {
            let mut child = Tag::new("callback");
            child.add_attribute("name", callback);
            child.add_attribute("clause", clause);
            tag.add_tag(child);
        }
        tag
    }

    /// Reads a bylaw; an empty language attribute falls back to
    /// `default_language`.
    pub fn from_tag(tag: &Tag, default_language: &str) -> Result<Self, ParseError> {
        tag.expect_name("bylaw")?;
        let name = tag.required_attr("name")?;
        if !validate_bylaw_name(name) {
            return Err(invalid(BylawError::InvalidBylawName(name.to_owned())));
        }
        let language = match tag.optional_attr("language") {
            "" => default_language,
            language => language,
        };
        let mut bylaw = Bylaw::new(name, language);

        for child in tag.children_named("variable", tag.parse_attr("numVariables")?)? {
            bylaw.add_variable(Variable::from_tag(child)?).map_err(invalid)?;
        }
        for child in tag.children_named("clause", tag.parse_attr("numClauses")?)? {
            bylaw.add_clause(Clause::from_tag(child)?).map_err(invalid)?;
        }
        for child in tag.children_named("hook", tag.parse_attr("numHooks")?)? {
            bylaw
                .add_hook(child.required_attr("name")?, child.required_attr("clause")?)
                .map_err(invalid)?;
        }
        for child in tag.children_named("callback", tag.parse_attr("numCallbacks")?)? {
            bylaw
                .add_callback(child.required_attr("name")?, child.required_attr("clause")?)
                .map_err(invalid)?;
        }
        Ok(bylaw)
    }
}

fn invalid(err: BylawError) -> ParseError { ParseError::InvalidContent(err.to_string()) }
