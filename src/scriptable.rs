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

//! Smart contract: parties bound together by bylaws.
//!
//! [`Scriptable`] owns its parties and bylaws, dispatches hooks and callbacks
//! to clause scripts, tracks which persistent state the scripts changed, and
//! produces the canonical text form of the contract from which its signed
//! copies and its [`ContractId`] derive. Authorization of parties against
//! their signed copies is implemented in the `auth` module.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::bylaw::{Bylaw, BylawError};
use crate::clause::Clause;
use crate::config::Config;
use crate::contract::{ContractError, ContractSignature, SignedContract};
use crate::identity::{Nym, NymSigner};
use crate::ids::{AccountId, ContractId, NymId, TransNo};
use crate::names::{is_reserved_clause_name, validate_bylaw_name, validate_party_name};
use crate::party::{Agent, Party, PartyAccount, PartyError};
use crate::script::{NativeCall, ScriptError, ScriptHost, ScriptRegistry};
use crate::tag::{ParseError, Tag};
use crate::variable::{Value, Variable, VariableAccess};

/// Callback consulted before a party executes a clause directly.
pub const CALLBACK_PARTY_MAY_EXECUTE_CLAUSE: &str = "callback_party_may_execute_clause";
/// Callback consulted before a party cancels the contract.
pub const CALLBACK_PARTY_MAY_CANCEL_CONTRACT: &str = "callback_party_may_cancel_contract";

pub const PARAM_PARTY_NAME: &str = "param_party_name";
pub const PARAM_CLAUSE_NAME: &str = "param_clause_name";
pub const RETURN_VALUE: &str = "return_val";

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ScriptableError {
    /// invalid party name `{0}`.
    InvalidPartyName(String),

    /// invalid bylaw name `{0}`.
    InvalidBylawName(String),

    /// party `{0}` already exists.
    DuplicateParty(String),

    /// bylaw `{0}` already exists.
    DuplicateBylaw(String),

    /// unknown party `{0}`.
    UnknownParty(String),

    /// unknown bylaw `{0}`.
    UnknownBylaw(String),

    /// unknown clause `{0}`.
    UnknownClause(String),

    /// unknown callback `{0}`.
    UnknownCallback(String),

    #[from]
    #[display(inner)]
    Bylaw(BylawError),

    #[from]
    #[display(inner)]
    Party(PartyError),

    #[from]
    #[display(inner)]
    Script(ScriptError),

    #[from]
    #[display(inner)]
    Parse(ParseError),

    #[from]
    #[display(inner)]
    Contract(ContractError),
}

/// Result of firing a hook.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct HookOutcome {
    /// Clauses which ran to completion, in execution order.
    pub executed: Vec<String>,
    /// Clauses whose scripts failed; their variable changes are discarded.
    pub failed: Vec<String>,
    /// Some persistent variable changed.
    pub dirty: bool,
    /// Some important variable changed, so the parties must be notified.
    pub notice_required: bool,
}

/// Smart contract made of parties and bylaws.
#[derive(Clone, Debug)]
pub struct Scriptable {
    config: Config,
    registry: ScriptRegistry,
    label: String,
    specify_instrument_definition_id: bool,
    specify_parties: bool,
    parties: BTreeMap<String, Party>,
    bylaws: BTreeMap<String, Bylaw>,
    opening_numbers: Vec<TransNo>,
    signed_content: Option<String>,
    signatures: Vec<ContractSignature>,
    // Nesting of policy callbacks currently running; never serialized.
    policy_depth: usize,
}

impl Default for Scriptable {
    fn default() -> Self { Scriptable::with_config(Config::default()) }
}

impl Scriptable {
    pub fn new() -> Self { Scriptable::default() }

    pub fn with_config(config: Config) -> Self { Scriptable::with_registry(config, ScriptRegistry::default()) }

    pub fn with_registry(config: Config, registry: ScriptRegistry) -> Self {
        Scriptable {
            config,
            registry,
            label: none!(),
            specify_instrument_definition_id: false,
            specify_parties: false,
            parties: none!(),
            bylaws: none!(),
            opening_numbers: none!(),
            signed_content: None,
            signatures: none!(),
            policy_depth: 0,
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn registry(&self) -> &ScriptRegistry { &self.registry }

    pub fn registry_mut(&mut self) -> &mut ScriptRegistry { &mut self.registry }

    /// Display label; not a part of the contract text.
    pub fn label(&self) -> &str { &self.label }

    pub fn set_label(&mut self, label: impl Into<String>) { self.label = label.into() }

    pub fn specify_instrument_definition_id(&self) -> bool { self.specify_instrument_definition_id }

    pub fn set_specify_instrument_definition_id(&mut self, flag: bool) { self.specify_instrument_definition_id = flag }

    pub fn specify_parties(&self) -> bool { self.specify_parties }

    pub fn set_specify_parties(&mut self, flag: bool) { self.specify_parties = flag }

    /// Opening transaction numbers of the confirmed parties, in the order the
    /// parties signed.
    pub fn opening_numbers_in_order_of_signing(&self) -> &[TransNo] { &self.opening_numbers }

    pub(crate) fn push_opening_number(&mut self, no: TransNo) { self.opening_numbers.push(no) }

    // Parties and bylaws ----------------------------------------------------

    pub fn party_count(&self) -> usize { self.parties.len() }

    pub fn bylaw_count(&self) -> usize { self.bylaws.len() }

    pub fn parties(&self) -> impl Iterator<Item = &Party> { self.parties.values() }

    pub fn bylaws(&self) -> impl Iterator<Item = &Bylaw> { self.bylaws.values() }

    pub fn party(&self, name: &str) -> Option<&Party> { self.parties.get(name) }

    pub fn party_mut(&mut self, name: &str) -> Option<&mut Party> { self.parties.get_mut(name) }

    pub fn bylaw(&self, name: &str) -> Option<&Bylaw> { self.bylaws.get(name) }

    pub fn bylaw_mut(&mut self, name: &str) -> Option<&mut Bylaw> { self.bylaws.get_mut(name) }

    pub fn add_party(&mut self, party: Party) -> Result<(), ScriptableError> {
        let name = party.name().to_owned();
        if !validate_party_name(&name) {
            return Err(ScriptableError::InvalidPartyName(name));
        }
        if self.parties.contains_key(&name) {
            warn!(party = %name, "party already exists");
            return Err(ScriptableError::DuplicateParty(name));
        }
        self.parties.insert(name, party);
        Ok(())
    }

    /// Replaces a party with its confirmed counterpart, returning the previous
    /// one.
    pub(crate) fn replace_party(&mut self, party: Party) -> Option<Party> {
        self.parties.insert(party.name().to_owned(), party)
    }

    pub fn remove_party(&mut self, name: &str) -> Option<Party> { self.parties.remove(name) }

    /// Adds a bylaw, provided none of its variables, clauses and callbacks
    /// collides with the ones already present in the contract.
    pub fn add_bylaw(&mut self, bylaw: Bylaw) -> Result<(), ScriptableError> {
        let name = bylaw.name().to_owned();
        if !validate_bylaw_name(&name) {
            return Err(ScriptableError::InvalidBylawName(name));
        }
        if self.bylaws.contains_key(&name) {
            warn!(bylaw = %name, "bylaw already exists");
            return Err(ScriptableError::DuplicateBylaw(name));
        }
        for variable in bylaw.variables() {
            self.ensure_unused_variable(variable.name())?;
        }
        for clause in bylaw.clauses() {
            self.ensure_unused_clause(clause.name())?;
        }
        for (callback, _) in bylaw.callbacks() {
            self.ensure_unused_callback(callback)?;
        }
        self.bylaws.insert(name, bylaw);
        Ok(())
    }

    pub fn remove_bylaw(&mut self, name: &str) -> Option<Bylaw> { self.bylaws.remove(name) }

    // Bylaw content, unique across the whole contract ------------------------

    pub fn add_variable(&mut self, bylaw: &str, variable: Variable) -> Result<(), ScriptableError> {
        self.ensure_unused_variable(variable.name())?;
        self.bylaw_entry(bylaw)?.add_variable(variable)?;
        Ok(())
    }

    pub fn add_clause(&mut self, bylaw: &str, clause: Clause) -> Result<(), ScriptableError> {
        self.ensure_unused_clause(clause.name())?;
        self.bylaw_entry(bylaw)?.add_clause(clause)?;
        Ok(())
    }

    pub fn add_hook(&mut self, bylaw: &str, hook: &str, clause: &str) -> Result<(), ScriptableError> {
        self.bylaw_entry(bylaw)?.add_hook(hook, clause)?;
        Ok(())
    }

    pub fn add_callback(&mut self, bylaw: &str, callback: &str, clause: &str) -> Result<(), ScriptableError> {
        self.ensure_unused_callback(callback)?;
        self.bylaw_entry(bylaw)?.add_callback(callback, clause)?;
        Ok(())
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Variable> {
        self.bylaws
            .values_mut()
            .find_map(|bylaw| bylaw.remove_variable(name))
    }

    /// Removes the clause from whichever bylaw owns it, with all its hook and
    /// callback bindings.
    pub fn remove_clause(&mut self, name: &str) -> Result<Clause, ScriptableError> {
        let bylaw = self
            .bylaws
            .values_mut()
            .find(|bylaw| bylaw.clause(name).is_some())
            .ok_or_else(|| ScriptableError::UnknownClause(name.to_owned()))?;
        Ok(bylaw.remove_clause(name)?)
    }

    /// Unbinds the callback and removes the clause serving it.
    pub fn remove_callback(&mut self, name: &str) -> Result<Clause, ScriptableError> {
        let bylaw = self
            .bylaws
            .values_mut()
            .find(|bylaw| bylaw.has_callback(name))
            .ok_or_else(|| ScriptableError::UnknownCallback(name.to_owned()))?;
        Ok(bylaw.remove_callback(name)?)
    }

    pub fn remove_hook(&mut self, hook: &str, clause: &str) -> bool {
        self.bylaws
            .values_mut()
            .fold(false, |removed, bylaw| bylaw.remove_hook(hook, clause) || removed)
    }

    fn bylaw_entry(&mut self, name: &str) -> Result<&mut Bylaw, ScriptableError> {
        self.bylaws
            .get_mut(name)
            .ok_or_else(|| ScriptableError::UnknownBylaw(name.to_owned()))
    }

    fn ensure_unused_variable(&self, name: &str) -> Result<(), ScriptableError> {
        if self.variable(name).is_some() {
            warn!(variable = %name, "variable name is already used in the contract");
            return Err(BylawError::DuplicateVariable(name.to_owned()).into());
        }
        Ok(())
    }

    fn ensure_unused_clause(&self, name: &str) -> Result<(), ScriptableError> {
        if self.clause(name).is_some() {
            warn!(clause = %name, "clause name is already used in the contract");
            return Err(BylawError::DuplicateClause(name.to_owned()).into());
        }
        Ok(())
    }

    fn ensure_unused_callback(&self, name: &str) -> Result<(), ScriptableError> {
        if self.bylaws.values().any(|bylaw| bylaw.has_callback(name)) {
            warn!(callback = %name, "callback is already bound in the contract");
            return Err(BylawError::DuplicateCallback(name.to_owned()).into());
        }
        Ok(())
    }

    // Lookups across the contract ----------------------------------------------

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.bylaws.values().find_map(|bylaw| bylaw.variable(name))
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.bylaws
            .values_mut()
            .find_map(|bylaw| bylaw.variable_mut(name))
    }

    pub fn clause(&self, name: &str) -> Option<&Clause> { self.bylaws.values().find_map(|bylaw| bylaw.clause(name)) }

    /// Clause serving the callback.
    pub fn callback(&self, name: &str) -> Option<&Clause> {
        self.bylaws.values().find_map(|bylaw| bylaw.callback(name))
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> { self.parties.values().find_map(|party| party.agent(name)) }

    pub fn party_account(&self, name: &str) -> Option<&PartyAccount> {
        self.parties.values().find_map(|party| party.account(name))
    }

    pub fn party_account_by_id(&self, id: &AccountId) -> Option<&PartyAccount> {
        self.parties
            .values()
            .find_map(|party| party.account_by_id(id))
    }

    /// Party having an agent able to sign as `nym`.
    pub fn find_party_by_nym_as_agent(&self, nym: &NymId) -> Option<&Party> {
        self.parties
            .values()
            .find(|party| party.agent_by_nym(nym).is_some())
    }

    pub fn find_party_by_account(&self, id: &AccountId) -> Option<&Party> {
        self.parties
            .values()
            .find(|party| party.account_by_id(id).is_some())
    }

    /// Collects the clauses of all bylaws bound to the hook, each clause
    /// once. Returns whether any was found.
    pub fn get_hooks<'a>(&'a self, hook: &str, out: &mut BTreeMap<String, &'a Clause>) -> bool {
        self.bylaws
            .values()
            .fold(false, |found, bylaw| bylaw.get_hooks(hook, out) || found)
    }

    // Transaction numbers --------------------------------------------------------

    pub fn count_trans_nums_needed_for_agent(&self, agent: &str) -> usize {
        self.parties
            .values()
            .map(|party| party.count_trans_nums_needed_for_agent(agent))
            .sum()
    }

    pub fn has_transaction_num(&self, no: TransNo) -> bool {
        self.parties
            .values()
            .any(|party| party.has_transaction_num(no))
    }

    pub fn all_transaction_numbers(&self) -> BTreeSet<TransNo> {
        self.parties
            .values()
            .flat_map(Party::all_transaction_numbers)
            .collect()
    }

    pub fn all_parties_confirmed(&self) -> bool {
        self.parties
            .values()
            .all(|party| party.signed_copy().is_some())
    }

    // Dispatch ---------------------------------------------------------------------

    /// Decides whether a party may trigger a clause directly.
    ///
    /// Clauses serving hooks, cron events and callbacks are never directly
    /// executable. Other clauses are, unless the contract binds
    /// `callback_party_may_execute_clause` and its script denies it.
    pub fn can_execute_clause(&mut self, party: &str, clause: &str) -> bool {
        if !self.parties.contains_key(party) {
            warn!(party, clause, "unknown party asks to execute a clause");
            return false;
        }
        if self.clause(clause).is_none() {
            warn!(party, clause, "unknown clause");
            return false;
        }
        if is_reserved_clause_name(clause) {
            warn!(party, clause, "clause is reserved for hooks and callbacks");
            return false;
        }
        let Some(callback) = self.callback(CALLBACK_PARTY_MAY_EXECUTE_CLAUSE).map(|c| c.name().to_owned()) else {
            debug!(party, clause, "no execution policy in the contract; allowing");
            return true;
        };
        let params = [Variable::constant(PARAM_PARTY_NAME, party), Variable::constant(PARAM_CLAUSE_NAME, clause)];
        self.ask_policy(&callback, &params)
    }

    /// Decides whether a party may cancel the contract, consulting
    /// `callback_party_may_cancel_contract` when the contract binds one.
    pub fn can_cancel_contract(&mut self, party: &str) -> bool {
        if !self.parties.contains_key(party) {
            warn!(party, "unknown party asks to cancel the contract");
            return false;
        }
        let Some(callback) = self.callback(CALLBACK_PARTY_MAY_CANCEL_CONTRACT).map(|c| c.name().to_owned()) else {
            return true;
        };
        self.ask_policy(&callback, &[Variable::constant(PARAM_PARTY_NAME, party)])
    }

    fn ask_policy(&mut self, clause: &str, params: &[Variable]) -> bool {
        let mut answer = Variable::new(RETURN_VALUE, false, VariableAccess::Persistent);
        self.policy_depth += 1;
        let res = self.execute_callback(clause, params, &mut answer);
        self.policy_depth -= 1;
        match res {
            Ok(()) => answer.copy_value_bool().unwrap_or_default(),
            Err(err) => {
                error!(clause, "policy callback failed: {err}");
                false
            }
        }
    }

    /// Runs a callback clause with the given parameters; the value the script
    /// returns (or leaves in its copy of `return_value`) is stored into
    /// `return_value`.
    ///
    /// Neither dirty variables are checked nor notices sent: that is up to
    /// the process which triggered the callback.
    pub fn execute_callback(
        &mut self,
        clause: &str,
        params: &[Variable],
        return_value: &mut Variable,
    ) -> Result<(), ScriptableError> {
        self.run_clause(clause, params, Some(return_value))?;
        Ok(())
    }

    /// Runs a clause with no parameters, returning what the script returned.
    pub fn execute_clause(&mut self, clause: &str) -> Result<Option<Value>, ScriptableError> {
        self.run_clause(clause, &[], None)
    }

    /// Fires every clause bound to the hook, each of them once.
    pub fn execute_hook(&mut self, hook: &str) -> HookOutcome {
        let mut found = BTreeMap::new();
        self.get_hooks(hook, &mut found);
        let clauses = found.into_keys().collect::<Vec<_>>();

        let mut outcome = HookOutcome::default();
        for clause in clauses {
            match self.run_clause(&clause, &[], None) {
                Ok(_) => {
                    outcome.dirty |= self.is_dirty();
                    outcome.notice_required |= self.is_dirty_important();
                    outcome.executed.push(clause);
                }
                Err(err) => {
                    error!(hook, clause = %clause, "hook clause failed: {err}");
                    outcome.failed.push(clause);
                }
            }
        }
        debug!(hook, executed = outcome.executed.len(), failed = outcome.failed.len(), "hook fired");
        outcome
    }

    fn run_clause(
        &mut self,
        clause: &str,
        params: &[Variable],
        return_value: Option<&mut Variable>,
    ) -> Result<Option<Value>, ScriptableError> {
        let (mut script, bylaw_name) = {
            let Some((bylaw, code)) = self.bylaws.values_mut().find_map(|bylaw| {
                let code = bylaw.clause(clause)?.code().to_owned();
                Some((bylaw, code))
            }) else {
                warn!(clause, "unknown clause");
                return Err(ScriptableError::UnknownClause(clause.to_owned()));
            };
            let mut script = self.registry.instantiate(bylaw.language(), &code)?;
            for call in NativeCall::ALL {
                script.register_native_call(call);
            }
            for (name, party) in &self.parties {
                script.add_party(name, party);
            }
            for param in params {
                script.add_variable(param);
            }
            if let Some(ret) = return_value.as_deref() {
                script.add_variable(ret);
            }
            bylaw.register_variables_for_execution(&mut *script);
            script.set_display_filename(clause);
            if let Some(deadline) = self.config.script_deadline() {
                script.set_deadline(deadline);
            }
            (script, bylaw.name().to_owned())
        };

        let result = script.execute(self).inspect_err(|err| {
            warn!(clause, bylaw = %bylaw_name, "script execution failed: {err}");
        })?;

        if let Some(bylaw) = self.bylaws.get_mut(&bylaw_name) {
            bylaw.accept_script_values(&*script);
        }
        if let Some(ret) = return_value {
            let produced = result.clone().or_else(|| script.variable(ret.name()));
            if let Some(value) = produced {
                if let Err(err) = ret.set_value(value) {
                    warn!(clause, "callback result ignored: {err}");
                }
            }
        }
        debug!(clause, bylaw = %bylaw_name, "clause executed");
        Ok(result)
    }

    // Dirty state --------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool { self.bylaws.values().any(Bylaw::is_dirty) }

    pub fn is_dirty_important(&self) -> bool { self.bylaws.values().any(Bylaw::is_dirty_important) }

    pub fn set_as_clean(&mut self) { self.bylaws.values_mut().for_each(Bylaw::set_as_clean) }

    // Contract text ----------------------------------------------------------------

    /// Canonical tag form of the contract. The id form leaves out all data
    /// which is filled in or changes after the contract template is drafted.
    pub fn to_tag(&self, for_id: bool) -> Tag {
        let mut tag = Tag::new("scriptableContract");
        tag.add_attribute("specifyInstrumentDefinitionID", self.specify_instrument_definition_id);
        tag.add_attribute("specifyParties", self.specify_parties);
        tag.add_attribute("numParties", self.parties.len());
        tag.add_attribute("numBylaws", self.bylaws.len());

        if !for_id {
            let mut numbers = Tag::new("openingTransNumsInOrderOfSigning");
            numbers.add_attribute("count", self.opening_numbers.len());
            if !self.opening_numbers.is_empty() {
                let list = self
                    .opening_numbers
                    .iter()
                    .map(TransNo::to_string)
                    .collect::<Vec<_>>();
                numbers.set_text(list.join(" "));
            }
            tag.add_tag(numbers);
        }
        for party in self.parties.values() {
            tag.add_tag(party.to_tag(for_id, self.specify_instrument_definition_id, self.specify_parties));
        }
        for bylaw in self.bylaws.values() {
            tag.add_tag(bylaw.to_tag(for_id));
        }
        tag
    }

    /// Replaces the contract content with the one read from the tag; the
    /// configuration and the script registry are kept.
    pub fn read_tag(&mut self, tag: &Tag) -> Result<(), ParseError> {
        tag.expect_name("scriptableContract")?;
        let mut contract = Scriptable::with_registry(self.config.clone(), self.registry.clone());
        contract.label = self.label.clone();
        contract.specify_instrument_definition_id = tag.bool_attr("specifyInstrumentDefinitionID")?;
        contract.specify_parties = tag.bool_attr("specifyParties")?;

        if let Some(numbers) = tag.child("openingTransNumsInOrderOfSigning") {
            let count = numbers.parse_attr::<usize>("count")?;
            contract.opening_numbers = numbers
                .text()
                .unwrap_or_default()
                .split_ascii_whitespace()
                .map(|no| {
                    TransNo::from_str(no).map_err(|_| ParseError::InvalidAttribute {
                        tag: s!("openingTransNumsInOrderOfSigning"),
                        attr: s!("count"),
                        value: no.to_owned(),
                    })
                })
                .collect::<Result<_, _>>()?;
            if contract.opening_numbers.len() != count {
                return Err(ParseError::CountMismatch {
                    tag: s!("openingTransNumsInOrderOfSigning"),
                    child: s!("number"),
                    expected: count,
                    found: contract.opening_numbers.len(),
                });
            }
        }

        for child in tag.children_named("party", tag.parse_attr("numParties")?)? {
            contract
                .add_party(Party::from_tag(child)?)
                .map_err(|err| ParseError::InvalidContent(err.to_string()))?;
        }
        for child in tag.children_named("bylaw", tag.parse_attr("numBylaws")?)? {
            contract
                .add_bylaw(Bylaw::from_tag(child, &self.config.default_language)?)
                .map_err(|err| ParseError::InvalidContent(err.to_string()))?;
        }
        *self = contract;
        Ok(())
    }

    /// Hash of the id form of the contract.
    pub fn calculate_contract_id(&self) -> ContractId { ContractId::with_text(&self.to_tag(true).to_string()) }

    /// Structural equality of the parties and bylaws of two contracts.
    pub fn compare(&self, rhs: &Scriptable) -> bool {
        if self.parties.len() != rhs.parties.len() || self.bylaws.len() != rhs.bylaws.len() {
            warn!("contracts differ in number of parties or bylaws");
            return false;
        }
        for (name, bylaw) in &self.bylaws {
            match rhs.bylaws.get(name) {
                Some(other) if bylaw.compare(other) => {}
                _ => {
                    warn!(bylaw = %name, "bylaw is missing or differs");
                    return false;
                }
            }
        }
        for (name, party) in &self.parties {
            match rhs.parties.get(name) {
                Some(other) if party.compare(other) => {}
                _ => {
                    warn!(party = %name, "party is missing or differs");
                    return false;
                }
            }
        }
        true
    }

    // Signatures -----------------------------------------------------------------------

    pub fn signatures(&self) -> &[ContractSignature] { &self.signatures }

    /// Signs the current content of the contract. Signatures made over some
    /// previous content are dropped.
    pub fn sign(&mut self, signer: &dyn NymSigner) {
        let content = self.to_tag(false).to_string();
        if self.signed_content.as_deref() != Some(content.as_str()) {
            if !self.signatures.is_empty() {
                debug!("contract changed; dropping {} stale signature(s)", self.signatures.len());
            }
            self.signatures.clear();
        }
        let mut contract = SignedContract::with_signatures(content, std::mem::take(&mut self.signatures));
        contract.sign(signer);
        let (content, signatures) = contract.into_parts();
        self.signed_content = Some(content);
        self.signatures = signatures;
    }

    pub fn release_signatures(&mut self) { self.signatures.clear() }

    /// Verifies the signature of `nym` over the content as it was last signed,
    /// saved or loaded.
    pub fn verify_signature(&self, nym: &dyn Nym) -> bool {
        let Some(content) = &self.signed_content else {
            return false;
        };
        SignedContract::with_signatures(content.as_str(), self.signatures.clone()).verify(nym)
    }

    /// Serializes the contract into its signed text form, with whatever
    /// signatures it carries.
    pub fn save(&mut self) -> String {
        let content = self.to_tag(false).to_string();
        let text = SignedContract::with_signatures(content.as_str(), self.signatures.clone()).to_string();
        self.signed_content = Some(content);
        text
    }

    /// Loads the contract from its signed text form.
    pub fn load_from_string(&mut self, text: &str) -> Result<(), ScriptableError> {
        let signed = SignedContract::from_str(text)?;
        let tag = Tag::from_str(signed.content())?;
        self.read_tag(&tag)?;
        let (content, signatures) = signed.into_parts();
        self.signed_content = Some(content);
        self.signatures = signatures;
        Ok(())
    }

    /// Builds a standalone contract from signed text, using the configuration
    /// and script engines of this one.
    pub fn instantiate_scriptable(&self, text: &str) -> Result<Scriptable, ScriptableError> {
        let mut contract = Scriptable::with_registry(self.config.clone(), self.registry.clone());
        contract.load_from_string(text)?;
        Ok(contract)
    }

    /// Every party's signed copy still matches this contract.
    pub fn verify_this_against_all_parties_signed_copies(&self) -> bool {
        self.verify_signed_copies_except(None).is_ok()
    }

    /// Checks signed copies of all parties other than `except`, returning the
    /// name of the first party whose copy does not match.
    pub(crate) fn verify_signed_copies_except(&self, except: Option<&str>) -> Result<(), String> {
        for party in self.parties.values() {
            if Some(party.name()) == except {
                continue;
            }
            let Some(copy) = party.signed_copy() else {
                continue;
            };
            let matches = match self.instantiate_scriptable(copy) {
                Ok(signed) => signed.compare(self),
                Err(err) => {
                    warn!(party = %party.name(), "unreadable signed copy: {err}");
                    false
                }
            };
            if !matches {
                return Err(party.name().to_owned());
            }
        }
        Ok(())
    }
}

impl ScriptHost for Scriptable {
    fn call_native(&mut self, call: NativeCall, args: &[Value]) -> Result<Value, ScriptError> {
        match (call, args) {
            (NativeCall::GetTime, []) => Ok(Value::Integer(Utc::now().timestamp())),
            (NativeCall::PartyMayExecuteClause, _) if self.policy_depth > 0 => {
                warn!("policy callback tries to consult the execution policy");
                Err(ScriptError::NativeCall { call, details: s!("not available inside a policy callback") })
            }
            (NativeCall::PartyMayExecuteClause, [Value::String(party), Value::String(clause)]) => {
                let (party, clause) = (party.clone(), clause.clone());
                Ok(Value::Bool(self.can_execute_clause(&party, &clause)))
            }
            (call, _) => Err(ScriptError::NativeCall { call, details: s!("invalid arguments") }),
        }
    }
}
