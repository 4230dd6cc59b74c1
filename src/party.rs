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

//! Contract parties, the agents acting for them and the asset accounts they
//! bring into a contract.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::armor::{armor, dearmor_string};
use crate::ids::{AccountId, InstrumentDefinitionId, NymId, TransNo};
use crate::ledger::AccountInfo;
use crate::names::{validate_account_name, validate_agent_name, validate_party_name};
use crate::tag::{ParseError, Tag};

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum PartyError {
    /// invalid party name `{0}`.
    InvalidPartyName(String),

    /// invalid agent name `{0}`.
    InvalidAgentName(String),

    /// invalid account name `{0}`.
    InvalidAccountName(String),

    /// party `{party}` already has an agent named `{agent}`.
    DuplicateAgent { party: String, agent: String },

    /// party `{party}` already has an account named `{account}`.
    DuplicateAccount { party: String, account: String },
}

/// Two optional fields agree if either of them is left unspecified.
fn lenient_eq(a: &str, b: &str) -> bool { a.is_empty() || b.is_empty() || a == b }

/// A person or other entity acting on behalf of a party.
#[derive(Getters, Clone, Eq, PartialEq, Debug)]
pub struct Agent {
    name: String,
    #[getter(as_copy)]
    represents_self: bool,
    #[getter(as_copy)]
    is_individual: bool,
    nym_id: NymId,
    role_id: String,
    group_name: String,
    #[getter(skip)]
    party: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, represents_self: bool, is_individual: bool, nym_id: impl Into<NymId>) -> Self {
        Agent {
            name: name.into(),
            represents_self,
            is_individual,
            nym_id: nym_id.into(),
            role_id: none!(),
            group_name: none!(),
            party: None,
        }
    }

    /// An individual signing for themselves.
    pub fn individual(name: impl Into<String>, nym_id: impl Into<NymId>) -> Self { Agent::new(name, true, true, nym_id) }

    /// An individual agent whose nym is not known yet.
    pub fn template(name: impl Into<String>) -> Self { Agent::new(name, true, true, NymId::default()) }

    pub fn with_role(mut self, role_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        self.role_id = role_id.into();
        self.group_name = group_name.into();
        self
    }

    pub fn set_nym_id(&mut self, nym_id: impl Into<NymId>) { self.nym_id = nym_id.into() }

    /// Name of the party this agent acts for, once attached.
    pub fn party(&self) -> Option<&str> { self.party.as_deref() }

    /// Whether this agent may sign directly as `nym`.
    pub fn is_valid_signer(&self, nym: &NymId) -> bool {
        self.represents_self && self.is_individual && !nym.is_blank() && &self.nym_id == nym
    }

    pub fn compare(&self, other: &Agent) -> bool {
        self.name == other.name &&
            self.represents_self == other.represents_self &&
            self.is_individual == other.is_individual &&
            lenient_eq(&self.nym_id, &other.nym_id) &&
            lenient_eq(&self.role_id, &other.role_id) &&
            lenient_eq(&self.group_name, &other.group_name)
    }

    pub fn to_tag(&self) -> Tag {
        let mut tag = Tag::new("agent");
        tag.add_attribute("name", &self.name);
        tag.add_attribute("doesAgentRepresentHimself", self.represents_self);
        tag.add_attribute("isAgentAnIndividual", self.is_individual);
        tag.add_attribute("nymID", &self.nym_id);
        tag.add_attribute("roleID", &self.role_id);
        tag.add_attribute("groupName", &self.group_name);
        tag
    }

    pub fn from_tag(tag: &Tag) -> Result<Self, ParseError> {
        tag.expect_name("agent")?;
        Ok(Agent {
            name: tag.required_attr("name")?.to_owned(),
            represents_self: tag.bool_attr("doesAgentRepresentHimself")?,
            is_individual: tag.bool_attr("isAgentAnIndividual")?,
            nym_id: NymId::from(tag.optional_attr("nymID")),
            role_id: tag.optional_attr("roleID").to_owned(),
            group_name: tag.optional_attr("groupName").to_owned(),
            party: None,
        })
    }
}

/// Asset account a party brings into the contract.
#[derive(Getters, Clone, Eq, PartialEq, Debug)]
pub struct PartyAccount {
    name: String,
    account_id: AccountId,
    instrument_definition_id: InstrumentDefinitionId,
    agent_name: String,
    #[getter(as_copy)]
    closing_trans_no: TransNo,
    #[getter(skip)]
    party: Option<String>,
}

impl PartyAccount {
    pub fn new(
        name: impl Into<String>,
        agent_name: impl Into<String>,
        account_id: impl Into<AccountId>,
        instrument_definition_id: impl Into<InstrumentDefinitionId>,
        closing_trans_no: TransNo,
    ) -> Self {
        PartyAccount {
            name: name.into(),
            account_id: account_id.into(),
            instrument_definition_id: instrument_definition_id.into(),
            agent_name: agent_name.into(),
            closing_trans_no,
            party: None,
        }
    }

    /// Account slot of a template: only the asset type may be fixed.
    pub fn template(name: impl Into<String>, instrument_definition_id: impl Into<InstrumentDefinitionId>) -> Self {
        PartyAccount::new(name, "", AccountId::default(), instrument_definition_id, 0)
    }

    pub fn party(&self) -> Option<&str> { self.party.as_deref() }

    pub fn set_account_id(&mut self, id: impl Into<AccountId>) { self.account_id = id.into() }

    pub fn set_agent_name(&mut self, name: impl Into<String>) { self.agent_name = name.into() }

    pub fn set_closing_trans_no(&mut self, no: TransNo) { self.closing_trans_no = no }

    pub fn compare(&self, other: &PartyAccount) -> bool {
        let same = self.name == other.name &&
            lenient_eq(&self.account_id, &other.account_id) &&
            lenient_eq(&self.instrument_definition_id, &other.instrument_definition_id) &&
            lenient_eq(&self.agent_name, &other.agent_name) &&
            (self.closing_trans_no == 0 ||
                other.closing_trans_no == 0 ||
                self.closing_trans_no == other.closing_trans_no);
        if !same {
            warn!(account = %self.name, "party accounts differ");
        }
        same
    }

    pub fn to_tag(&self, for_id: bool, specify_instrument_definition_id: bool) -> Tag {
        let mut tag = Tag::new("assetAccount");
        tag.add_attribute("name", &self.name);
        if for_id {
            tag.add_attribute("acctID", "");
            if specify_instrument_definition_id {
                tag.add_attribute("instrumentDefinitionID", &self.instrument_definition_id);
            } else {
                tag.add_attribute("instrumentDefinitionID", "");
            }
            tag.add_attribute("agentName", "");
            tag.add_attribute("closingTransNo", 0);
        } else {
            tag.add_attribute("acctID", &self.account_id);
            tag.add_attribute("instrumentDefinitionID", &self.instrument_definition_id);
            tag.add_attribute("agentName", &self.agent_name);
            tag.add_attribute("closingTransNo", self.closing_trans_no);
        }
        tag
    }

    pub fn from_tag(tag: &Tag) -> Result<Self, ParseError> {
        tag.expect_name("assetAccount")?;
        Ok(PartyAccount::new(
            tag.required_attr("name")?,
            tag.optional_attr("agentName"),
            tag.optional_attr("acctID"),
            tag.optional_attr("instrumentDefinitionID"),
            tag.parse_attr("closingTransNo")?,
        ))
    }
}

/// Participant of a smart contract.
///
/// A party starts as a template slot (blank owner, no opening number) and is
/// replaced by the concrete party when its owner confirms the contract. The
/// confirmed party keeps a copy of the contract text it signed.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Party {
    name: String,
    owner_is_nym: bool,
    owner_id: String,
    opening_trans_no: TransNo,
    authorizing_agent: String,
    agents: BTreeMap<String, Agent>,
    accounts: BTreeMap<String, PartyAccount>,
    signed_copy: Option<String>,
}

impl Party {
    /// Template party, owned by a yet unknown nym.
    pub fn template(name: impl Into<String>) -> Self {
        Party {
            name: name.into(),
            owner_is_nym: true,
            owner_id: none!(),
            opening_trans_no: 0,
            authorizing_agent: none!(),
            agents: none!(),
            accounts: none!(),
            signed_copy: None,
        }
    }

    /// Party owned by a nym, which is also its own authorizing agent.
    pub fn with_nym(
        name: impl Into<String>,
        owner: impl Into<NymId>,
        agent_name: impl Into<String>,
        opening_trans_no: TransNo,
    ) -> Result<Self, PartyError> {
        let owner = owner.into();
        let agent_name = agent_name.into();
        let mut party = Party::template(name);
        party.owner_id = owner.to_string();
        party.opening_trans_no = opening_trans_no;
        party.add_agent(Agent::individual(agent_name.clone(), owner))?;
        party.authorizing_agent = agent_name;
        Ok(party)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn is_nym_owned(&self) -> bool { self.owner_is_nym }

    pub fn is_entity_owned(&self) -> bool { !self.owner_is_nym }

    pub fn owner_id(&self) -> &str { &self.owner_id }

    /// Owner nym, for parties owned by a nym with a known id.
    pub fn owner_nym(&self) -> Option<NymId> {
        (self.owner_is_nym && !self.owner_id.is_empty()).then(|| NymId::from(self.owner_id.as_str()))
    }

    pub fn set_owner_nym(&mut self, nym: impl Into<NymId>) {
        self.owner_is_nym = true;
        self.owner_id = nym.into().to_string();
    }

    pub fn set_owner_entity(&mut self, entity: impl Into<String>) {
        self.owner_is_nym = false;
        self.owner_id = entity.into();
    }

    pub fn opening_trans_no(&self) -> TransNo { self.opening_trans_no }

    pub fn set_opening_trans_no(&mut self, no: TransNo) { self.opening_trans_no = no }

    pub fn authorizing_agent_name(&self) -> &str { &self.authorizing_agent }

    pub fn authorizing_agent(&self) -> Option<&Agent> { self.agents.get(&self.authorizing_agent) }

    pub fn set_authorizing_agent(&mut self, name: impl Into<String>) { self.authorizing_agent = name.into() }

    pub fn add_agent(&mut self, mut agent: Agent) -> Result<(), PartyError> {
        if !validate_agent_name(&agent.name) {
            return Err(PartyError::InvalidAgentName(agent.name));
        }
        if self.agents.contains_key(&agent.name) {
            warn!(party = %self.name, agent = %agent.name, "duplicate agent");
            return Err(PartyError::DuplicateAgent { party: self.name.clone(), agent: agent.name });
        }
        agent.party = Some(self.name.clone());
        self.agents.insert(agent.name.clone(), agent);
        Ok(())
    }

    pub fn add_account(&mut self, mut account: PartyAccount) -> Result<(), PartyError> {
        if !validate_account_name(&account.name) {
            return Err(PartyError::InvalidAccountName(account.name));
        }
        if self.accounts.contains_key(&account.name) {
            warn!(party = %self.name, account = %account.name, "duplicate account");
            return Err(PartyError::DuplicateAccount { party: self.name.clone(), account: account.name });
        }
        account.party = Some(self.name.clone());
        self.accounts.insert(account.name.clone(), account);
        Ok(())
    }

    pub fn agent_count(&self) -> usize { self.agents.len() }

    pub fn account_count(&self) -> usize { self.accounts.len() }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> { self.agents.values() }

    pub fn accounts(&self) -> impl Iterator<Item = &PartyAccount> { self.accounts.values() }

    pub fn agent(&self, name: &str) -> Option<&Agent> { self.agents.get(name) }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut Agent> { self.agents.get_mut(name) }

    pub fn account(&self, name: &str) -> Option<&PartyAccount> { self.accounts.get(name) }

    pub fn account_mut(&mut self, name: &str) -> Option<&mut PartyAccount> { self.accounts.get_mut(name) }

    pub fn account_by_id(&self, id: &AccountId) -> Option<&PartyAccount> {
        if id.is_blank() {
            return None;
        }
        self.accounts.values().find(|acc| acc.account_id() == id)
    }

    /// Agent of this party able to sign as `nym`.
    pub fn agent_by_nym(&self, nym: &NymId) -> Option<&Agent> {
        self.agents.values().find(|agent| agent.is_valid_signer(nym))
    }

    pub fn signed_copy(&self) -> Option<&str> { self.signed_copy.as_deref() }

    pub fn set_signed_copy(&mut self, text: impl Into<String>) { self.signed_copy = Some(text.into()) }

    pub fn clear_signed_copy(&mut self) { self.signed_copy = None }

    /// The account is owned by this party's owner nym.
    pub fn verify_ownership_of_account(&self, info: &AccountInfo) -> bool {
        match self.owner_nym() {
            Some(owner) if owner == info.owner => true,
            Some(owner) => {
                warn!(party = %self.name, owner = %owner, account = %info.id, "account is owned by another nym");
                false
            }
            None => {
                warn!(party = %self.name, account = %info.id, "only nym-owned parties can own accounts");
                false
            }
        }
    }

    /// The agent is allowed to operate the account: only individuals acting for
    /// themselves, who own the account, are.
    pub fn verify_agency_of_account(&self, agent_name: &str, info: &AccountInfo) -> bool {
        let Some(agent) = self.agents.get(agent_name) else {
            warn!(party = %self.name, agent = %agent_name, "unknown agent");
            return false;
        };
        if !agent.is_valid_signer(&info.owner) {
            warn!(party = %self.name, agent = %agent_name, account = %info.id, "agent has no agency over the account");
            return false;
        }
        true
    }

    /// One number per account the agent manages, plus the opening number when
    /// the agent is the authorizing one.
    pub fn count_trans_nums_needed_for_agent(&self, agent_name: &str) -> usize {
        let closing = self
            .accounts
            .values()
            .filter(|acc| acc.agent_name == agent_name)
            .count();
        closing + usize::from(self.authorizing_agent == agent_name)
    }

    pub fn has_transaction_num(&self, no: TransNo) -> bool {
        no != 0 &&
            (self.opening_trans_no == no || self.accounts.values().any(|acc| acc.closing_trans_no == no))
    }

    pub fn all_transaction_numbers(&self) -> BTreeSet<TransNo> {
        let mut numbers = self
            .accounts
            .values()
            .map(|acc| acc.closing_trans_no)
            .collect::<BTreeSet<_>>();
        numbers.insert(self.opening_trans_no);
        numbers.remove(&0);
        numbers
    }

    /// Compares a party against its template or against another copy of the
    /// same contract. Fields left unspecified on either side are not compared.
    pub fn compare(&self, other: &Party) -> bool {
        if self.name != other.name {
            warn!(party = %self.name, other = %other.name, "party names differ");
            return false;
        }
        if !self.owner_id.is_empty() && !other.owner_id.is_empty() {
            if self.owner_is_nym != other.owner_is_nym || self.owner_id != other.owner_id {
                warn!(party = %self.name, "party owners differ");
                return false;
            }
        }
        if self.opening_trans_no != 0 && other.opening_trans_no != 0 && self.opening_trans_no != other.opening_trans_no {
            warn!(party = %self.name, "opening transaction numbers differ");
            return false;
        }
        if !lenient_eq(&self.authorizing_agent, &other.authorizing_agent) {
            warn!(party = %self.name, "authorizing agents differ");
            return false;
        }
        if self.agents.len() != other.agents.len() || self.accounts.len() != other.accounts.len() {
            warn!(party = %self.name, "agent or account counts differ");
            return false;
        }
        for (name, agent) in &self.agents {
            match other.agents.get(name) {
                Some(theirs) if agent.compare(theirs) => {}
                _ => {
                    warn!(party = %self.name, agent = %name, "agent is missing or differs");
                    return false;
                }
            }
        }
        self.accounts.iter().all(|(name, acc)| {
            other
                .accounts
                .get(name)
                .is_some_and(|theirs| acc.compare(theirs))
        })
    }

    pub fn to_tag(&self, for_id: bool, specify_instrument_definition_id: bool, specify_parties: bool) -> Tag {
        let mut tag = Tag::new("party");
        tag.add_attribute("name", &self.name);
        if for_id {
            tag.add_attribute("ownerType", "");
            tag.add_attribute("ownerID", if specify_parties { self.owner_id.as_str() } else { "" });
            tag.add_attribute("openingTransNo", 0);
            tag.add_attribute("signedCopyProvided", false);
            tag.add_attribute("authorizingAgent", "");
            tag.add_attribute("numAgents", 0);
        } else {
            tag.add_attribute("ownerType", if self.owner_is_nym { "nym" } else { "entity" });
            tag.add_attribute("ownerID", &self.owner_id);
            tag.add_attribute("openingTransNo", self.opening_trans_no);
            tag.add_attribute("signedCopyProvided", self.signed_copy.is_some());
            tag.add_attribute("authorizingAgent", &self.authorizing_agent);
            tag.add_attribute("numAgents", self.agents.len());
        }
        tag.add_attribute("numAccounts", self.accounts.len());

        if !for_id {
            for agent in self.agents.values() {
                tag.add_tag(agent.to_tag());
            }
        }
        for account in self.accounts.values() {
            tag.add_tag(account.to_tag(for_id, specify_instrument_definition_id));
        }
        if let (false, Some(copy)) = (for_id, &self.signed_copy) {
            tag.add_tag(Tag::with_text("mySignedCopy", armor(copy)));
        }
        tag
    }

    pub fn from_tag(tag: &Tag) -> Result<Self, ParseError> {
        tag.expect_name("party")?;
        let name = tag.required_attr("name")?;
        if !validate_party_name(name) {
            return Err(invalid(PartyError::InvalidPartyName(name.to_owned())));
        }
        let owner_is_nym = match tag.optional_attr("ownerType") {
            "" | "nym" => true,
            "entity" => false,
            other => {
                return Err(ParseError::InvalidAttribute {
                    tag: s!("party"),
                    attr: s!("ownerType"),
                    value: other.to_owned(),
                });
            }
        };
        let mut party = Party::template(name);
        party.owner_is_nym = owner_is_nym;
        party.owner_id = tag.optional_attr("ownerID").to_owned();
        party.opening_trans_no = tag.parse_attr("openingTransNo")?;
        party.authorizing_agent = tag.optional_attr("authorizingAgent").to_owned();

        for agent in tag.children_named("agent", tag.parse_attr("numAgents")?)? {
            party.add_agent(Agent::from_tag(agent)?).map_err(invalid)?;
        }
        for account in tag.children_named("assetAccount", tag.parse_attr("numAccounts")?)? {
            party.add_account(PartyAccount::from_tag(account)?).map_err(invalid)?;
        }
        if tag.bool_attr("signedCopyProvided")? {
            let copy = tag
                .child("mySignedCopy")
                .ok_or_else(|| ParseError::MissingText(s!("mySignedCopy")))?;
            party.signed_copy = Some(dearmor_string(copy.required_text()?)?);
        }
        Ok(party)
    }
}

fn invalid(err: PartyError) -> ParseError { ParseError::InvalidContent(err.to_string()) }

#[cfg(test)]
mod test {
    use super::*;

    fn alice() -> Party {
        let mut party = Party::with_nym("trustee", "nym_alice", "alice", 100).unwrap();
        party
            .add_account(PartyAccount::new("escrow", "alice", "acct_a", "usd", 101))
            .unwrap();
        party
    }

    fn template() -> Party {
        let mut party = Party::template("trustee");
        party.add_agent(Agent::template("alice")).unwrap();
        party.add_account(PartyAccount::template("escrow", "usd")).unwrap();
        party
    }

    #[test]
    fn valid_signers() {
        let agent = Agent::individual("alice", "nym_alice");
        assert!(agent.is_valid_signer(&NymId::from("nym_alice")));
        assert!(!agent.is_valid_signer(&NymId::from("nym_bob")));
        assert!(!Agent::new("corp", false, true, "nym_alice").is_valid_signer(&NymId::from("nym_alice")));
        assert!(!Agent::template("alice").is_valid_signer(&NymId::default()));
    }

    #[test]
    fn back_references() {
        let party = alice();
        assert_eq!(party.agent("alice").unwrap().party(), Some("trustee"));
        assert_eq!(party.account("escrow").unwrap().party(), Some("trustee"));
        assert_eq!(party.account_by_id(&AccountId::from("acct_a")).unwrap().name(), "escrow");
        assert!(party.account_by_id(&AccountId::default()).is_none());
    }

    #[test]
    fn duplicates_rejected() {
        let mut party = alice();
        assert_eq!(
            party.add_agent(Agent::template("alice")),
            Err(PartyError::DuplicateAgent { party: s!("trustee"), agent: s!("alice") })
        );
        assert!(matches!(
            party.add_account(PartyAccount::template("escrow", "usd")),
            Err(PartyError::DuplicateAccount { .. })
        ));
        assert!(matches!(party.add_agent(Agent::template("bad name")), Err(PartyError::InvalidAgentName(_))));
        assert_eq!(party.agent_count(), 1);
    }

    #[test]
    fn template_matches_concrete() {
        assert!(template().compare(&alice()));
        assert!(alice().compare(&template()));

        let mut other = alice();
        other.set_opening_trans_no(200);
        assert!(!other.compare(&alice()));

        let mut other = template();
        other.add_account(PartyAccount::template("fees", "usd")).unwrap();
        assert!(!other.compare(&alice()));

        let mut other = template();
        other.account_mut("escrow").unwrap().set_account_id("acct_b");
        assert!(!other.compare(&alice()));
    }

    #[test]
    fn transaction_numbers() {
        let party = alice();
        assert_eq!(party.count_trans_nums_needed_for_agent("alice"), 2);
        assert_eq!(party.count_trans_nums_needed_for_agent("bob"), 0);
        assert!(party.has_transaction_num(101));
        assert!(!party.has_transaction_num(0));
        assert_eq!(party.all_transaction_numbers().into_iter().collect::<Vec<_>>(), vec![100, 101]);
    }

    #[test]
    fn account_authority() {
        let party = alice();
        let info = AccountInfo {
            id: AccountId::from("acct_a"),
            owner: NymId::from("nym_alice"),
            instrument_definition_id: InstrumentDefinitionId::from("usd"),
        };
        assert!(party.verify_ownership_of_account(&info));
        assert!(party.verify_agency_of_account("alice", &info));
        assert!(!party.verify_agency_of_account("bob", &info));

        let foreign = AccountInfo { owner: NymId::from("nym_bob"), ..info };
        assert!(!party.verify_ownership_of_account(&foreign));
        assert!(!party.verify_agency_of_account("alice", &foreign));
    }

    #[test]
    fn serialization() {
        let mut party = alice();
        party.set_signed_copy("<scriptableContract/>");
        let parsed = Party::from_tag(&party.to_tag(false, true, true)).unwrap();
        assert_eq!(parsed, party);
    }

    #[test]
    fn id_form_blanks_concrete_data() {
        let tag = alice().to_tag(true, false, false);
        assert_eq!(tag.attr("ownerID"), Some(""));
        assert_eq!(tag.attr("numAgents"), Some("0"));
        assert!(tag.child("mySignedCopy").is_none());
        let acc = tag.child("assetAccount").unwrap();
        assert_eq!(acc.attr("acctID"), Some(""));
        assert_eq!(acc.attr("instrumentDefinitionID"), Some(""));

        assert_eq!(tag.to_string(), template().to_tag(true, false, false).to_string());
        let tag = alice().to_tag(true, true, true);
        assert_eq!(tag.attr("ownerID"), Some("nym_alice"));
        assert_eq!(tag.child("assetAccount").unwrap().attr("instrumentDefinitionID"), Some("usd"));
    }
}
