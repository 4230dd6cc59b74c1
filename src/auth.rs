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

//! Confirmation of parties and server-side verification of their authority.

use std::collections::BTreeMap;

use tracing::{debug, error, warn};

use crate::identity::{Nym, NymResolver, NymSigner};
use crate::ids::{AccountId, NotaryId, NymId, TransNo};
use crate::ledger::{AccountDirectory, TransactionLedger};
use crate::names::validate_party_name;
use crate::party::{Party, PartyAccount};
use crate::scriptable::Scriptable;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ConfirmError {
    /// invalid party name `{0}`.
    InvalidPartyName(String),

    /// signed copy of party `{0}` doesn't match the contract.
    SignedCopyMismatch(String),

    /// contract has no party `{0}` to confirm.
    UnknownParty(String),

    /// party `{0}` has already confirmed the contract.
    AlreadyConfirmed(String),

    /// party `{0}` doesn't match its template in the contract.
    TemplateMismatch(String),

    /// nym `{signer}` is not the authorizing agent of party `{party}`.
    SignerNotAgent { party: String, signer: NymId },
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum AuthError {
    /// party `{0}` is not a part of the contract.
    UnknownParty(String),

    /// party `{0}` has not provided its signed copy of the contract.
    NoSignedCopy(String),

    /// party `{0}` has no authorizing agent able to sign.
    NoAuthorizingAgent(String),

    /// nym `{0}` can't be loaded.
    UnknownNym(NymId),

    /// transaction number {number} is not issued to nym `{nym}`.
    NumberNotIssued { nym: NymId, number: TransNo },

    /// transaction number {number} of nym `{nym}` was already used.
    NumberUsed { nym: NymId, number: TransNo },

    /// ledger refused to burn transaction number {number} of nym `{nym}`.
    BurnRefused { nym: NymId, number: TransNo },

    /// `{0}` has no transaction number to burn.
    NoNumberToBurn(String),

    /// signed copy of party `{party}` is unreadable: {details}.
    UnreadableSignedCopy { party: String, details: String },

    /// signature of nym `{nym}` over the signed copy of party `{party}` is invalid.
    InvalidSignature { party: String, nym: NymId },

    /// signed copy of party `{0}` doesn't match the contract.
    SignedCopyMismatch(String),

    /// account `{0}` is not a part of any contract party.
    AccountNotInContract(String),

    /// account `{0}` is unknown to the notary.
    UnknownAccount(AccountId),

    /// account `{account}` holds a different instrument than the contract requires.
    InstrumentMismatch { account: AccountId },

    /// party `{party}` doesn't own account `{account}`.
    NotOwner { party: String, account: AccountId },

    /// agent `{agent}` has no agency over account `{account}`.
    NoAgency { agent: String, account: AccountId },

    /// nym `{0}` is not an agent of any party of the contract.
    NotAnAgent(NymId),
}

/// Everything a single authorization check needs from the surrounding
/// notary.
pub struct AuthContext<'a> {
    pub notary_id: NotaryId,
    /// Nym on whose authority used numbers are burned.
    pub signer_id: NymId,
    /// Nyms the caller has already loaded; others are loaded on demand and
    /// released when the check completes.
    pub loaded_nyms: Option<&'a BTreeMap<NymId, Box<dyn Nym>>>,
    pub resolver: &'a dyn NymResolver,
    pub ledger: &'a mut dyn TransactionLedger,
    pub accounts: &'a dyn AccountDirectory,
}

enum ResolvedNym<'a> {
    Pooled(&'a dyn Nym),
    Loaded(Box<dyn Nym>),
}

impl ResolvedNym<'_> {
    fn nym(&self) -> &dyn Nym {
        match self {
            ResolvedNym::Pooled(nym) => *nym,
            ResolvedNym::Loaded(nym) => &**nym,
        }
    }
}

impl Drop for ResolvedNym<'_> {
    fn drop(&mut self) {
        if let ResolvedNym::Loaded(nym) = self {
            debug!(nym = %nym.id(), "releasing nym loaded for authorization");
        }
    }
}

impl<'a> AuthContext<'a> {
    fn resolve_nym(&self, id: &NymId) -> Result<ResolvedNym<'a>, AuthError> {
        if let Some(nym) = self.loaded_nyms.and_then(|pool| pool.get(id)) {
            return Ok(ResolvedNym::Pooled(&**nym));
        }
        self.resolver
            .load_nym(id)
            .map(ResolvedNym::Loaded)
            .ok_or_else(|| AuthError::UnknownNym(id.clone()))
    }

    /// Checks the number is issued to the nym and, when burning, that it is
    /// still available; then burns it.
    fn check_number(&mut self, owner: &str, nym: &NymId, number: TransNo, burn: bool) -> Result<(), AuthError> {
        if number == 0 {
            if burn {
                error!(owner, "nothing to burn: no transaction number is set");
                return Err(AuthError::NoNumberToBurn(owner.to_owned()));
            }
            return Ok(());
        }
        if !self.ledger.verify_issued_number(nym, &self.notary_id, number) {
            error!(owner, nym = %nym, number, "transaction number is not issued");
            return Err(AuthError::NumberNotIssued { nym: nym.clone(), number });
        }
        if burn {
            if !self.ledger.verify_transaction_number(nym, &self.notary_id, number) {
                error!(owner, nym = %nym, number, "transaction number was already used");
                return Err(AuthError::NumberUsed { nym: nym.clone(), number });
            }
            if !self
                .ledger
                .remove_transaction_number(nym, &self.notary_id, number, &self.signer_id, true)
            {
                error!(owner, nym = %nym, number, "ledger refused to burn the transaction number");
                return Err(AuthError::BurnRefused { nym: nym.clone(), number });
            }
        }
        Ok(())
    }
}

impl Scriptable {
    /// Signs the contract on behalf of a party which replaces its template.
    ///
    /// The confirmed party keeps a snapshot of the contract it signed; the
    /// contract is then signed once more so that the outer signature covers
    /// that snapshot too.
    pub fn confirm_party(&mut self, mut party: Party, signer: &dyn NymSigner) -> Result<(), ConfirmError> {
        let name = party.name().to_owned();
        if !validate_party_name(&name) {
            return Err(ConfirmError::InvalidPartyName(name));
        }
        if let Err(other) = self.verify_signed_copies_except(Some(name.as_str())) {
            error!(party = %name, other = %other, "contract doesn't match a signed copy of another party");
            return Err(ConfirmError::SignedCopyMismatch(other));
        }
        let Some(template) = self.party(&name) else {
            warn!(party = %name, "no such party in the contract");
            return Err(ConfirmError::UnknownParty(name));
        };
        if template.signed_copy().is_some() {
            return Err(ConfirmError::AlreadyConfirmed(name));
        }
        if !template.compare(&party) {
            error!(party = %name, "party doesn't match its template");
            return Err(ConfirmError::TemplateMismatch(name));
        }
        if !party
            .authorizing_agent()
            .is_some_and(|agent| agent.is_valid_signer(signer.id()))
        {
            return Err(ConfirmError::SignerNotAgent { party: name, signer: signer.id().clone() });
        }

        party.clear_signed_copy();
        self.push_opening_number(party.opening_trans_no());
        self.replace_party(party);

        self.release_signatures();
        self.sign(signer);
        let snapshot = self.save();
        if let Some(party) = self.party_mut(&name) {
            party.set_signed_copy(snapshot);
        }
        self.release_signatures();
        self.sign(signer);
        self.save();
        debug!(party = %name, signer = %signer.id(), "party confirmed the contract");
        Ok(())
    }

    /// Verifies that the party really signed this very contract, optionally
    /// burning its opening transaction number.
    pub fn verify_party_authorization(
        &self,
        party: &Party,
        ctx: &mut AuthContext<'_>,
        burn_trans_no: bool,
    ) -> Result<(), AuthError> {
        let name = party.name();
        let Some(copy) = party.signed_copy() else {
            error!(party = %name, "party has no signed copy");
            return Err(AuthError::NoSignedCopy(name.to_owned()));
        };
        let agent = party
            .authorizing_agent()
            .filter(|agent| !agent.nym_id().is_blank())
            .ok_or_else(|| AuthError::NoAuthorizingAgent(name.to_owned()))?;
        let nym_id = agent.nym_id().clone();
        let resolved = ctx.resolve_nym(&nym_id)?;

        ctx.check_number(name, &nym_id, party.opening_trans_no(), burn_trans_no)?;

        let signed = self
            .instantiate_scriptable(copy)
            .map_err(|err| AuthError::UnreadableSignedCopy { party: name.to_owned(), details: err.to_string() })?;
        if !signed.verify_signature(resolved.nym()) {
            error!(party = %name, nym = %nym_id, "invalid signature over the signed copy");
            return Err(AuthError::InvalidSignature { party: name.to_owned(), nym: nym_id });
        }
        if !signed.compare(self) {
            error!(party = %name, "signed copy doesn't match the contract");
            return Err(AuthError::SignedCopyMismatch(name.to_owned()));
        }
        debug!(party = %name, nym = %nym_id, "party authorization verified");
        Ok(())
    }

    /// Verifies that the party owns the account and that the account agent
    /// may operate it, optionally burning the account's closing number.
    pub fn verify_party_acct_authorization(
        &self,
        account: &PartyAccount,
        ctx: &mut AuthContext<'_>,
        burn_trans_no: bool,
    ) -> Result<(), AuthError> {
        let party = account
            .party()
            .and_then(|name| self.party(name))
            .ok_or_else(|| AuthError::AccountNotInContract(account.name().clone()))?;
        let info = ctx
            .accounts
            .account(account.account_id())
            .ok_or_else(|| AuthError::UnknownAccount(account.account_id().clone()))?;
        if !account.instrument_definition_id().is_blank() &&
            account.instrument_definition_id() != &info.instrument_definition_id
        {
            error!(account = %info.id, "account instrument doesn't match the contract");
            return Err(AuthError::InstrumentMismatch { account: info.id });
        }
        if !party.verify_ownership_of_account(&info) {
            return Err(AuthError::NotOwner { party: party.name().to_owned(), account: info.id });
        }
        if !party.verify_agency_of_account(account.agent_name(), &info) {
            return Err(AuthError::NoAgency { agent: account.agent_name().clone(), account: info.id });
        }
        ctx.check_number(account.name(), &info.owner, account.closing_trans_no(), burn_trans_no)?;
        debug!(party = %party.name(), account = %info.id, "account authorization verified");
        Ok(())
    }

    /// Finds the party for which `nym` signs as an agent.
    pub fn verify_nym_as_agent(&self, nym: &NymId) -> Result<&Party, AuthError> {
        self.find_party_by_nym_as_agent(nym).ok_or_else(|| {
            warn!(nym = %nym, "nym is not an agent of any party");
            AuthError::NotAnAgent(nym.clone())
        })
    }

    /// Checks that `nym` signs as the agent of the given party account.
    pub fn verify_nym_as_agent_for_account(&self, nym: &NymId, account: &AccountId) -> Result<&PartyAccount, AuthError> {
        let acc = self
            .party_account_by_id(account)
            .ok_or_else(|| AuthError::AccountNotInContract(account.to_string()))?;
        let party = acc
            .party()
            .and_then(|name| self.party(name))
            .ok_or_else(|| AuthError::AccountNotInContract(account.to_string()))?;
        match party.agent(acc.agent_name()) {
            Some(agent) if agent.is_valid_signer(nym) => Ok(acc),
            _ => {
                warn!(nym = %nym, account = %account, "nym is not the agent of the account");
                Err(AuthError::NotAnAgent(nym.clone()))
            }
        }
    }
}
