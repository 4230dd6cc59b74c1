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

//! Transaction-number ledger and account directory the authorization checks
//! rely upon.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::ids::{AccountId, InstrumentDefinitionId, NotaryId, NymId, TransNo};

/// Issued and available transaction numbers, per nym and notary.
///
/// A number is issued to a nym until the instrument using it is closed, and is
/// available only until it is used once.
pub trait TransactionLedger {
    fn verify_issued_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool;

    fn verify_transaction_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool;

    /// Marks the number as used. With `persist` the change must be committed
    /// under the authority of `signer` before returning.
    fn remove_transaction_number(
        &mut self,
        nym: &NymId,
        notary: &NotaryId,
        number: TransNo,
        signer: &NymId,
        persist: bool,
    ) -> bool;
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
struct NumberSet {
    issued: BTreeSet<TransNo>,
    available: BTreeSet<TransNo>,
}

/// In-memory transaction-number ledger.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct MemLedger {
    numbers: BTreeMap<(NymId, NotaryId), NumberSet>,
    commits: usize,
}

impl MemLedger {
    pub fn new() -> Self { MemLedger::default() }

    /// Issues a fresh number to the nym, making it both issued and available.
    pub fn issue(&mut self, nym: &NymId, notary: &NotaryId, number: TransNo) {
        let set = self.numbers.entry((nym.clone(), notary.clone())).or_default();
        set.issued.insert(number);
        set.available.insert(number);
    }

    /// Closes a number, so that it is no longer issued to the nym.
    pub fn close(&mut self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool {
        let Some(set) = self.numbers.get_mut(&(nym.clone(), notary.clone())) else {
            return false;
        };
        set.available.remove(&number);
        set.issued.remove(&number)
    }

    /// Number of persisted ledger changes.
    pub fn commits(&self) -> usize { self.commits }

    fn set(&self, nym: &NymId, notary: &NotaryId) -> Option<&NumberSet> {
        self.numbers.get(&(nym.clone(), notary.clone()))
    }
}

impl TransactionLedger for MemLedger {
    fn verify_issued_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool {
        self.set(nym, notary)
            .is_some_and(|set| set.issued.contains(&number))
    }

    fn verify_transaction_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool {
        self.set(nym, notary)
            .is_some_and(|set| set.available.contains(&number))
    }

    fn remove_transaction_number(
        &mut self,
        nym: &NymId,
        notary: &NotaryId,
        number: TransNo,
        signer: &NymId,
        persist: bool,
    ) -> bool {
        let Some(set) = self.numbers.get_mut(&(nym.clone(), notary.clone())) else {
            return false;
        };
        let removed = set.available.remove(&number);
        if removed && persist {
            self.commits += 1;
            debug!(nym = %nym, notary = %notary, number, signer = %signer, "transaction number burned");
        }
        removed
    }
}

/// Facts about an asset account which authorization depends upon.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct AccountInfo {
    pub id: AccountId,
    pub owner: NymId,
    pub instrument_definition_id: InstrumentDefinitionId,
}

pub trait AccountDirectory {
    fn account(&self, id: &AccountId) -> Option<AccountInfo>;
}

/// In-memory account directory.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct MemAccounts {
    accounts: BTreeMap<AccountId, AccountInfo>,
}

impl MemAccounts {
    pub fn new() -> Self { MemAccounts::default() }

    pub fn insert(&mut self, info: AccountInfo) -> Option<AccountInfo> {
        self.accounts.insert(info.id.clone(), info)
    }
}

impl AccountDirectory for MemAccounts {
    fn account(&self, id: &AccountId) -> Option<AccountInfo> { self.accounts.get(id).cloned() }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn number_lifecycle() {
        let (nym, notary) = (NymId::from("alice"), NotaryId::from("notary"));
        let mut ledger = MemLedger::new();
        assert!(!ledger.verify_issued_number(&nym, &notary, 7));

        ledger.issue(&nym, &notary, 7);
        assert!(ledger.verify_issued_number(&nym, &notary, 7));
        assert!(ledger.verify_transaction_number(&nym, &notary, 7));

        assert!(ledger.remove_transaction_number(&nym, &notary, 7, &nym, true));
        assert!(ledger.verify_issued_number(&nym, &notary, 7));
        assert!(!ledger.verify_transaction_number(&nym, &notary, 7));
        assert!(!ledger.remove_transaction_number(&nym, &notary, 7, &nym, true));
        assert_eq!(ledger.commits(), 1);

        assert!(ledger.close(&nym, &notary, 7));
        assert!(!ledger.verify_issued_number(&nym, &notary, 7));
        assert!(!ledger.verify_issued_number(&nym, &NotaryId::from("other"), 7));
    }
}
