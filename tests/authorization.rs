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

#[macro_use]
extern crate amplify;

mod utils;

use std::collections::BTreeMap;

use scriptable::{
    AccountId, AuthContext, AuthError, Clause, ConfirmError, MemLedger, MemNym, NotaryId, Nym, NymId, PartyAccount,
    Scriptable, TransNo, TransactionLedger,
};

use crate::utils::{concrete_party, draft, new_log, new_nym, Notary};

struct Fixture {
    alice: MemNym,
    bob: MemNym,
    contract: Scriptable,
    notary: Notary,
}

fn fixture() -> Fixture {
    let alice = new_nym("nym_alice");
    let bob = new_nym("nym_bob");
    let notary = Notary::new(&[&alice, &bob]);
    Fixture { contract: draft(&new_log()), alice, bob, notary }
}

fn confirmed() -> Fixture {
    let mut fx = fixture();
    fx.contract
        .confirm_party(concrete_party("buyer", &fx.alice, 100, 101), &fx.alice)
        .unwrap();
    fx.contract
        .confirm_party(concrete_party("seller", &fx.bob, 200, 201), &fx.bob)
        .unwrap();
    fx
}

#[test]
fn confirm_replaces_template() {
    let mut fx = fixture();
    let id = fx.contract.calculate_contract_id();
    let real = concrete_party("buyer", &fx.alice, 100, 101);
    fx.contract.confirm_party(real.clone(), &fx.alice).unwrap();

    let party = fx.contract.party("buyer").unwrap();
    assert!(party.signed_copy().is_some());
    let mut stored = party.clone();
    stored.clear_signed_copy();
    assert_eq!(stored, real);

    assert_eq!(fx.contract.opening_numbers_in_order_of_signing(), &[100]);
    assert!(fx.contract.verify_signature(&fx.alice));
    assert!(!fx.contract.verify_signature(&fx.bob));
    assert!(!fx.contract.all_parties_confirmed());
    assert_eq!(fx.contract.calculate_contract_id(), id);

    let text = fx.contract.save();
    let reloaded = fx.contract.instantiate_scriptable(&text).unwrap();
    assert!(reloaded.compare(&fx.contract));
    assert!(reloaded.verify_signature(&fx.alice));
    assert_eq!(reloaded.party("buyer"), fx.contract.party("buyer"));
}

#[test]
fn confirm_rejections() {
    let mut fx = fixture();
    let (alice, bob) = (fx.alice.clone(), fx.bob.clone());

    let mut extra = concrete_party("buyer", &alice, 100, 101);
    extra
        .add_account(PartyAccount::new("buyer_spare", "buyer_agent", "acct_spare", "usd", 0))
        .unwrap();
    assert_eq!(fx.contract.confirm_party(extra, &alice), Err(ConfirmError::TemplateMismatch(s!("buyer"))));

    assert_eq!(
        fx.contract
            .confirm_party(concrete_party("auditor", &alice, 300, 301), &alice),
        Err(ConfirmError::UnknownParty(s!("auditor")))
    );

    assert_eq!(
        fx.contract
            .confirm_party(concrete_party("buyer", &alice, 100, 101), &bob),
        Err(ConfirmError::SignerNotAgent { party: s!("buyer"), signer: bob.id().clone() })
    );

    fx.contract
        .confirm_party(concrete_party("buyer", &alice, 100, 101), &alice)
        .unwrap();
    assert_eq!(
        fx.contract
            .confirm_party(concrete_party("buyer", &alice, 100, 101), &alice),
        Err(ConfirmError::AlreadyConfirmed(s!("buyer")))
    );
    assert_eq!(fx.contract.opening_numbers_in_order_of_signing(), &[100]);
}

#[test]
fn confirm_detects_diverged_drafts() {
    let mut fx = fixture();
    fx.contract
        .confirm_party(concrete_party("buyer", &fx.alice, 100, 101), &fx.alice)
        .unwrap();
    fx.contract
        .variable_mut("counter")
        .unwrap()
        .set_value(9)
        .unwrap();
    assert!(!fx.contract.verify_this_against_all_parties_signed_copies());
    assert_eq!(
        fx.contract
            .confirm_party(concrete_party("seller", &fx.bob, 200, 201), &fx.bob),
        Err(ConfirmError::SignedCopyMismatch(s!("buyer")))
    );
}

#[test]
fn all_parties_confirm_in_order() {
    let fx = confirmed();
    assert!(fx.contract.all_parties_confirmed());
    assert!(fx.contract.verify_this_against_all_parties_signed_copies());
    assert_eq!(fx.contract.opening_numbers_in_order_of_signing(), &[100, 200]);
    assert_eq!(fx.contract.all_transaction_numbers().into_iter().collect::<Vec<_>>(), vec![100, 101, 200, 201]);
    assert!(fx.contract.has_transaction_num(201));
    assert_eq!(fx.contract.count_trans_nums_needed_for_agent("buyer_agent"), 2);
}

#[test]
fn zero_opening_number_is_recorded() {
    let mut fx = fixture();
    fx.contract
        .confirm_party(concrete_party("buyer", &fx.alice, 0, 101), &fx.alice)
        .unwrap();
    assert_eq!(fx.contract.opening_numbers_in_order_of_signing(), &[0]);
    fx.contract
        .confirm_party(concrete_party("seller", &fx.bob, 200, 201), &fx.bob)
        .unwrap();
    assert_eq!(fx.contract.opening_numbers_in_order_of_signing(), &[0, 200]);
}

#[test]
fn short_clause_survives_confirmation() {
    let mut fx = fixture();
    fx.contract
        .add_clause("escrow", Clause::new("short", "1;"))
        .unwrap();
    let saved = fx.contract.save();
    let reloaded = fx.contract.instantiate_scriptable(&saved).unwrap();
    assert!(reloaded.compare(&fx.contract));
    assert_eq!(reloaded.clause("short").unwrap().code(), "1;");

    fx.contract
        .confirm_party(concrete_party("buyer", &fx.alice, 100, 101), &fx.alice)
        .unwrap();
    fx.contract
        .confirm_party(concrete_party("seller", &fx.bob, 200, 201), &fx.bob)
        .unwrap();
    assert!(fx.contract.verify_this_against_all_parties_signed_copies());

    fx.notary.issue(&fx.alice, 100);
    let buyer = fx.contract.party("buyer").unwrap().clone();
    let signer = fx.alice.id().clone();
    fx.contract
        .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), true)
        .unwrap();
}

struct RefusingLedger(MemLedger);

impl TransactionLedger for RefusingLedger {
    fn verify_issued_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool {
        self.0.verify_issued_number(nym, notary, number)
    }

    fn verify_transaction_number(&self, nym: &NymId, notary: &NotaryId, number: TransNo) -> bool {
        self.0.verify_transaction_number(nym, notary, number)
    }

    fn remove_transaction_number(&mut self, _: &NymId, _: &NotaryId, _: TransNo, _: &NymId, _: bool) -> bool {
        false
    }
}

#[test]
fn refused_burn_fails_authorization() {
    let fx = confirmed();
    let mut ledger = RefusingLedger(MemLedger::new());
    ledger.0.issue(fx.alice.id(), &fx.notary.id, 100);
    let buyer = fx.contract.party("buyer").unwrap().clone();
    let signer = fx.alice.id().clone();
    let mut ctx = AuthContext {
        notary_id: fx.notary.id.clone(),
        signer_id: signer.clone(),
        loaded_nyms: None,
        resolver: &fx.notary.nyms,
        ledger: &mut ledger,
        accounts: &fx.notary.accounts,
    };
    assert_eq!(
        fx.contract.verify_party_authorization(&buyer, &mut ctx, true),
        Err(AuthError::BurnRefused { nym: signer.clone(), number: 100 })
    );
    // nothing was burnt, the number stays available
    assert!(ledger.verify_transaction_number(&signer, &fx.notary.id, 100));
}

#[test]
fn opening_number_burns_exactly_once() {
    let mut fx = confirmed();
    fx.notary.issue(&fx.alice, 100);
    let buyer = fx.contract.party("buyer").unwrap().clone();
    let signer = fx.alice.id().clone();

    fx.contract
        .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), true)
        .unwrap();
    assert_eq!(
        fx.contract
            .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), true),
        Err(AuthError::NumberUsed { nym: signer.clone(), number: 100 })
    );
    // still issued, so a check without burning passes
    fx.contract
        .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), false)
        .unwrap();
    assert_eq!(fx.notary.ledger.commits(), 1);
}

#[test]
fn authorization_failures() {
    let mut fx = confirmed();
    let signer = fx.alice.id().clone();
    let buyer = fx.contract.party("buyer").unwrap().clone();

    assert_eq!(
        fx.contract
            .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::NumberNotIssued { nym: signer.clone(), number: 100 })
    );

    let unconfirmed = draft(&new_log());
    let template = unconfirmed.party("buyer").unwrap();
    assert_eq!(
        unconfirmed.verify_party_authorization(template, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::NoSignedCopy(s!("buyer")))
    );

    let mut zero = buyer.clone();
    zero.set_opening_trans_no(0);
    assert_eq!(
        fx.contract
            .verify_party_authorization(&zero, &mut fx.notary.ctx(&signer), true),
        Err(AuthError::NoNumberToBurn(s!("buyer")))
    );

    let mut stranger = buyer.clone();
    stranger
        .agent_mut("buyer_agent")
        .unwrap()
        .set_nym_id("nym_carol");
    assert_eq!(
        fx.contract
            .verify_party_authorization(&stranger, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::UnknownNym(NymId::from("nym_carol")))
    );

    // bob signing for alice's party
    let mut forged = buyer.clone();
    forged.agent_mut("buyer_agent").unwrap().set_nym_id("nym_bob");
    fx.notary.issue(&fx.bob, 100);
    assert!(matches!(
        fx.contract
            .verify_party_authorization(&forged, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::InvalidSignature { .. })
    ));
}

#[test]
fn changed_contract_fails_authorization() {
    let mut fx = confirmed();
    fx.notary.issue(&fx.alice, 100);
    fx.contract
        .variable_mut("status")
        .unwrap()
        .set_value("disputed")
        .unwrap();
    let buyer = fx.contract.party("buyer").unwrap().clone();
    let signer = fx.alice.id().clone();
    assert_eq!(
        fx.contract
            .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::SignedCopyMismatch(s!("buyer")))
    );
}

#[test]
fn pooled_nyms_are_not_reloaded() {
    let mut fx = confirmed();
    fx.notary.issue(&fx.alice, 100);
    let buyer = fx.contract.party("buyer").unwrap().clone();
    let signer = fx.alice.id().clone();

    fx.contract
        .verify_party_authorization(&buyer, &mut fx.notary.ctx(&signer), false)
        .unwrap();
    assert_eq!(fx.notary.nyms.loads(), 1);

    let mut pool = BTreeMap::<NymId, Box<dyn Nym>>::new();
    pool.insert(fx.alice.id().clone(), Box::new(fx.alice.public()));
    let mut ctx = fx.notary.ctx(&signer);
    ctx.loaded_nyms = Some(&pool);
    fx.contract
        .verify_party_authorization(&buyer, &mut ctx, false)
        .unwrap();
    drop(ctx);
    assert_eq!(fx.notary.nyms.loads(), 1);
}

#[test]
fn account_authorization() {
    let mut fx = confirmed();
    let signer = fx.alice.id().clone();
    fx.notary.open_account("acct_buyer", &fx.alice, "usd");
    fx.notary.issue(&fx.alice, 101);
    let account = fx.contract.party_account("buyer_acct").unwrap().clone();

    fx.contract
        .verify_party_acct_authorization(&account, &mut fx.notary.ctx(&signer), true)
        .unwrap();
    assert_eq!(
        fx.contract
            .verify_party_acct_authorization(&account, &mut fx.notary.ctx(&signer), true),
        Err(AuthError::NumberUsed { nym: signer.clone(), number: 101 })
    );

    let seller_account = fx.contract.party_account("seller_acct").unwrap().clone();
    fx.notary.open_account("acct_seller", &fx.alice, "usd");
    assert_eq!(
        fx.contract
            .verify_party_acct_authorization(&seller_account, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::NotOwner { party: s!("seller"), account: AccountId::from("acct_seller") })
    );

    fx.notary.open_account("acct_seller", &fx.bob, "eur");
    assert_eq!(
        fx.contract
            .verify_party_acct_authorization(&seller_account, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::InstrumentMismatch { account: AccountId::from("acct_seller") })
    );

    let orphan = PartyAccount::new("orphan", "buyer_agent", "acct_orphan", "usd", 0);
    assert!(matches!(
        fx.contract
            .verify_party_acct_authorization(&orphan, &mut fx.notary.ctx(&signer), false),
        Err(AuthError::AccountNotInContract(_))
    ));
}

#[test]
fn nym_as_agent() {
    let fx = confirmed();
    assert_eq!(fx.contract.verify_nym_as_agent(fx.alice.id()).unwrap().name(), "buyer");
    assert_eq!(fx.contract.verify_nym_as_agent(fx.bob.id()).unwrap().name(), "seller");
    assert_eq!(
        fx.contract.verify_nym_as_agent(&NymId::from("nym_carol")).err(),
        Some(AuthError::NotAnAgent(NymId::from("nym_carol")))
    );

    let buyer_acct = AccountId::from("acct_buyer");
    assert!(fx.contract.verify_nym_as_agent_for_account(fx.alice.id(), &buyer_acct).is_ok());
    assert!(fx.contract.verify_nym_as_agent_for_account(fx.bob.id(), &buyer_acct).is_err());
    assert_eq!(fx.contract.find_party_by_account(&buyer_acct).unwrap().name(), "buyer");
    assert_eq!(fx.contract.find_party_by_nym_as_agent(fx.bob.id()).unwrap().name(), "seller");
}
