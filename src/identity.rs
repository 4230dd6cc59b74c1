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

//! Signer identities (nyms) as seen by the contract.

use std::cell::Cell;
use std::collections::BTreeMap;

use amplify::Wrapper;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::ids::NymId;

/// Detached signature over contract content.
#[derive(Wrapper, Clone, Eq, PartialEq, Hash, Debug, Default, From)]
#[wrapper(Deref, AsSlice, BorrowSlice)]
pub struct Signature(#[from] Vec<u8>);

/// Public side of a signer: enough to verify what it signed.
pub trait Nym {
    fn id(&self) -> &NymId;

    fn verify(&self, content: &[u8], signature: &Signature) -> bool;
}

/// A nym able to produce signatures.
pub trait NymSigner: Nym {
    fn sign(&self, content: &[u8]) -> Signature;
}

/// Loads nyms which are not already present in the caller's pool.
pub trait NymResolver {
    fn load_nym(&self, id: &NymId) -> Option<Box<dyn Nym>>;
}

/// Public key of a nym.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PublicNym {
    id: NymId,
    key: VerifyingKey,
}

impl PublicNym {
    pub fn new(id: impl Into<NymId>, key: VerifyingKey) -> Self { PublicNym { id: id.into(), key } }

    pub fn key(&self) -> &VerifyingKey { &self.key }
}

impl Nym for PublicNym {
    fn id(&self) -> &NymId { &self.id }

    fn verify(&self, content: &[u8], signature: &Signature) -> bool {
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature.as_slice()) else {
            return false;
        };
        self.key.verify(content, &signature).is_ok()
    }
}

/// Nym holding an Ed25519 signing key in memory.
#[derive(Clone, Debug)]
pub struct MemNym {
    id: NymId,
    key: SigningKey,
}

impl MemNym {
    /// Constructs the nym from a 32-byte secret seed.
    pub fn from_seed(id: impl Into<NymId>, seed: &[u8; 32]) -> Self {
        MemNym { id: id.into(), key: SigningKey::from_bytes(seed) }
    }

    pub fn public(&self) -> PublicNym { PublicNym::new(self.id.clone(), self.key.verifying_key()) }
}

impl Nym for MemNym {
    fn id(&self) -> &NymId { &self.id }

    fn verify(&self, content: &[u8], signature: &Signature) -> bool { self.public().verify(content, signature) }
}

impl NymSigner for MemNym {
    fn sign(&self, content: &[u8]) -> Signature { Signature::from(self.key.sign(content).to_bytes().to_vec()) }
}

/// In-memory wallet of public nyms, counting how many nyms it had to load.
#[derive(Clone, Debug, Default)]
pub struct MemNymStore {
    nyms: BTreeMap<NymId, PublicNym>,
    loads: Cell<usize>,
}

impl MemNymStore {
    pub fn new() -> Self { MemNymStore::default() }

    pub fn insert(&mut self, nym: PublicNym) { self.nyms.insert(nym.id.clone(), nym); }

    pub fn get(&self, id: &NymId) -> Option<&PublicNym> { self.nyms.get(id) }

    pub fn loads(&self) -> usize { self.loads.get() }
}

impl NymResolver for MemNymStore {
    fn load_nym(&self, id: &NymId) -> Option<Box<dyn Nym>> {
        let nym = self.nyms.get(id)?.clone();
        self.loads.set(self.loads.get() + 1);
        Some(Box::new(nym))
    }
}
