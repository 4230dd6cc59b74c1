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

//! Signed envelope of contract text.

use core::fmt::{self, Display, Formatter};
use core::str::FromStr;

use crate::armor::{armor, dearmor, ArmorError};
use crate::identity::{Nym, NymSigner, Signature};
use crate::ids::NymId;

pub const BEGIN_CONTRACT: &str = "-----BEGIN SIGNED SCRIPTABLE-----";
pub const BEGIN_SIGNATURE: &str = "-----BEGIN SIGNATURE-----";
pub const END_SIGNATURE: &str = "-----END SIGNATURE-----";

const SIGNER_PREFIX: &str = "nym: ";

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ContractError {
    /// signed contract text must start with `-----BEGIN SIGNED SCRIPTABLE-----`.
    NoHeader,

    /// signature block is not terminated.
    UnterminatedSignature,

    /// signature block does not name its signer.
    NoSigner,

    /// unexpected text `{0}` between signature blocks.
    UnexpectedText(String),

    #[from]
    #[display(inner)]
    Armor(ArmorError),
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContractSignature {
    pub signer: NymId,
    pub data: Signature,
}

/// Contract text together with the signatures made over it.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SignedContract {
    content: String,
    signatures: Vec<ContractSignature>,
}

impl SignedContract {
    pub fn new(content: impl Into<String>) -> Self {
        SignedContract { content: content.into(), signatures: none!() }
    }

    pub fn with_signatures(content: impl Into<String>, signatures: Vec<ContractSignature>) -> Self {
        SignedContract { content: content.into(), signatures }
    }

    pub fn content(&self) -> &str { &self.content }

    pub fn signatures(&self) -> &[ContractSignature] { &self.signatures }

    pub fn into_parts(self) -> (String, Vec<ContractSignature>) { (self.content, self.signatures) }

    pub fn sign(&mut self, signer: &dyn NymSigner) {
        let data = signer.sign(self.content.as_bytes());
        self.signatures.push(ContractSignature { signer: signer.id().clone(), data });
    }

    /// Whether any signature made by `nym` is valid over the content.
    pub fn verify(&self, nym: &dyn Nym) -> bool {
        self.signatures
            .iter()
            .filter(|sig| &sig.signer == nym.id())
            .any(|sig| nym.verify(self.content.as_bytes(), &sig.data))
    }

    pub fn release_signatures(&mut self) { self.signatures.clear() }
}

impl Display for SignedContract {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BEGIN_CONTRACT}")?;
        writeln!(f, "{}", self.content)?;
        for sig in &self.signatures {
            writeln!(f, "{BEGIN_SIGNATURE}")?;
            writeln!(f, "{SIGNER_PREFIX}{}", sig.signer)?;
            writeln!(f, "{}", armor(sig.data.as_slice()))?;
            writeln!(f, "{END_SIGNATURE}")?;
        }
        Ok(())
    }
}

impl FromStr for SignedContract {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .trim_start()
            .strip_prefix(BEGIN_CONTRACT)
            .and_then(|rest| rest.strip_prefix('\n'))
            .ok_or(ContractError::NoHeader)?;

        let (content, rest) = if let Some(rest) = body.strip_prefix(BEGIN_SIGNATURE) {
            ("", Some(rest))
        } else {
            match body.find(&format!("\n{BEGIN_SIGNATURE}")) {
                Some(pos) => (&body[..pos], Some(&body[pos + 1 + BEGIN_SIGNATURE.len()..])),
                None => (body.strip_suffix('\n').unwrap_or(body), None),
            }
        };

        let mut signatures = vec![];
        let mut lines = rest.into_iter().flat_map(str::lines);
        // the first block header was already consumed by the split above
        let mut in_block = rest.is_some();
        while in_block {
            let signer = lines
                .by_ref()
                .find(|line| !line.trim().is_empty())
                .and_then(|line| line.strip_prefix(SIGNER_PREFIX))
                .ok_or(ContractError::NoSigner)?;
            let mut armored = String::new();
            loop {
                match lines.next() {
                    Some(END_SIGNATURE) => break,
                    Some(line) => armored.push_str(line),
                    None => return Err(ContractError::UnterminatedSignature),
                }
            }
            signatures.push(ContractSignature {
                signer: NymId::from(signer.trim()),
                data: Signature::from(dearmor(&armored)?),
            });
            in_block = false;
            for line in lines.by_ref() {
                match line.trim() {
                    "" => continue,
                    BEGIN_SIGNATURE => {
                        in_block = true;
                        break;
                    }
                    other => return Err(ContractError::UnexpectedText(other.to_owned())),
                }
            }
        }

        Ok(SignedContract::with_signatures(content, signatures))
    }
}
