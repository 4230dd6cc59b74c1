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

use core::convert::Infallible;
use core::fmt::{self, Display, Formatter};
use core::str::FromStr;

use amplify::{Bytes32, Wrapper};
use baid64::{Baid64ParseError, DisplayBaid64, FromBaid64Str};
use commit_verify::{DigestExt, Sha256};

/// Transaction number issued by a notary; zero means "no number".
pub type TransNo = i64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Wrapper, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default, Display, From)]
        #[wrapper(Deref)]
        #[display(inner)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
        pub struct $name(#[from] String);

        impl From<&str> for $name {
            fn from(s: &str) -> Self { Self(s.to_owned()) }
        }

        impl FromStr for $name {
            type Err = Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::from(s)) }
        }

        impl $name {
            /// Blank identifiers stand for "not specified" in contract templates.
            pub fn is_blank(&self) -> bool { self.0.is_empty() }
        }
    };
}

string_id!(
    /// Identity (pseudonym) of a signer.
    NymId
);
string_id!(
    /// Identifier of the notary server issuing transaction numbers.
    NotaryId
);
string_id!(
    /// Identifier of an asset account.
    AccountId
);
string_id!(
    /// Identifier of the instrument definition (asset type) of an account.
    InstrumentDefinitionId
);

/// Content address of a scriptable contract.
///
/// Computed over the template form of the contract, so contracts differing
/// only in the concrete accounts and identities plugged into them may share
/// the same id.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Deref, BorrowSlice)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ContractId(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl From<Sha256> for ContractId {
    fn from(hasher: Sha256) -> Self { hasher.finish().into() }
}

impl DisplayBaid64 for ContractId {
    const HRI: &'static str = "otx";
    const CHUNKING: bool = true;
    const PREFIX: bool = true;
    const EMBED_CHECKSUM: bool = false;
    const MNEMONIC: bool = false;
    fn to_baid64_payload(&self) -> [u8; 32] { self.to_byte_array() }
}
impl FromBaid64Str for ContractId {}
impl FromStr for ContractId {
    type Err = Baid64ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_baid64_str(s) }
}
impl Display for ContractId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { self.fmt_baid64(f) }
}

impl ContractId {
    pub const fn from_array(id: [u8; 32]) -> Self { ContractId(Bytes32::from_array(id)) }

    /// Hashes canonical contract text into an id.
    pub fn with_text(text: &str) -> Self {
        let mut hasher = Sha256::default();
        hasher.input_raw(text.as_bytes());
        Self::from(hasher)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_ids() {
        assert!(NymId::default().is_blank());
        assert!(!NymId::from("alice").is_blank());
        assert_eq!(AccountId::from_str("acct1").unwrap().to_string(), "acct1");
    }

    #[test]
    fn contract_id_display_roundtrip() {
        let id = ContractId::with_text("<scriptableContract/>");
        let s = id.to_string();
        assert!(s.starts_with("otx:"));
        assert_eq!(ContractId::from_str(&s).unwrap(), id);
        assert_ne!(id, ContractId::with_text("<scriptableContract />"));
    }
}
