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

//! Ascii-armoring of opaque payloads (clause code, string values, signed
//! copies and signatures) embedded into contract text.

use std::string::FromUtf8Error;

use baid64::base64::engine::general_purpose::STANDARD;
use baid64::base64::{DecodeError, Engine};

pub const ARMOR_LINE_WIDTH: usize = 64;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ArmorError {
    /// invalid armored data. Details: {0}
    #[from]
    Base64(DecodeError),

    /// armored data is not a valid UTF-8 text. Details: {0}
    #[from]
    Utf8(FromUtf8Error),
}

pub fn armor(data: impl AsRef<[u8]>) -> String {
    let encoded = STANDARD.encode(data);
    let mut armored = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE_WIDTH + 1);
    for (no, chunk) in encoded.as_bytes().chunks(ARMOR_LINE_WIDTH).enumerate() {
        if no > 0 {
            armored.push('\n');
        }
        // base64 output is always ASCII
        armored.push_str(&String::from_utf8_lossy(chunk));
    }
    armored
}

pub fn dearmor(armored: &str) -> Result<Vec<u8>, ArmorError> {
    let compact = armored
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    Ok(STANDARD.decode(compact)?)
}

pub fn dearmor_string(armored: &str) -> Result<String, ArmorError> {
    Ok(String::from_utf8(dearmor(armored)?)?)
}
