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

use tracing::warn;

use crate::armor::{armor, dearmor_string};
use crate::tag::{ParseError, Tag};

/// Statement handed to the script engine instead of an empty clause body.
pub const EMPTY_CLAUSE_CODE: &str = "print(\"(Empty clause.)\");";

/// Named unit of script source code owned by a bylaw.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Clause {
    name: String,
    code: String,
    bylaw: Option<String>,
}

impl Clause {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Clause { name: name.into(), code: code.into(), bylaw: None }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Source code of the clause; never empty.
    pub fn code(&self) -> &str {
        if self.code.is_empty() {
            EMPTY_CLAUSE_CODE
        } else {
            &self.code
        }
    }

    pub fn set_code(&mut self, code: impl Into<String>) { self.code = code.into() }

    /// Name of the bylaw owning the clause, once inserted into one.
    pub fn bylaw(&self) -> Option<&str> { self.bylaw.as_deref() }

    pub(crate) fn set_bylaw(&mut self, bylaw: &str) { self.bylaw = Some(bylaw.to_owned()) }

    /// Byte-for-byte equality of name and code.
    pub fn compare(&self, other: &Clause) -> bool {
        if self.name != other.name {
            warn!(left = %self.name, right = %other.name, "clause names differ");
            return false;
        }
        if self.code != other.code {
            warn!(clause = %self.name, "clause code differs");
            return false;
        }
        true
    }

    pub fn to_tag(&self) -> Tag {
        let mut tag = Tag::new("clause");
        tag.add_attribute("name", &self.name);
        if self.code.len() <= 2 {
            warn!(clause = %self.name, "clause has no meaningful code");
        }
        tag.set_text(armor(&self.code));
        tag
    }

    pub fn from_tag(tag: &Tag) -> Result<Self, ParseError> {
        tag.expect_name("clause")?;
        let name = tag.required_attr("name")?;
        let code = match tag.text() {
            Some(armored) => dearmor_string(armored)?,
            None => none!(),
        };
        Ok(Clause::new(name, code))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_code_placeholder() {
        let mut clause = Clause::new("noop", "");
        assert_eq!(clause.code(), EMPTY_CLAUSE_CODE);
        clause.set_code("return true;");
        assert_eq!(clause.code(), "return true;");
    }

    #[test]
    fn exact_comparison() {
        let a = Clause::new("pay", "transfer(a, b, 1);");
        assert!(a.compare(&Clause::new("pay", "transfer(a, b, 1);")));
        assert!(!a.compare(&Clause::new("pay", "transfer(a, b, 1); ")));
        assert!(!a.compare(&Clause::new("pay2", "transfer(a, b, 1);")));
    }

    #[test]
    fn serialization() {
        let clause = Clause::new("pay", "if (x < 3) { transfer(\"a\", \"b\", 1); }");
        let tag = clause.to_tag();
        assert_eq!(Clause::from_tag(&tag).unwrap(), clause);

        let short = Clause::new("nop", "1;");
        assert!(short.to_tag().text().is_some());
        let parsed = Clause::from_tag(&short.to_tag()).unwrap();
        assert_eq!(parsed.code(), "1;");
        assert!(parsed.compare(&short));

        let empty = Clause::new("empty", "");
        assert_eq!(Clause::from_tag(&empty.to_tag()).unwrap(), empty);
    }
}
