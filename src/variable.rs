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

use core::fmt::{self, Display, Formatter};
use core::str::FromStr;

use tracing::warn;

use crate::armor::{armor, dearmor_string};
use crate::script::ScriptEngine;
use crate::tag::{ParseError, Tag};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum VariableType {
    Integer,
    String,
    Bool,
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(VariableType::Integer),
            "string" => Ok(VariableType::String),
            "bool" => Ok(VariableType::Bool),
            other => Err(format!("unknown variable type `{other}`")),
        }
    }
}

/// Who may change a variable, and whether parties must be told about changes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum VariableAccess {
    /// Value is fixed at construction.
    Constant,
    /// Value may be changed by script execution.
    Persistent,
    /// Like persistent, but every change requires a notice to the parties.
    Important,
}

impl FromStr for VariableAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(VariableAccess::Constant),
            "persistent" => Ok(VariableAccess::Persistent),
            "important" => Ok(VariableAccess::Important),
            other => Err(format!("unknown variable access `{other}`")),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    #[from]
    Integer(i64),
    #[from]
    String(String),
    #[from]
    Bool(bool),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_owned()) }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(val) => Display::fmt(val, f),
            Value::String(val) => f.write_str(val),
            Value::Bool(val) => Display::fmt(val, f),
        }
    }
}

impl Value {
    pub fn value_type(&self) -> VariableType {
        match self {
            Value::Integer(_) => VariableType::Integer,
            Value::String(_) => VariableType::String,
            Value::Bool(_) => VariableType::Bool,
        }
    }

    /// Value which a variable of the given type takes in template form.
    pub fn blank(ty: VariableType) -> Value {
        match ty {
            VariableType::Integer => Value::Integer(0),
            VariableType::String => Value::String(none!()),
            VariableType::Bool => Value::Bool(false),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum VariableError {
    /// variable `{0}` is constant and can't be changed.
    ConstantWrite(String),

    /// variable `{name}` has type {actual}, while {requested} was requested.
    TypeMismatch { name: String, actual: VariableType, requested: VariableType },
}

/// Named, typed value owned by a bylaw and exposed to the clause scripts.
///
/// A variable tracks the value it had when it was last marked clean; the
/// difference between the two is what makes it (and its bylaw) dirty.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Variable {
    name: String,
    access: VariableAccess,
    value: Value,
    clean: Value,
    bylaw: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, access: VariableAccess) -> Self {
        let value = value.into();
        Variable { name: name.into(), access, clean: value.clone(), value, bylaw: None }
    }

    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, value, VariableAccess::Constant)
    }

    pub fn persistent(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, value, VariableAccess::Persistent)
    }

    pub fn important(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, value, VariableAccess::Important)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn var_type(&self) -> VariableType { self.value.value_type() }

    pub fn access(&self) -> VariableAccess { self.access }

    pub fn value(&self) -> &Value { &self.value }

    /// Name of the bylaw owning the variable, once inserted into one.
    pub fn bylaw(&self) -> Option<&str> { self.bylaw.as_deref() }

    pub(crate) fn set_bylaw(&mut self, bylaw: &str) { self.bylaw = Some(bylaw.to_owned()) }

    pub fn is_constant(&self) -> bool { self.access == VariableAccess::Constant }

    /// Both persistent and important variables persist changes.
    pub fn is_persistent(&self) -> bool { self.access != VariableAccess::Constant }

    pub fn is_important(&self) -> bool { self.access == VariableAccess::Important }

    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), VariableError> {
        let value = value.into();
        if self.is_constant() {
            return Err(VariableError::ConstantWrite(self.name.clone()));
        }
        if value.value_type() != self.var_type() {
            return Err(VariableError::TypeMismatch {
                name: self.name.clone(),
                actual: self.var_type(),
                requested: value.value_type(),
            });
        }
        self.value = value;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool { self.value != self.clean }

    pub fn is_dirty_important(&self) -> bool { self.is_important() && self.is_dirty() }

    pub fn set_clean(&mut self) { self.clean = self.value.clone(); }

    pub fn copy_value_integer(&self) -> Result<i64, VariableError> {
        match self.value {
            Value::Integer(val) => Ok(val),
            _ => Err(self.mismatch(VariableType::Integer)),
        }
    }

    pub fn copy_value_string(&self) -> Result<String, VariableError> {
        match &self.value {
            Value::String(val) => Ok(val.clone()),
            _ => Err(self.mismatch(VariableType::String)),
        }
    }

    pub fn copy_value_bool(&self) -> Result<bool, VariableError> {
        match self.value {
            Value::Bool(val) => Ok(val),
            _ => Err(self.mismatch(VariableType::Bool)),
        }
    }

    /// Pushes the current value into the script symbol table and resets the
    /// dirty-tracking baseline, so that after execution the variable is dirty
    /// only if the script changed it.
    pub fn register_for_execution(&mut self, script: &mut dyn ScriptEngine) {
        self.set_clean();
        script.add_variable(self);
    }

    /// Takes back a value produced by script execution. Constant variables and
    /// values of a foreign type are refused.
    pub(crate) fn accept_script_value(&mut self, value: Value) -> bool {
        if value == self.value {
            return true;
        }
        match self.set_value(value) {
            Ok(()) => true,
            Err(err) => {
                warn!(variable = %self.name, "script result rejected: {err}");
                false
            }
        }
    }

    /// Structural equality: name, type, access and current value.
    pub fn compare(&self, other: &Variable) -> bool {
        if self.name != other.name {
            warn!(left = %self.name, right = %other.name, "variable names differ");
            return false;
        }
        if self.access != other.access || self.value != other.value {
            warn!(variable = %self.name, "variable access or value differs");
            return false;
        }
        true
    }

    /// Values are left out of the id calculation, since script execution
    /// changes them over the lifetime of a contract.
    pub fn to_tag(&self, for_id: bool) -> Tag {
        let mut tag = Tag::new("variable");
        tag.add_attribute("name", &self.name);
        tag.add_attribute("type", self.var_type());
        tag.add_attribute("access", self.access);
        let value = if for_id { Value::blank(self.var_type()) } else { self.value.clone() };
        match value {
            Value::String(val) if val.is_empty() => tag.add_attribute("valueExists", false),
            Value::String(val) => {
                tag.add_attribute("valueExists", true);
                tag.set_text(armor(val));
            }
            value => tag.add_attribute("value", value),
        }
        tag
    }

    pub fn from_tag(tag: &Tag) -> Result<Self, ParseError> {
        tag.expect_name("variable")?;
        let name = tag.required_attr("name")?;
        let ty = tag.parse_attr::<VariableType>("type")?;
        let access = tag.parse_attr::<VariableAccess>("access")?;
        let value = match ty {
            VariableType::Integer => Value::Integer(tag.parse_attr("value")?),
            VariableType::Bool => Value::Bool(tag.bool_attr("value")?),
            VariableType::String if tag.bool_attr("valueExists")? => {
                Value::String(dearmor_string(tag.required_text()?)?)
            }
            VariableType::String => Value::String(none!()),
        };
        Ok(Variable::new(name, value, access))
    }

    fn mismatch(&self, requested: VariableType) -> VariableError {
        VariableError::TypeMismatch { name: self.name.clone(), actual: self.var_type(), requested }
    }
}
