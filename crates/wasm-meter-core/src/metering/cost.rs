//! Gas cost tables.
//!
//! A cost table is a nested map whose leaves are non-negative integers:
//!
//! ```json
//! {
//!   "type": { "params": { "DEFAULT": 1 }, "DEFAULT": 0 },
//!   "code": {
//!     "locals": { "DEFAULT": 1 },
//!     "code": { "call": 10, "add": 1, "DEFAULT": 1 }
//!   }
//! }
//! ```
//!
//! `type` prices each defined function's signature, `code.locals` its local
//! groups and `code.code` each instruction by base mnemonic. At every level
//! the `DEFAULT` entry replaces the fallback inherited from the parent, and a
//! missing key costs the fallback.

use crate::ir::{FuncSignature, Instruction, LocalGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-level fallback key.
pub const DEFAULT_KEY: &str = "DEFAULT";

/// A cost table entry: either a flat cost or a nested table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostNode {
    Cost(u64),
    Table(CostTable),
}

/// One level of a cost table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    entries: BTreeMap<String, CostNode>,
}

static EMPTY_TABLE: CostTable = CostTable {
    entries: BTreeMap::new(),
};

/// A field of an IR node as the cost table sees it.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    /// A string value, priced by looking it up as a key.
    Name(&'a str),
    /// A list of strings, each priced as a key.
    Names(&'a [&'a str]),
    /// Any non-string value (counts, indices); costs the fallback.
    Scalar,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CostNode> {
        self.entries.get(key)
    }

    /// The nested table under `key`, or an empty table.
    pub fn subtable(&self, key: &str) -> &CostTable {
        match self.entries.get(key) {
            Some(CostNode::Table(table)) => table,
            _ => &EMPTY_TABLE,
        }
    }

    /// This level's `DEFAULT` cost, if it declares one.
    pub fn default_cost(&self) -> Option<u64> {
        match self.entries.get(DEFAULT_KEY) {
            Some(CostNode::Cost(cost)) => Some(*cost),
            _ => None,
        }
    }

    fn fallback(&self, inherited: u64) -> u64 {
        self.default_cost().unwrap_or(inherited)
    }

    /// Cost of a string value looked up as a key of this table.
    ///
    /// The empty string is free. A key bound to a nested table costs that
    /// table's fallback.
    pub fn price_name(&self, name: &str, inherited: u64) -> u64 {
        if name.is_empty() {
            return 0;
        }
        let fallback = self.fallback(inherited);
        match self.entries.get(name) {
            Some(CostNode::Cost(cost)) => *cost,
            Some(CostNode::Table(table)) => table.fallback(fallback),
            None => fallback,
        }
    }

    fn price_field(&self, value: Field<'_>, inherited: u64) -> u64 {
        match value {
            Field::Name(name) => self.price_name(name, inherited),
            // sequence elements start over from this level's DEFAULT, or zero
            Field::Names(names) => sum(names.iter().map(|name| self.price_name(name, 0))),
            Field::Scalar => self.fallback(inherited),
        }
    }

    /// Cost of a record: the sum of its fields.
    ///
    /// A field whose key is absent costs the fallback. A flat cost under the
    /// key is the field's cost. A nested table under the key prices the
    /// field's value.
    pub fn price_record(&self, fields: &[(&str, Field<'_>)], inherited: u64) -> u64 {
        let fallback = self.fallback(inherited);
        sum(fields.iter().map(|(key, value)| match self.entries.get(*key) {
            None => fallback,
            Some(CostNode::Cost(cost)) => *cost,
            Some(CostNode::Table(table)) => table.price_field(*value, fallback),
        }))
    }

    /// Cost of a sequence of priced nodes.
    pub fn price_all<T: Priced>(&self, items: &[T]) -> u64 {
        sum(items.iter().map(|item| item.price(self, 0)))
    }
}

impl FromIterator<(String, CostNode)> for CostTable {
    fn from_iter<I: IntoIterator<Item = (String, CostNode)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn sum(costs: impl Iterator<Item = u64>) -> u64 {
    costs.fold(0, u64::saturating_add)
}

/// IR nodes that know which keys they contribute to a cost lookup.
pub trait Priced {
    fn price(&self, table: &CostTable, inherited: u64) -> u64;
}

impl Priced for FuncSignature {
    fn price(&self, table: &CostTable, inherited: u64) -> u64 {
        let params: Vec<&str> = self.params.iter().map(|ty| ty.name()).collect();
        let returns: Vec<&str> = self.returns.iter().map(|ty| ty.name()).collect();
        table.price_record(
            &[
                ("form", Field::Name(self.form.name())),
                ("params", Field::Names(&params)),
                ("returns", Field::Names(&returns)),
            ],
            inherited,
        )
    }
}

impl Priced for LocalGroup {
    fn price(&self, table: &CostTable, inherited: u64) -> u64 {
        table.price_record(
            &[("count", Field::Scalar), ("type", Field::Name(self.ty.name()))],
            inherited,
        )
    }
}

impl Priced for Instruction {
    fn price(&self, table: &CostTable, inherited: u64) -> u64 {
        table.price_name(self.name, inherited)
    }
}

/// A complete cost table with accessors for the areas the metering pass
/// consults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostModel {
    root: CostTable,
}

impl CostModel {
    pub fn new(root: CostTable) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &CostTable {
        &self.root
    }

    pub fn signature_table(&self) -> &CostTable {
        self.root.subtable("type")
    }

    pub fn locals_table(&self) -> &CostTable {
        self.root.subtable("code").subtable("locals")
    }

    pub fn instruction_table(&self) -> &CostTable {
        self.root.subtable("code").subtable("code")
    }

    pub fn signature_cost(&self, signature: &FuncSignature) -> u64 {
        signature.price(self.signature_table(), 0)
    }

    pub fn locals_cost(&self, locals: &[LocalGroup]) -> u64 {
        self.locals_table().price_all(locals)
    }

    pub fn instruction_cost(&self, instruction: &Instruction) -> u64 {
        instruction.price(self.instruction_table(), 0)
    }
}
