use std::fmt;

use serde::{Deserialize, Serialize};

/// The four SIE account classes, tagged `T`/`S`/`K`/`I` on the wire
/// (tillgång, skuld, kostnad, intäkt).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Asset,
    Liability,
    Cost,
    Income,
}

impl AccountKind {
    pub fn wire_letter(&self) -> &'static str {
        match self {
            AccountKind::Asset => "T",
            AccountKind::Liability => "S",
            AccountKind::Cost => "K",
            AccountKind::Income => "I",
        }
    }

    pub fn from_wire_letter(letter: &str) -> Option<AccountKind> {
        match letter.to_ascii_uppercase().as_str() {
            "T" => Some(AccountKind::Asset),
            "S" => Some(AccountKind::Liability),
            "K" => Some(AccountKind::Cost),
            "I" => Some(AccountKind::Income),
            _ => None,
        }
    }

    /// Derive the class from an account number per the BAS chart layout:
    /// 1xxx assets, 2xxx liabilities, 3xxx income, the rest costs.
    pub fn from_account_number(number: &str) -> AccountKind {
        match number.chars().next() {
            Some('1') => AccountKind::Asset,
            Some('2') => AccountKind::Liability,
            Some('3') => AccountKind::Income,
            _ => AccountKind::Cost,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_letter())
    }
}

/// One row of the chart of accounts. The number is kept as text: SIE does
/// not promise numeric account identifiers even though BAS charts use them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub name: String,
    pub kind: Option<AccountKind>,
    pub unit: Option<String>,
}

impl Account {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Account {
        Account {
            number: number.into(),
            name: name.into(),
            kind: None,
            unit: None,
        }
    }

    /// The explicit kind when one was given, otherwise the class derived
    /// from the account number.
    pub fn kind_or_derived(&self) -> AccountKind {
        self.kind
            .unwrap_or_else(|| AccountKind::from_account_number(&self.number))
    }
}

/// An account's SRU code (the tax agency's standardized reporting code).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SruCode {
    pub account: String,
    pub code: String,
}
