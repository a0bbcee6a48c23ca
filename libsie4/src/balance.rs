//! Balance and period posts: opening/closing balances (`#IB`/`#UB`),
//! their object-qualified forms (`#OIB`/`#OUB`), result balances
//! (`#RES`) and period balances/budgets (`#PSALDO`/`#PBUDGET`).
//!
//! The fiscal-year index counts backwards: 0 is the current year, -1 the
//! previous one. Positive indices are rejected by the validator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dimension::ObjectRef;

/// Plain balance post, the `#IB`/`#UB`/`#RES` shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePost {
    pub year_index: i32,
    pub account: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
}

impl BalancePost {
    pub fn new(year_index: i32, account: impl Into<String>, amount: Decimal) -> BalancePost {
        BalancePost {
            year_index,
            account: account.into(),
            amount,
            quantity: None,
        }
    }
}

/// Object-qualified balance post, the `#OIB`/`#OUB` shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectBalancePost {
    pub year_index: i32,
    pub account: String,
    pub object: ObjectRef,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
}

/// Period post, the `#PSALDO`/`#PBUDGET` shape. The period is a `YYYYMM`
/// string; the object reference is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodPost {
    pub year_index: i32,
    pub period: String,
    pub account: String,
    pub object: Option<ObjectRef>,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
}

impl PeriodPost {
    pub fn period_is_valid(&self) -> bool {
        self.period.len() == 6
            && self.period.bytes().all(|b| b.is_ascii_digit())
            && matches!(&self.period[4..6], "01" | "02" | "03" | "04" | "05" | "06" | "07" | "08" | "09" | "10" | "11" | "12")
    }
}
