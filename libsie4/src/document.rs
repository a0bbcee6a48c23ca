//! The document graph: one SIE4 file in memory.
//!
//! Ownership is strictly tree-shaped. The document owns every collection;
//! journal entries own their lines. Two cross-cutting relations are kept
//! in sync on attach: correlation (child carries the parent's correlation
//! id) and propagated context (company id, organization number, series,
//! entry number flow downward).

use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::account::{Account, SruCode};
use crate::balance::{BalancePost, ObjectBalancePost, PeriodPost};
use crate::dimension::{Dimension, DimensionObject, SubDimension};
use crate::journal::JournalEntry;

/// The only SIE type this codec speaks.
pub const SIE_TYPE: u32 = 4;

/// Unique `(timestamp, random id)` stamp given to every document, entry
/// and line at creation. Used purely to correlate children with their
/// parent; never for ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub timestamp_micros: i64,
    pub id: u32,
}

impl Correlation {
    pub fn stamp() -> Correlation {
        Correlation {
            timestamp_micros: Utc::now().timestamp_micros(),
            id: rand::random(),
        }
    }
}

/// Organization number with the optional multiple-business marker
/// (`förvärvsnummer`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgNumber {
    pub number: String,
    pub multiple: Option<i32>,
}

impl OrgNumber {
    pub fn new(number: impl Into<String>) -> OrgNumber {
        OrgNumber {
            number: number.into(),
            multiple: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub contact: String,
    pub distribution: String,
    pub postal: String,
    pub phone: String,
}

/// One fiscal-year span. Index 0 is the current year, -1 the previous
/// one; positive indices are invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub index: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    pub date: NaiveDate,
    pub author: Option<String>,
}

/// The identification block: everything phase 2 of the file says about
/// the exporting program and the company.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub program: Option<Program>,
    pub generated: Option<Generated>,
    pub prosa: Option<String>,
    pub company_type: Option<String>,
    pub company_id: Option<String>,
    pub org_number: Option<OrgNumber>,
    pub industry_code: Option<String>,
    pub address: Option<Address>,
    pub company_name: Option<String>,
    pub fiscal_years: Vec<FiscalYear>,
    pub tax_year: Option<i32>,
    pub cutoff_date: Option<NaiveDate>,
    pub chart_type: Option<String>,
    pub currency: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub flag: u8,
    pub sie_type: u32,
    checksum: Option<u32>,
    pub identification: Identification,
    pub accounts: IndexMap<String, Account>,
    pub sru: Vec<SruCode>,
    pub dimensions: IndexMap<u32, Dimension>,
    pub sub_dimensions: Vec<SubDimension>,
    pub objects: Vec<DimensionObject>,
    pub ib: Vec<BalancePost>,
    pub ub: Vec<BalancePost>,
    pub oib: Vec<ObjectBalancePost>,
    pub oub: Vec<ObjectBalancePost>,
    pub res: Vec<BalancePost>,
    pub psaldo: Vec<PeriodPost>,
    pub pbudget: Vec<PeriodPost>,
    entries: Vec<JournalEntry>,
    correlation: Correlation,
}

impl Document {
    pub fn new() -> Document {
        Document {
            flag: 0,
            sie_type: SIE_TYPE,
            checksum: None,
            identification: Identification::default(),
            accounts: IndexMap::new(),
            sru: Vec::new(),
            dimensions: IndexMap::new(),
            sub_dimensions: Vec::new(),
            objects: Vec::new(),
            ib: Vec::new(),
            ub: Vec::new(),
            oib: Vec::new(),
            oub: Vec::new(),
            res: Vec::new(),
            psaldo: Vec::new(),
            pbudget: Vec::new(),
            entries: Vec::new(),
            correlation: Correlation::stamp(),
        }
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// The checksum value the parsed input carried, if any. The writer
    /// never re-emits this; it recomputes a fresh value.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    pub(crate) fn set_checksum(&mut self, value: Option<u32>) {
        self.checksum = value;
    }

    pub fn insert_account(&mut self, account: Account) {
        self.accounts.insert(account.number.clone(), account);
    }

    pub fn insert_dimension(&mut self, dimension: Dimension) {
        self.dimensions.insert(dimension.id, dimension);
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [JournalEntry] {
        &mut self.entries
    }

    /// Attach a journal entry, applying the document's propagated context
    /// to it and (through it) to all its lines.
    pub fn push_entry(&mut self, mut entry: JournalEntry) {
        entry.apply_document_context(
            self.correlation.id,
            self.identification.company_id.clone(),
            self.identification.org_number.clone(),
        );
        self.entries.push(entry);
    }

    /// Re-apply the document context to every attached entry and line.
    pub fn repropagate(&mut self) {
        let doc_id = self.correlation.id;
        let company_id = self.identification.company_id.clone();
        let org_number = self.identification.org_number.clone();
        for entry in &mut self.entries {
            entry.apply_document_context(doc_id, company_id.clone(), org_number.clone());
        }
    }

    pub fn set_company_id(&mut self, company_id: Option<String>) {
        self.identification.company_id = company_id;
        self.repropagate();
    }

    pub fn set_org_number(&mut self, org_number: Option<OrgNumber>) {
        self.identification.org_number = org_number;
        self.repropagate();
    }
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, OrgNumber};
    use crate::journal::{JournalEntry, JournalLine, TransKind};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn entry_with_lines() -> JournalEntry {
        let mut entry =
            JournalEntry::new("A", NaiveDate::from_ymd_opt(2021, 1, 5).unwrap());
        entry.push_line(JournalLine::new(TransKind::Normal, "1910", dec!(-100)));
        entry.push_line(JournalLine::new(TransKind::Normal, "6250", dec!(100)));
        entry
    }

    #[test]
    fn attach_applies_document_context() {
        let mut doc = Document::new();
        doc.identification.company_id = Some("F1".to_string());
        doc.identification.org_number = Some(OrgNumber::new("556334-3689"));

        doc.push_entry(entry_with_lines());

        let entry = &doc.entries()[0];
        assert_eq!(entry.company_id(), Some("F1"));
        assert_eq!(entry.parent_id(), Some(doc.correlation().id));
        for line in entry.lines() {
            assert_eq!(line.org_number().unwrap().number, "556334-3689");
            assert_eq!(line.series(), Some("A"));
        }
    }

    #[test]
    fn org_number_set_after_attach_reaches_existing_lines() {
        let mut doc = Document::new();
        doc.push_entry(entry_with_lines());
        assert!(doc.entries()[0].lines()[0].org_number().is_none());

        doc.set_org_number(Some(OrgNumber::new("556334-3689")));
        doc.set_company_id(Some("F9".to_string()));

        for entry in doc.entries() {
            assert_eq!(entry.org_number().unwrap().number, "556334-3689");
            for line in entry.lines() {
                assert_eq!(line.org_number().unwrap().number, "556334-3689");
                assert_eq!(line.company_id(), Some("F9"));
            }
        }
    }

    #[test]
    fn correlation_stamps_are_unique_per_document() {
        let a = Document::new();
        let b = Document::new();
        assert_ne!(a.correlation().id, b.correlation().id);
    }
}
