//! Journal entries (`#VER`) and their lines (`#TRANS`/`#RTRANS`/`#BTRANS`).
//!
//! Both entries and lines carry a correlation stamp and a copy of the
//! identifiers propagated from their owner: company id and organization
//! number flow down from the document, series and entry number from the
//! entry. Propagation happens when a child is attached; after mutating a
//! parent, call the explicit `repropagate` operation to push the new
//! values into children that already exist.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dimension::ObjectRef;
use crate::document::{Correlation, OrgNumber};

/// Discriminant for the three journal-line variants sharing one record
/// shape: booked lines, lines added by a correction, and lines removed by
/// a correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransKind {
    Normal,
    Added,
    Removed,
}

impl TransKind {
    /// The wire-label family for this variant.
    pub fn wire_label(&self) -> &'static str {
        match self {
            TransKind::Normal => "#TRANS",
            TransKind::Added => "#RTRANS",
            TransKind::Removed => "#BTRANS",
        }
    }

    pub fn from_label(label: &str) -> Option<TransKind> {
        match label.trim_start_matches('#').to_ascii_uppercase().as_str() {
            "TRANS" => Some(TransKind::Normal),
            "RTRANS" => Some(TransKind::Added),
            "BTRANS" => Some(TransKind::Removed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalLine {
    pub kind: TransKind,
    pub account: String,
    pub objects: Vec<ObjectRef>,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub text: Option<String>,
    pub quantity: Option<Decimal>,
    pub author: Option<String>,
    correlation: Correlation,
    parent_id: Option<u32>,
    company_id: Option<String>,
    org_number: Option<OrgNumber>,
    series: Option<String>,
    entry_number: Option<String>,
}

impl JournalLine {
    pub fn new(kind: TransKind, account: impl Into<String>, amount: Decimal) -> JournalLine {
        JournalLine {
            kind,
            account: account.into(),
            objects: Vec::new(),
            amount,
            date: None,
            text: None,
            quantity: None,
            author: None,
            correlation: Correlation::stamp(),
            parent_id: None,
            company_id: None,
            org_number: None,
            series: None,
            entry_number: None,
        }
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// Correlation id of the owning entry, set at attach time.
    pub fn parent_id(&self) -> Option<u32> {
        self.parent_id
    }

    pub fn company_id(&self) -> Option<&str> {
        self.company_id.as_deref()
    }

    pub fn org_number(&self) -> Option<&OrgNumber> {
        self.org_number.as_ref()
    }

    pub fn series(&self) -> Option<&str> {
        self.series.as_deref()
    }

    pub fn entry_number(&self) -> Option<&str> {
        self.entry_number.as_deref()
    }
}

/// Equality compares content, not correlation stamps or propagated
/// copies: two lines built from the same wire post are equal even though
/// every stamp is unique.
impl PartialEq for JournalLine {
    fn eq(&self, other: &JournalLine) -> bool {
        self.kind == other.kind
            && self.account == other.account
            && self.objects == other.objects
            && self.amount == other.amount
            && self.date == other.date
            && self.text == other.text
            && self.quantity == other.quantity
            && self.author == other.author
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub series: String,
    pub number: Option<String>,
    pub date: NaiveDate,
    pub text: Option<String>,
    pub reg_date: Option<NaiveDate>,
    pub author: Option<String>,
    lines: Vec<JournalLine>,
    correlation: Correlation,
    parent_id: Option<u32>,
    company_id: Option<String>,
    org_number: Option<OrgNumber>,
}

impl JournalEntry {
    pub fn new(series: impl Into<String>, date: NaiveDate) -> JournalEntry {
        JournalEntry {
            series: series.into(),
            number: None,
            date,
            text: None,
            reg_date: None,
            author: None,
            lines: Vec::new(),
            correlation: Correlation::stamp(),
            parent_id: None,
            company_id: None,
            org_number: None,
        }
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// Correlation id of the owning document, set at attach time.
    pub fn parent_id(&self) -> Option<u32> {
        self.parent_id
    }

    pub fn company_id(&self) -> Option<&str> {
        self.company_id.as_deref()
    }

    pub fn org_number(&self) -> Option<&OrgNumber> {
        self.org_number.as_ref()
    }

    /// The registration date, falling back to the entry date when none was
    /// recorded. This is the inherited default for line dates.
    pub fn reg_date_effective(&self) -> NaiveDate {
        self.reg_date.unwrap_or(self.date)
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [JournalLine] {
        &mut self.lines
    }

    /// Attach a line: stamp it with the current propagated context, and
    /// default its date to the entry's registration date when unset.
    pub fn push_line(&mut self, mut line: JournalLine) {
        if line.date.is_none() {
            line.date = Some(self.reg_date_effective());
        }
        self.contextualize(&mut line);
        self.lines.push(line);
    }

    /// Re-apply the entry's context to every attached line. Call after
    /// mutating series, number, company id or organization number. Line
    /// dates are left alone: they default only at attach time.
    pub fn repropagate(&mut self) {
        let entry_id = self.correlation.id;
        let series = self.series.clone();
        let number = self.number.clone();
        let company_id = self.company_id.clone();
        let org_number = self.org_number.clone();
        for line in &mut self.lines {
            line.parent_id = Some(entry_id);
            line.series = Some(series.clone());
            line.entry_number = number.clone();
            line.company_id = company_id.clone();
            line.org_number = org_number.clone();
        }
    }

    pub fn set_series(&mut self, series: impl Into<String>) {
        self.series = series.into();
        self.repropagate();
    }

    pub fn set_number(&mut self, number: Option<String>) {
        self.number = number;
        self.repropagate();
    }

    pub(crate) fn apply_document_context(
        &mut self,
        parent_id: u32,
        company_id: Option<String>,
        org_number: Option<OrgNumber>,
    ) {
        self.parent_id = Some(parent_id);
        self.company_id = company_id;
        self.org_number = org_number;
        self.repropagate();
    }

    fn contextualize(&self, line: &mut JournalLine) {
        line.parent_id = Some(self.correlation.id);
        line.series = Some(self.series.clone());
        line.entry_number = self.number.clone();
        line.company_id = self.company_id.clone();
        line.org_number = self.org_number.clone();
    }
}

impl PartialEq for JournalEntry {
    fn eq(&self, other: &JournalEntry) -> bool {
        self.series == other.series
            && self.number == other.number
            && self.date == other.date
            && self.text == other.text
            && self.reg_date == other.reg_date
            && self.author == other.author
            && self.lines == other.lines
    }
}
