//! Canonical writer and the KSUMMA accumulator.
//!
//! The document is walked in a fixed section order regardless of how its
//! collections were populated; inside a section, attachment order rules.
//! Optional fields that match their inherited default are suppressed: a
//! registration date equal to the entry date, a line date equal to the
//! entry's registration date, and the author on lines (always).
//! Trailing unset fields are trimmed from each post; an unset field
//! before a set one becomes an empty quoted placeholder.
//!
//! The checksum is computed over values, not output bytes: every field
//! value actually emitted is CP437-encoded and folded into a CRC-32, in
//! emission order and with no separators. Labels, quotes and suppressed
//! fields contribute nothing. It is an advisory integrity stamp, not a
//! tamper-proof digest.

use std::fs;
use std::path::Path;

use crc32fast::Hasher;
use log::debug;

use crate::balance::{BalancePost, ObjectBalancePost, PeriodPost};
use crate::document::Document;
use crate::encoding;
use crate::error::Result;
use crate::journal::JournalEntry;

/// Render the document as canonical SIE4 text (internal encoding). The
/// trailing checksum is appended when requested, or when the parsed
/// input already carried one.
pub fn write(doc: &Document, with_ksumma: bool) -> Result<String> {
    let checksumming = with_ksumma || doc.checksum().is_some();
    let mut emitter = Emitter::new(checksumming);
    emit_document(&mut emitter, doc)?;
    Ok(emitter.finish())
}

/// Render and persist as CP437 bytes; returns the canonical text.
pub fn write_file(doc: &Document, path: &Path, with_ksumma: bool) -> Result<String> {
    let text = write(doc, with_ksumma)?;
    let bytes = encoding::encode(&text)?;
    debug!("writing {} bytes to {}", bytes.len(), path.display());
    fs::write(path, bytes)?;
    Ok(text)
}

/// One outgoing field: a set value, a suppressed/unset slot, or a braced
/// sub-list.
enum Val {
    Set(String),
    Unset,
    List(Vec<String>),
}

fn set(value: impl ToString) -> Val {
    Val::Set(value.to_string())
}

fn opt(value: Option<impl ToString>) -> Val {
    match value {
        Some(v) => Val::Set(v.to_string()),
        None => Val::Unset,
    }
}

fn date(value: chrono::NaiveDate) -> Val {
    Val::Set(value.format("%Y%m%d").to_string())
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '"' | '{' | '}' | '\\'))
}

fn quoted(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Per-call output accumulator: the growing text and, when checksumming,
/// the running CRC-32 over emitted values.
struct Emitter {
    out: String,
    crc: Option<Hasher>,
}

impl Emitter {
    fn new(checksumming: bool) -> Emitter {
        Emitter {
            out: String::new(),
            crc: checksumming.then(Hasher::new),
        }
    }

    fn fold(&mut self, value: &str) -> Result<()> {
        if let Some(hasher) = &mut self.crc {
            hasher.update(&encoding::encode(value)?);
        }
        Ok(())
    }

    fn post(&mut self, label: &str, fields: Vec<Val>) -> Result<()> {
        let mut fields = fields;
        while matches!(fields.last(), Some(Val::Unset)) {
            fields.pop();
        }
        self.out.push_str(label);
        for field in fields {
            self.out.push(' ');
            match field {
                Val::Unset => self.out.push_str("\"\""),
                Val::Set(value) => {
                    self.fold(&value)?;
                    self.out.push_str(&quoted(&value));
                }
                Val::List(items) => {
                    self.out.push('{');
                    for (idx, item) in items.iter().enumerate() {
                        if idx > 0 {
                            self.out.push(' ');
                        }
                        self.fold(item)?;
                        self.out.push_str(&quoted(item));
                    }
                    self.out.push('}');
                }
            }
        }
        self.out.push_str("\r\n");
        Ok(())
    }

    fn raw(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push_str("\r\n");
    }

    fn finish(mut self) -> String {
        if let Some(hasher) = self.crc.take() {
            let value = hasher.finalize();
            self.out.push_str(&format!("#KSUMMA {value}\r\n"));
        }
        self.out
    }
}

fn emit_document(e: &mut Emitter, doc: &Document) -> Result<()> {
    e.post("#FLAGGA", vec![set(doc.flag)])?;
    if e.crc.is_some() {
        e.post("#KSUMMA", vec![])?;
    }

    emit_identification(e, doc)?;
    emit_chart(e, doc)?;
    emit_balances(e, doc)?;
    for entry in doc.entries() {
        emit_entry(e, entry)?;
    }
    Ok(())
}

fn emit_identification(e: &mut Emitter, doc: &Document) -> Result<()> {
    let id = &doc.identification;
    if let Some(program) = &id.program {
        e.post(
            "#PROGRAM",
            vec![set(&program.name), opt(program.version.as_ref())],
        )?;
    }
    e.post("#FORMAT", vec![set("PC8")])?;
    if let Some(generated) = &id.generated {
        e.post(
            "#GEN",
            vec![date(generated.date), opt(generated.author.as_ref())],
        )?;
    }
    e.post("#SIETYP", vec![set(doc.sie_type)])?;
    if let Some(prosa) = &id.prosa {
        e.post("#PROSA", vec![set(prosa)])?;
    }
    if let Some(company_type) = &id.company_type {
        e.post("#FTYP", vec![set(company_type)])?;
    }
    if let Some(company_id) = &id.company_id {
        e.post("#FNR", vec![set(company_id)])?;
    }
    if let Some(org_number) = &id.org_number {
        e.post(
            "#ORGNR",
            vec![set(&org_number.number), opt(org_number.multiple)],
        )?;
    }
    if let Some(industry_code) = &id.industry_code {
        e.post("#BKOD", vec![set(industry_code)])?;
    }
    if let Some(address) = &id.address {
        e.post(
            "#ADRESS",
            vec![
                set(&address.contact),
                set(&address.distribution),
                set(&address.postal),
                set(&address.phone),
            ],
        )?;
    }
    if let Some(company_name) = &id.company_name {
        e.post("#FNAMN", vec![set(company_name)])?;
    }
    for year in &id.fiscal_years {
        e.post(
            "#RAR",
            vec![set(year.index), date(year.start), date(year.end)],
        )?;
    }
    if let Some(tax_year) = id.tax_year {
        e.post("#TAXAR", vec![set(tax_year)])?;
    }
    if let Some(cutoff) = id.cutoff_date {
        e.post("#OMFATTN", vec![date(cutoff)])?;
    }
    if let Some(chart_type) = &id.chart_type {
        e.post("#KPTYP", vec![set(chart_type)])?;
    }
    if let Some(currency) = &id.currency {
        e.post("#VALUTA", vec![set(currency)])?;
    }
    Ok(())
}

fn emit_chart(e: &mut Emitter, doc: &Document) -> Result<()> {
    for account in doc.accounts.values() {
        e.post("#KONTO", vec![set(&account.number), set(&account.name)])?;
        if let Some(kind) = account.kind {
            e.post("#KTYP", vec![set(&account.number), set(kind)])?;
        }
        if let Some(unit) = &account.unit {
            e.post("#ENHET", vec![set(&account.number), set(unit)])?;
        }
    }
    for sru in &doc.sru {
        e.post("#SRU", vec![set(&sru.account), set(&sru.code)])?;
    }
    for dimension in doc.dimensions.values() {
        e.post("#DIM", vec![set(dimension.id), set(&dimension.name)])?;
    }
    for sub in &doc.sub_dimensions {
        e.post(
            "#UNDERDIM",
            vec![set(sub.id), set(&sub.name), set(sub.super_id)],
        )?;
    }
    for object in &doc.objects {
        e.post(
            "#OBJEKT",
            vec![set(object.dimension), set(&object.code), set(&object.name)],
        )?;
    }
    Ok(())
}

fn emit_plain(e: &mut Emitter, label: &str, posts: &[BalancePost]) -> Result<()> {
    for post in posts {
        e.post(
            label,
            vec![
                set(post.year_index),
                set(&post.account),
                set(post.amount),
                opt(post.quantity),
            ],
        )?;
    }
    Ok(())
}

fn emit_object(e: &mut Emitter, label: &str, posts: &[ObjectBalancePost]) -> Result<()> {
    for post in posts {
        e.post(
            label,
            vec![
                set(post.year_index),
                set(&post.account),
                Val::List(vec![
                    post.object.dimension.to_string(),
                    post.object.code.clone(),
                ]),
                set(post.amount),
                opt(post.quantity),
            ],
        )?;
    }
    Ok(())
}

fn emit_period(e: &mut Emitter, label: &str, posts: &[PeriodPost]) -> Result<()> {
    for post in posts {
        let object = match &post.object {
            Some(object) => vec![object.dimension.to_string(), object.code.clone()],
            None => Vec::new(),
        };
        e.post(
            label,
            vec![
                set(post.year_index),
                set(&post.period),
                set(&post.account),
                Val::List(object),
                set(post.amount),
                opt(post.quantity),
            ],
        )?;
    }
    Ok(())
}

fn emit_balances(e: &mut Emitter, doc: &Document) -> Result<()> {
    emit_plain(e, "#IB", &doc.ib)?;
    emit_plain(e, "#UB", &doc.ub)?;
    emit_object(e, "#OIB", &doc.oib)?;
    emit_object(e, "#OUB", &doc.oub)?;
    emit_plain(e, "#RES", &doc.res)?;
    emit_period(e, "#PSALDO", &doc.psaldo)?;
    emit_period(e, "#PBUDGET", &doc.pbudget)
}

fn emit_entry(e: &mut Emitter, entry: &JournalEntry) -> Result<()> {
    // The registration date is suppressed when it equals the entry date.
    let reg_date = entry.reg_date.filter(|d| *d != entry.date).map(date);
    e.post(
        "#VER",
        vec![
            set(&entry.series),
            opt(entry.number.as_ref()),
            date(entry.date),
            opt(entry.text.as_ref()),
            reg_date.unwrap_or(Val::Unset),
            opt(entry.author.as_ref()),
        ],
    )?;
    e.raw("{");
    let inherited_date = entry.reg_date_effective();
    for line in entry.lines() {
        let mut objects = Vec::with_capacity(line.objects.len() * 2);
        for object in &line.objects {
            objects.push(object.dimension.to_string());
            objects.push(object.code.clone());
        }
        let line_date = line.date.filter(|d| *d != inherited_date).map(date);
        e.post(
            line.kind.wire_label(),
            vec![
                set(&line.account),
                Val::List(objects),
                set(line.amount),
                line_date.unwrap_or(Val::Unset),
                opt(line.text.as_ref()),
                opt(line.quantity),
                // the author on lines is always written empty
                Val::Unset,
            ],
        )?;
    }
    e.raw("}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write;
    use crate::balance::BalancePost;
    use crate::document::Document;
    use crate::journal::{JournalEntry, JournalLine, TransKind};
    use anyhow::Result;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doc_with_entry() -> Document {
        let mut doc = Document::new();
        doc.identification.company_name = Some("Övningsbolaget AB".to_string());
        let mut entry = JournalEntry::new("A", date(2021, 1, 5));
        entry.number = Some("1".to_string());
        entry.text = Some("Kaffebröd".to_string());
        entry.push_line(JournalLine::new(TransKind::Normal, "1910", dec!(-195.00)));
        entry.push_line(JournalLine::new(TransKind::Normal, "6250", dec!(195.00)));
        doc.push_entry(entry);
        doc
    }

    #[test]
    fn emits_canonical_sections_in_order() -> Result<()> {
        let text = write(&doc_with_entry(), false)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#FLAGGA 0");
        assert_eq!(lines[1], "#FORMAT PC8");
        assert_eq!(lines[2], "#SIETYP 4");
        assert_eq!(lines[3], "#FNAMN \"Övningsbolaget AB\"");
        assert_eq!(lines[4], "#VER A 1 20210105 Kaffebröd");
        assert_eq!(lines[5], "{");
        assert_eq!(lines[6], "#TRANS 1910 {} -195.00");
        assert_eq!(lines[7], "#TRANS 6250 {} 195.00");
        assert_eq!(lines[8], "}");
        Ok(())
    }

    #[test]
    fn reg_date_equal_to_entry_date_is_suppressed() -> Result<()> {
        let mut doc = doc_with_entry();
        doc.entries_mut()[0].reg_date = Some(date(2021, 1, 5));
        let text = write(&doc, false)?;
        assert!(text.contains("#VER A 1 20210105 Kaffebröd\r\n"));

        doc.entries_mut()[0].reg_date = Some(date(2021, 1, 10));
        let text = write(&doc, false)?;
        assert!(text.contains("#VER A 1 20210105 Kaffebröd 20210110\r\n"));
        Ok(())
    }

    #[test]
    fn line_author_is_never_written() -> Result<()> {
        let mut doc = doc_with_entry();
        doc.entries_mut()[0].lines_mut()[0].author = Some("MB".to_string());
        let text = write(&doc, false)?;
        assert!(text.contains("#TRANS 1910 {} -195.00\r\n"));
        assert!(!text.contains("MB"));
        Ok(())
    }

    #[test]
    fn interior_unset_fields_become_placeholders() -> Result<()> {
        let mut doc = doc_with_entry();
        {
            let entry = &mut doc.entries_mut()[0];
            entry.text = None;
            entry.reg_date = Some(date(2021, 1, 10));
        }
        let text = write(&doc, false)?;
        assert!(text.contains("#VER A 1 20210105 \"\" 20210110\r\n"));
        Ok(())
    }

    #[test]
    fn ksumma_is_deterministic() -> Result<()> {
        let doc = doc_with_entry();
        let first = write(&doc, true)?;
        let second = write(&doc, true)?;
        assert_eq!(first, second);
        assert!(first.contains("#KSUMMA\r\n"));
        assert!(first.trim_end().lines().last().unwrap().starts_with("#KSUMMA "));
        Ok(())
    }

    #[test]
    fn ksumma_ignores_cross_section_attachment_order() -> Result<()> {
        let mut a = doc_with_entry();
        a.ib.push(BalancePost::new(0, "1910", dec!(100.00)));
        a.ub.push(BalancePost::new(0, "1910", dec!(300.00)));

        // same content, sections populated in the opposite order
        let mut b = doc_with_entry();
        b.ub.push(BalancePost::new(0, "1910", dec!(300.00)));
        b.ib.push(BalancePost::new(0, "1910", dec!(100.00)));

        assert_eq!(ksumma_of(&write(&a, true)?), ksumma_of(&write(&b, true)?));
        Ok(())
    }

    fn ksumma_of(text: &str) -> u32 {
        text.trim_end()
            .lines()
            .last()
            .unwrap()
            .strip_prefix("#KSUMMA ")
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn quoting_escapes_embedded_quotes() -> Result<()> {
        let mut doc = Document::new();
        doc.identification.company_name = Some("Bolag \"X\" AB".to_string());
        let text = write(&doc, false)?;
        assert!(text.contains(r#"#FNAMN "Bolag \"X\" AB""#));
        Ok(())
    }
}
