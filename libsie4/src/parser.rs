//! Parse entrypoints and the grammar state machine.
//!
//! A SIE4 file moves through five phases: flag, identification, chart of
//! accounts, balances, journal. Labels may arrive in any order inside a
//! phase, but a label from an earlier phase is fatal once a later one has
//! been seen. Chart labels (`#KONTO`/`#KTYP`/`#ENHET`, `#DIM` and
//! friends) contribute fields to shared entities, so they accumulate in
//! keyed drafts and materialize exactly once, when the chart phase
//! closes.
//!
//! All parser state lives in per-call builders; nothing is shared between
//! invocations, so independent callers can parse concurrently.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};
use pest::iterators::Pair;
use pest::Parser;

use crate::account::{Account, AccountKind, SruCode};
use crate::dimension::{Dimension, DimensionObject, SubDimension};
use crate::directive::{label_of, line_of, Directive};
use crate::document::Document;
use crate::encoding;
use crate::error::{Result, SieError};

#[derive(Parser)]
#[grammar = "sie4.pest"]
pub struct Sie4Parser;

/// Parse a whole SIE4 file given as already-decoded text.
pub fn parse(input: &str) -> Result<Document> {
    debug!("parsing {} chars of SIE4 text", input.len());
    let mut pairs =
        Sie4Parser::parse(Rule::sie4, input).map_err(|e| SieError::Syntax(Box::new(e)))?;
    let root = pairs.next().expect("the grammar has a single root");

    let mut builder = DocumentBuilder::new();
    for pair in root.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        builder.process(pair)?;
    }
    builder.finish()
}

/// Parse raw file bytes (CP437 on the wire).
pub fn parse_bytes(bytes: &[u8]) -> Result<Document> {
    parse(&encoding::decode(bytes))
}

pub fn parse_file(path: &Path) -> Result<Document> {
    debug!("reading {}", path.display());
    let bytes = fs::read(path)?;
    parse_bytes(&bytes)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Flag,
    Identification,
    Chart,
    Balances,
    Journal,
}

/// Static label→phase membership table.
fn phase_of(label: &str) -> Option<Phase> {
    match label {
        "FLAGGA" => Some(Phase::Flag),
        "PROGRAM" | "FORMAT" | "GEN" | "SIETYP" | "PROSA" | "FTYP" | "FNR" | "ORGNR"
        | "BKOD" | "ADRESS" | "FNAMN" | "RAR" | "TAXAR" | "OMFATTN" | "KPTYP" | "VALUTA" => {
            Some(Phase::Identification)
        }
        "KONTO" | "KTYP" | "ENHET" | "SRU" | "DIM" | "UNDERDIM" | "OBJEKT" => Some(Phase::Chart),
        "IB" | "UB" | "OIB" | "OUB" | "RES" | "PSALDO" | "PBUDGET" => Some(Phase::Balances),
        "VER" | "TRANS" | "RTRANS" | "BTRANS" => Some(Phase::Journal),
        _ => None,
    }
}

#[derive(Default)]
struct AccountDraft {
    name: Option<String>,
    kind: Option<AccountKind>,
    unit: Option<String>,
}

/// Keyed drafts for the chart phase. Several wire labels contribute to
/// one account or dimension; drafts keep first-seen order and are turned
/// into entities in one pass when the phase closes.
#[derive(Default)]
struct ChartBuilder {
    accounts: IndexMap<String, AccountDraft>,
    sru: IndexMap<String, SruCode>,
    dimensions: IndexMap<u32, Dimension>,
    sub_dimensions: IndexMap<u32, SubDimension>,
    objects: Vec<DimensionObject>,
    object_keys: HashSet<(u32, String)>,
}

impl ChartBuilder {
    fn duplicate(entity: &'static str, key: impl ToString, line: usize) -> SieError {
        SieError::DuplicateKey {
            entity,
            key: key.to_string(),
            line,
        }
    }

    fn konto(&mut self, number: String, name: String, line: usize) -> Result<()> {
        let draft = self.accounts.entry(number.clone()).or_default();
        if draft.name.is_some() {
            return Err(Self::duplicate("account", number, line));
        }
        draft.name = Some(name);
        Ok(())
    }

    fn ktyp(&mut self, number: String, kind: AccountKind, line: usize) -> Result<()> {
        let draft = self.accounts.entry(number.clone()).or_default();
        if draft.kind.is_some() {
            return Err(Self::duplicate("account type", number, line));
        }
        draft.kind = Some(kind);
        Ok(())
    }

    fn enhet(&mut self, number: String, unit: String, line: usize) -> Result<()> {
        let draft = self.accounts.entry(number.clone()).or_default();
        if draft.unit.is_some() {
            return Err(Self::duplicate("account unit", number, line));
        }
        draft.unit = Some(unit);
        Ok(())
    }

    fn sru(&mut self, account: String, code: String, line: usize) -> Result<()> {
        if self.sru.contains_key(&account) {
            return Err(Self::duplicate("SRU code", account, line));
        }
        self.sru.insert(account.clone(), SruCode { account, code });
        Ok(())
    }

    fn dim(&mut self, id: u32, name: String, line: usize) -> Result<()> {
        if self.dimensions.contains_key(&id) {
            return Err(Self::duplicate("dimension", id, line));
        }
        self.dimensions.insert(id, Dimension { id, name });
        Ok(())
    }

    fn underdim(&mut self, id: u32, name: String, super_id: u32, line: usize) -> Result<()> {
        if self.sub_dimensions.contains_key(&id) {
            return Err(Self::duplicate("sub-dimension", id, line));
        }
        self.sub_dimensions
            .insert(id, SubDimension { id, name, super_id });
        Ok(())
    }

    fn objekt(&mut self, dimension: u32, code: String, name: String, line: usize) -> Result<()> {
        if !self.object_keys.insert((dimension, code.clone())) {
            return Err(Self::duplicate(
                "dimension object",
                format!("{dimension}/{code}"),
                line,
            ));
        }
        self.objects.push(DimensionObject {
            dimension,
            code,
            name,
        });
        Ok(())
    }

    fn flush_into(self, doc: &mut Document) {
        for (number, draft) in self.accounts {
            doc.insert_account(Account {
                number,
                name: draft.name.unwrap_or_default(),
                kind: draft.kind,
                unit: draft.unit,
            });
        }
        doc.sru.extend(self.sru.into_values());
        for (_, dimension) in self.dimensions {
            doc.insert_dimension(dimension);
        }
        doc.sub_dimensions.extend(self.sub_dimensions.into_values());
        doc.objects.extend(self.objects);
    }
}

/// Per-parse accumulator: the growing document, the current phase, the
/// chart drafts and the `#KSUMMA` bookkeeping.
struct DocumentBuilder {
    doc: Document,
    phase: Phase,
    chart: ChartBuilder,
    chart_flushed: bool,
    ksumma_seen: usize,
    flagga_seen: bool,
}

impl DocumentBuilder {
    fn new() -> DocumentBuilder {
        DocumentBuilder {
            doc: Document::new(),
            phase: Phase::Flag,
            chart: ChartBuilder::default(),
            chart_flushed: false,
            ksumma_seen: 0,
            flagga_seen: false,
        }
    }

    fn process(&mut self, pair: Pair<'_, Rule>) -> Result<()> {
        let label = label_of(&pair);
        let line = line_of(&pair);
        let key = label.trim_start_matches('#').to_string();

        // #KSUMMA is phase-free: counted wherever it appears.
        if key == "KSUMMA" {
            if let Directive::Ksumma(value) = Directive::from_post(pair)? {
                self.ksumma(value);
            }
            return Ok(());
        }

        let Some(phase) = phase_of(&key) else {
            // Posts with unknown labels shall be ignored on import.
            warn!("skipping unknown label {label} at line {line}");
            return Ok(());
        };

        if matches!(key.as_str(), "TRANS" | "RTRANS" | "BTRANS") {
            return Err(SieError::PhaseOrder {
                label,
                line,
                detail: "transaction line outside a #VER block",
            });
        }

        if phase < self.phase {
            return Err(SieError::PhaseOrder {
                label,
                line,
                detail: "its group has already been closed",
            });
        }
        if phase > self.phase {
            self.phase = phase;
        }
        if self.phase > Phase::Chart && !self.chart_flushed {
            self.flush_chart();
        }

        let directive = match pair.as_rule() {
            Rule::ver_block => Directive::from_ver_block(pair)?,
            _ => Directive::from_post(pair)?,
        };
        self.apply(directive, line)
    }

    fn flush_chart(&mut self) {
        let chart = std::mem::take(&mut self.chart);
        chart.flush_into(&mut self.doc);
        self.chart_flushed = true;
    }

    fn ksumma(&mut self, value: Option<u32>) {
        self.ksumma_seen += 1;
        if self.ksumma_seen == 2 {
            if let Some(value) = value {
                self.doc.set_checksum(Some(value));
            }
        }
    }

    fn apply(&mut self, directive: Directive, line: usize) -> Result<()> {
        match directive {
            Directive::Flagga(flag) => {
                self.doc.flag = flag;
                self.flagga_seen = true;
            }
            Directive::Program { name, version } => {
                self.doc.identification.program =
                    Some(crate::document::Program { name, version })
            }
            Directive::Format(format) => {
                if !format.eq_ignore_ascii_case("PC8") {
                    return Err(SieError::Unsupported {
                        what: "text format",
                        expected: "PC8",
                        got: format,
                    });
                }
            }
            Directive::Gen(generated) => self.doc.identification.generated = Some(generated),
            Directive::Sietyp(sie_type) => {
                if sie_type != "4" {
                    return Err(SieError::Unsupported {
                        what: "SIE type",
                        expected: "4",
                        got: sie_type,
                    });
                }
                self.doc.sie_type = crate::document::SIE_TYPE;
            }
            Directive::Prosa(text) => self.doc.identification.prosa = Some(text),
            Directive::Ftyp(company_type) => {
                self.doc.identification.company_type = Some(company_type)
            }
            Directive::Fnr(company_id) => self.doc.identification.company_id = Some(company_id),
            Directive::Orgnr(org_number) => {
                self.doc.identification.org_number = Some(org_number)
            }
            Directive::Bkod(code) => self.doc.identification.industry_code = Some(code),
            Directive::Adress(address) => self.doc.identification.address = Some(address),
            Directive::Fnamn(name) => self.doc.identification.company_name = Some(name),
            Directive::Rar(fiscal_year) => {
                self.doc.identification.fiscal_years.push(fiscal_year)
            }
            Directive::Taxar(year) => self.doc.identification.tax_year = Some(year),
            Directive::Omfattn(date) => self.doc.identification.cutoff_date = Some(date),
            Directive::Kptyp(chart_type) => {
                self.doc.identification.chart_type = Some(chart_type)
            }
            Directive::Valuta(currency) => self.doc.identification.currency = Some(currency),
            Directive::Konto { number, name } => self.chart.konto(number, name, line)?,
            Directive::Ktyp { number, kind } => self.chart.ktyp(number, kind, line)?,
            Directive::Enhet { number, unit } => self.chart.enhet(number, unit, line)?,
            Directive::Sru { account, code } => self.chart.sru(account, code, line)?,
            Directive::Dim { id, name } => self.chart.dim(id, name, line)?,
            Directive::Underdim { id, name, super_id } => {
                self.chart.underdim(id, name, super_id, line)?
            }
            Directive::Objekt {
                dimension,
                code,
                name,
            } => self.chart.objekt(dimension, code, name, line)?,
            Directive::Ib(post) => self.doc.ib.push(post),
            Directive::Ub(post) => self.doc.ub.push(post),
            Directive::Res(post) => self.doc.res.push(post),
            Directive::Oib(post) => self.doc.oib.push(post),
            Directive::Oub(post) => self.doc.oub.push(post),
            Directive::Psaldo(post) => self.doc.psaldo.push(post),
            Directive::Pbudget(post) => self.doc.pbudget.push(post),
            Directive::Ver(entry) => self.doc.push_entry(entry),
            Directive::Ksumma(_) | Directive::Unknown => {}
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document> {
        if !self.chart_flushed {
            self.flush_chart();
        }
        if !self.flagga_seen {
            warn!("no #FLAGGA post in input, keeping flag 0");
        }
        if self.ksumma_seen != 0 && self.ksumma_seen != 2 {
            return Err(SieError::Ksumma {
                count: self.ksumma_seen,
            });
        }
        debug!(
            "parsed document: {} accounts, {} entries",
            self.doc.accounts.len(),
            self.doc.entries().len()
        );
        Ok(self.doc)
    }
}
