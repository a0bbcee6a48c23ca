//! Typed wire posts.
//!
//! A tokenized line is a label plus a sequence of fields; this module
//! turns one pest pair into a [`Directive`], enforcing each label's
//! required arity and field types. Phase ordering is not checked here,
//! that is the parser's job.

use chrono::NaiveDate;
use pest::iterators::Pair;
use rust_decimal::Decimal;

use crate::account::AccountKind;
use crate::balance::{BalancePost, ObjectBalancePost, PeriodPost};
use crate::dimension::ObjectRef;
use crate::document::{Address, FiscalYear, Generated, OrgNumber};
use crate::error::{Result, SieError};
use crate::journal::{JournalEntry, JournalLine, TransKind};
use crate::parser::Rule;

/// Code for a field that is present but cannot be read as its type.
pub(crate) const CODE_MALFORMED_FIELD: u32 = 1009;

#[derive(Debug, PartialEq)]
pub(crate) enum Directive {
    Flagga(u8),
    /// `None` is the bare marker after `#FLAGGA`; `Some` carries the
    /// stored checksum of the trailing post.
    Ksumma(Option<u32>),
    Program { name: String, version: Option<String> },
    Format(String),
    Gen(Generated),
    Sietyp(String),
    Prosa(String),
    Ftyp(String),
    Fnr(String),
    Orgnr(OrgNumber),
    Bkod(String),
    Adress(Address),
    Fnamn(String),
    Rar(FiscalYear),
    Taxar(i32),
    Omfattn(NaiveDate),
    Kptyp(String),
    Valuta(String),
    Konto { number: String, name: String },
    Ktyp { number: String, kind: AccountKind },
    Enhet { number: String, unit: String },
    Sru { account: String, code: String },
    Dim { id: u32, name: String },
    Underdim { id: u32, name: String, super_id: u32 },
    Objekt { dimension: u32, code: String, name: String },
    Ib(BalancePost),
    Ub(BalancePost),
    Res(BalancePost),
    Oib(ObjectBalancePost),
    Oub(ObjectBalancePost),
    Psaldo(PeriodPost),
    Pbudget(PeriodPost),
    Ver(JournalEntry),
    Unknown,
}

/// A materialized field: plain text, or a braced sub-list.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Field {
    Text(String),
    List(Vec<String>),
}

pub(crate) fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

/// Normalized label of a post pair (uppercased, `#` kept), e.g. `#KONTO`.
pub(crate) fn label_of(pair: &Pair<Rule>) -> String {
    let inner = match pair.as_rule() {
        Rule::ver_block => return "#VER".to_string(),
        _ => pair.clone().into_inner().next(),
    };
    inner
        .map(|p| p.as_str().to_ascii_uppercase())
        .unwrap_or_default()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn text_value(pair: Pair<Rule>) -> String {
    match pair.as_rule() {
        Rule::bare => pair.as_str().to_string(),
        Rule::quoted => unescape(pair.into_inner().next().map(|p| p.as_str()).unwrap_or("")),
        _ => unreachable!("field token expected"),
    }
}

fn field_value(pair: Pair<Rule>) -> Field {
    match pair.as_rule() {
        Rule::object_list => Field::List(pair.into_inner().map(text_value).collect()),
        _ => Field::Text(text_value(pair)),
    }
}

/// Field cursor over one post, producing typed values and arity errors
/// that name the offending label and line.
pub(crate) struct Cursor {
    label: String,
    line: usize,
    fields: std::iter::Peekable<std::vec::IntoIter<Field>>,
}

impl Cursor {
    pub(crate) fn from_post(pair: Pair<Rule>) -> Cursor {
        let line = line_of(&pair);
        let label = label_of(&pair);
        let fields: Vec<Field> = pair
            .into_inner()
            .skip(1)
            .map(field_value)
            .collect::<Vec<_>>();
        Cursor {
            label,
            line,
            fields: fields.into_iter().peekable(),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    fn arity(&self) -> SieError {
        SieError::Arity {
            label: self.label.clone(),
            line: self.line,
        }
    }

    fn malformed(&self, what: &str, got: &str) -> SieError {
        SieError::Consistency {
            code: CODE_MALFORMED_FIELD,
            context: format!(
                "malformed {what} `{got}' for {} at line {}",
                self.label, self.line
            ),
        }
    }

    pub(crate) fn req_text(&mut self) -> Result<String> {
        match self.fields.next() {
            Some(Field::Text(s)) => Ok(s),
            Some(Field::List(_)) => Err(self.malformed("text field", "{...}")),
            None => Err(self.arity()),
        }
    }

    /// Next field as text; absent or empty means unset.
    pub(crate) fn opt_text(&mut self) -> Option<String> {
        match self.fields.peek() {
            Some(Field::Text(_)) => match self.fields.next() {
                Some(Field::Text(s)) if !s.is_empty() => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn req_date(&mut self) -> Result<NaiveDate> {
        let raw = self.req_text()?;
        NaiveDate::parse_from_str(&raw, "%Y%m%d").map_err(|_| self.malformed("date", &raw))
    }

    pub(crate) fn opt_date(&mut self) -> Result<Option<NaiveDate>> {
        match self.opt_text() {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y%m%d")
                .map(Some)
                .map_err(|_| self.malformed("date", &raw)),
        }
    }

    pub(crate) fn req_i32(&mut self) -> Result<i32> {
        let raw = self.req_text()?;
        raw.parse().map_err(|_| self.malformed("integer", &raw))
    }

    pub(crate) fn req_u32(&mut self) -> Result<u32> {
        let raw = self.req_text()?;
        raw.parse().map_err(|_| self.malformed("number", &raw))
    }

    pub(crate) fn opt_i32(&mut self) -> Result<Option<i32>> {
        match self.opt_text() {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| self.malformed("integer", &raw)),
        }
    }

    pub(crate) fn req_amount(&mut self) -> Result<Decimal> {
        let raw = self.req_text()?;
        raw.parse().map_err(|_| self.malformed("amount", &raw))
    }

    pub(crate) fn opt_amount(&mut self) -> Result<Option<Decimal>> {
        match self.opt_text() {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| self.malformed("amount", &raw)),
        }
    }

    /// Next field as a braced sub-list, if one is there.
    pub(crate) fn opt_list(&mut self) -> Option<Vec<String>> {
        match self.fields.peek() {
            Some(Field::List(_)) => match self.fields.next() {
                Some(Field::List(items)) => Some(items),
                _ => unreachable!(),
            },
            _ => None,
        }
    }

    pub(crate) fn req_list(&mut self) -> Result<Vec<String>> {
        match self.fields.next() {
            Some(Field::List(items)) => Ok(items),
            Some(Field::Text(_)) | None => Err(self.arity()),
        }
    }

    /// Interpret sub-list items as `(dimension, object code)` pairs.
    pub(crate) fn object_pairs(&mut self, items: Vec<String>) -> Result<Vec<ObjectRef>> {
        if items.len() % 2 != 0 {
            return Err(SieError::Consistency {
                code: CODE_MALFORMED_FIELD,
                context: format!(
                    "incomplete object pair in {} at line {}",
                    self.label, self.line
                ),
            });
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(dim), Some(code)) = (iter.next(), iter.next()) {
            let dimension = dim.parse().map_err(|_| self.malformed("dimension", &dim))?;
            pairs.push(ObjectRef { dimension, code });
        }
        Ok(pairs)
    }

    fn single_object(&mut self, items: Vec<String>) -> Result<ObjectRef> {
        let mut pairs = self.object_pairs(items)?;
        if pairs.len() != 1 {
            return Err(SieError::Consistency {
                code: CODE_MALFORMED_FIELD,
                context: format!(
                    "expected one object reference in {} at line {}",
                    self.label, self.line
                ),
            });
        }
        Ok(pairs.remove(0))
    }
}

impl Directive {
    /// Build a typed directive from a plain post pair (`Rule::post`).
    pub(crate) fn from_post(pair: Pair<Rule>) -> Result<Directive> {
        let mut c = Cursor::from_post(pair);
        let key = c.label().trim_start_matches('#').to_string();
        let directive = match key.as_str() {
            "FLAGGA" => {
                let raw = c.req_text()?;
                match raw.as_str() {
                    "0" => Directive::Flagga(0),
                    "1" => Directive::Flagga(1),
                    _ => return Err(c.malformed("flag", &raw)),
                }
            }
            "KSUMMA" => match c.opt_text() {
                None => Directive::Ksumma(None),
                Some(raw) => Directive::Ksumma(Some(
                    raw.parse().map_err(|_| c.malformed("checksum", &raw))?,
                )),
            },
            "PROGRAM" => Directive::Program {
                name: c.req_text()?,
                version: c.opt_text(),
            },
            "FORMAT" => Directive::Format(c.req_text()?),
            "GEN" => Directive::Gen(Generated {
                date: c.req_date()?,
                author: c.opt_text(),
            }),
            "SIETYP" => Directive::Sietyp(c.req_text()?),
            "PROSA" => Directive::Prosa(c.req_text()?),
            "FTYP" => Directive::Ftyp(c.req_text()?),
            "FNR" => Directive::Fnr(c.req_text()?),
            "ORGNR" => Directive::Orgnr(OrgNumber {
                number: c.req_text()?,
                multiple: c.opt_i32()?,
            }),
            "BKOD" => Directive::Bkod(c.req_text()?),
            "ADRESS" => Directive::Adress(Address {
                contact: c.req_text()?,
                distribution: c.req_text()?,
                postal: c.req_text()?,
                phone: c.req_text()?,
            }),
            "FNAMN" => Directive::Fnamn(c.req_text()?),
            "RAR" => Directive::Rar(FiscalYear {
                index: c.req_i32()?,
                start: c.req_date()?,
                end: c.req_date()?,
            }),
            "TAXAR" => Directive::Taxar(c.req_i32()?),
            "OMFATTN" => Directive::Omfattn(c.req_date()?),
            "KPTYP" => Directive::Kptyp(c.req_text()?),
            "VALUTA" => Directive::Valuta(c.req_text()?),
            "KONTO" => Directive::Konto {
                number: c.req_text()?,
                name: c.req_text()?,
            },
            "KTYP" => {
                let number = c.req_text()?;
                let raw = c.req_text()?;
                let kind = AccountKind::from_wire_letter(&raw)
                    .ok_or_else(|| c.malformed("account type", &raw))?;
                Directive::Ktyp { number, kind }
            }
            "ENHET" => Directive::Enhet {
                number: c.req_text()?,
                unit: c.req_text()?,
            },
            "SRU" => Directive::Sru {
                account: c.req_text()?,
                code: c.req_text()?,
            },
            "DIM" => Directive::Dim {
                id: c.req_u32()?,
                name: c.req_text()?,
            },
            "UNDERDIM" => Directive::Underdim {
                id: c.req_u32()?,
                name: c.req_text()?,
                super_id: c.req_u32()?,
            },
            "OBJEKT" => Directive::Objekt {
                dimension: c.req_u32()?,
                code: c.req_text()?,
                name: c.req_text()?,
            },
            "IB" => Directive::Ib(plain_post(&mut c)?),
            "UB" => Directive::Ub(plain_post(&mut c)?),
            "RES" => Directive::Res(plain_post(&mut c)?),
            "OIB" => Directive::Oib(object_post(&mut c)?),
            "OUB" => Directive::Oub(object_post(&mut c)?),
            "PSALDO" => Directive::Psaldo(period_post(&mut c)?),
            "PBUDGET" => Directive::Pbudget(period_post(&mut c)?),
            // A #VER without a braced block: an entry with no lines.
            "VER" => Directive::Ver(ver_header(&mut c)?),
            _ => Directive::Unknown,
        };
        Ok(directive)
    }

    /// Build a journal entry from a `Rule::ver_block` pair.
    pub(crate) fn from_ver_block(pair: Pair<Rule>) -> Result<Directive> {
        let mut inner = pair.into_inner();
        let header = inner.next().expect("ver_block starts with its header");
        let mut entry = ver_header(&mut Cursor::from_post(header))?;
        for trans in inner {
            let mut c = Cursor::from_post(trans);
            let kind = TransKind::from_label(c.label()).expect("trans label family");
            let account = c.req_text()?;
            let objects = match c.opt_list() {
                Some(items) => c.object_pairs(items)?,
                None => Vec::new(),
            };
            let mut line = JournalLine::new(kind, account, c.req_amount()?);
            line.objects = objects;
            line.date = c.opt_date()?;
            line.text = c.opt_text();
            line.quantity = c.opt_amount()?;
            line.author = c.opt_text();
            entry.push_line(line);
        }
        Ok(Directive::Ver(entry))
    }
}

fn ver_header(c: &mut Cursor) -> Result<JournalEntry> {
    let series = c.req_text()?;
    let number = c.opt_text();
    let date = c.req_date()?;
    let mut entry = JournalEntry::new(series, date);
    entry.number = number;
    entry.text = c.opt_text();
    entry.reg_date = c.opt_date()?;
    entry.author = c.opt_text();
    Ok(entry)
}

fn plain_post(c: &mut Cursor) -> Result<BalancePost> {
    Ok(BalancePost {
        year_index: c.req_i32()?,
        account: c.req_text()?,
        amount: c.req_amount()?,
        quantity: c.opt_amount()?,
    })
}

fn object_post(c: &mut Cursor) -> Result<ObjectBalancePost> {
    let year_index = c.req_i32()?;
    let account = c.req_text()?;
    let items = c.req_list()?;
    let object = c.single_object(items)?;
    Ok(ObjectBalancePost {
        year_index,
        account,
        object,
        amount: c.req_amount()?,
        quantity: c.opt_amount()?,
    })
}

fn period_post(c: &mut Cursor) -> Result<PeriodPost> {
    let year_index = c.req_i32()?;
    let period = c.req_text()?;
    let account = c.req_text()?;
    let object = match c.opt_list() {
        Some(items) if items.is_empty() => None,
        Some(items) => Some(c.single_object(items)?),
        None => None,
    };
    Ok(PeriodPost {
        year_index,
        period,
        account,
        object,
        amount: c.req_amount()?,
        quantity: c.opt_amount()?,
    })
}

#[cfg(test)]
mod tests {
    use super::Directive;
    use crate::account::AccountKind;
    use crate::parser::{Rule, Sie4Parser};
    use anyhow::{anyhow, Result};
    use pest::Parser;
    use rust_decimal_macros::dec;

    fn first_post(input: &str) -> Result<pest::iterators::Pair<'_, Rule>> {
        let mut pairs = Sie4Parser::parse(Rule::post, input)?;
        pairs.next().ok_or(anyhow!("empty parse"))
    }

    #[test]
    fn parse_konto() -> Result<()> {
        let pair = first_post(r#"#KONTO 1910 "Kassa""#)?;
        assert_eq!(
            Directive::from_post(pair)?,
            Directive::Konto {
                number: "1910".to_string(),
                name: "Kassa".to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn parse_ktyp_rejects_unknown_letter() -> Result<()> {
        let pair = first_post("#KTYP 1910 Q")?;
        let err = Directive::from_post(pair).unwrap_err();
        assert_eq!(err.code(), 1009);
        Ok(())
    }

    #[test]
    fn quoted_fields_unescape() -> Result<()> {
        let pair = first_post(r#"#FNAMN "Skattkammar\"ön\" AB""#)?;
        assert_eq!(
            Directive::from_post(pair)?,
            Directive::Fnamn("Skattkammar\"ön\" AB".to_string())
        );
        Ok(())
    }

    #[test]
    fn unterminated_quote_runs_to_line_end() -> Result<()> {
        let pair = first_post("#PROSA \"no closing quote")?;
        assert_eq!(
            Directive::from_post(pair)?,
            Directive::Prosa("no closing quote".to_string())
        );
        Ok(())
    }

    #[test]
    fn missing_fields_are_arity_errors() -> Result<()> {
        let pair = first_post("#KONTO 1910")?;
        let err = Directive::from_post(pair).unwrap_err();
        assert_eq!(err.code(), 1002);
        assert_eq!(
            format!("{}", err),
            "too few fields for #KONTO at line 1"
        );
        Ok(())
    }

    #[test]
    fn parse_object_balance() -> Result<()> {
        let pair = first_post(r#"#OIB 0 1910 {1 "12"} 1500.00"#)?;
        match Directive::from_post(pair)? {
            Directive::Oib(post) => {
                assert_eq!(post.year_index, 0);
                assert_eq!(post.object.dimension, 1);
                assert_eq!(post.object.code, "12");
                assert_eq!(post.amount, dec!(1500.00));
            }
            other => return Err(anyhow!("unexpected directive: {other:?}")),
        }
        Ok(())
    }

    #[test]
    fn parse_psaldo_with_empty_object_list() -> Result<()> {
        let pair = first_post("#PSALDO 0 202101 3010 {} -1000.00")?;
        match Directive::from_post(pair)? {
            Directive::Psaldo(post) => {
                assert_eq!(post.period, "202101");
                assert_eq!(post.object, None);
                assert_eq!(post.amount, dec!(-1000.00));
            }
            other => return Err(anyhow!("unexpected directive: {other:?}")),
        }
        Ok(())
    }

    #[test]
    fn incomplete_object_pair_is_rejected() -> Result<()> {
        let pair = first_post("#OIB 0 1910 {1} 1500.00")?;
        let err = Directive::from_post(pair).unwrap_err();
        assert_eq!(err.code(), 1009);
        Ok(())
    }

    #[test]
    fn parse_ktyp() -> Result<()> {
        let pair = first_post("#KTYP 1910 T")?;
        assert_eq!(
            Directive::from_post(pair)?,
            Directive::Ktyp {
                number: "1910".to_string(),
                kind: AccountKind::Asset,
            }
        );
        Ok(())
    }

    #[test]
    fn field_materialization_keeps_empty_quoted_fields() -> Result<()> {
        let pair = first_post(r#"#VER A "" 20210105"#)?;
        let mut cursor = super::Cursor::from_post(pair);
        assert_eq!(cursor.req_text()?, "A");
        // the empty quoted entry number reads as unset
        assert_eq!(cursor.opt_text(), None);
        assert_eq!(
            cursor.req_date()?,
            chrono::NaiveDate::from_ymd_opt(2021, 1, 5).unwrap()
        );
        Ok(())
    }
}
