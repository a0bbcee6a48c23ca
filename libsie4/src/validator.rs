//! Completeness and consistency rules over a populated document.
//!
//! The same rule bodies serve both directions of the interchange; the
//! target decides which sections are mandatory. An export must carry the
//! chart, opening/closing and result balances and at least one fiscal
//! year; an import must carry none of the balance sections and at least
//! one journal entry. The first violation aborts.

use rust_decimal::Decimal;

use crate::balance::{BalancePost, ObjectBalancePost, PeriodPost};
use crate::document::Document;
use crate::error::{Result, SieError};
use crate::journal::TransKind;

/// Which side of the interchange the document is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Import,
    Export,
}

/// Stable validation error codes.
pub mod code {
    pub const COMPANY_NAME_MISSING: u32 = 3101;
    pub const FISCAL_YEAR_MISSING: u32 = 3102;
    pub const FISCAL_YEAR_INDEX: u32 = 3103;
    pub const ACCOUNTS_MISSING: u32 = 3111;
    pub const ACCOUNT_NAME_MISSING: u32 = 3112;
    pub const BALANCES_MISSING: u32 = 3121;
    pub const RESULT_MISSING: u32 = 3122;
    pub const BALANCES_FORBIDDEN: u32 = 3131;
    pub const ENTRIES_MISSING: u32 = 3132;
    pub const POST_ACCOUNT_MISSING: u32 = 3201;
    pub const OBJECT_REF_INCOMPLETE: u32 = 3202;
    pub const PERIOD_MALFORMED: u32 = 3203;
    pub const LINE_ACCOUNT_MISSING: u32 = 3301;
    pub const LINE_OBJECT_INCOMPLETE: u32 = 3302;
    pub const ENTRY_UNBALANCED: u32 = 3303;
}

pub fn validate_export(doc: &Document) -> Result<()> {
    validate(doc, Target::Export)
}

pub fn validate_import(doc: &Document) -> Result<()> {
    validate(doc, Target::Import)
}

pub fn validate(doc: &Document, target: Target) -> Result<()> {
    identification(doc, target)?;
    sections(doc, target)?;
    chart(doc)?;
    balances(doc)?;
    journal(doc)
}

fn missing(code: u32, context: impl Into<String>) -> SieError {
    SieError::Missing {
        code,
        context: context.into(),
    }
}

fn inconsistent(code: u32, context: impl Into<String>) -> SieError {
    SieError::Consistency {
        code,
        context: context.into(),
    }
}

fn identification(doc: &Document, target: Target) -> Result<()> {
    if doc
        .identification
        .company_name
        .as_deref()
        .unwrap_or("")
        .is_empty()
    {
        return Err(missing(code::COMPANY_NAME_MISSING, "company name (#FNAMN)"));
    }
    for (idx, year) in doc.identification.fiscal_years.iter().enumerate() {
        if year.index > 0 {
            return Err(inconsistent(
                code::FISCAL_YEAR_INDEX,
                format!("fiscal year {idx} has index {} > 0", year.index),
            ));
        }
    }
    if target == Target::Export && doc.identification.fiscal_years.is_empty() {
        return Err(missing(code::FISCAL_YEAR_MISSING, "fiscal year (#RAR)"));
    }
    Ok(())
}

fn sections(doc: &Document, target: Target) -> Result<()> {
    let balance_count = doc.ib.len()
        + doc.ub.len()
        + doc.oib.len()
        + doc.oub.len()
        + doc.res.len()
        + doc.psaldo.len()
        + doc.pbudget.len();
    match target {
        Target::Export => {
            if doc.accounts.is_empty() {
                return Err(missing(code::ACCOUNTS_MISSING, "chart of accounts"));
            }
            if doc.ib.is_empty() || doc.ub.is_empty() {
                return Err(missing(
                    code::BALANCES_MISSING,
                    "opening/closing balances (#IB/#UB)",
                ));
            }
            if doc.res.is_empty() {
                return Err(missing(code::RESULT_MISSING, "result balances (#RES)"));
            }
        }
        Target::Import => {
            if balance_count > 0 {
                return Err(inconsistent(
                    code::BALANCES_FORBIDDEN,
                    format!("{balance_count} balance posts present in an import document"),
                ));
            }
            if doc.entries().is_empty() {
                return Err(missing(code::ENTRIES_MISSING, "journal entries (#VER)"));
            }
        }
    }
    Ok(())
}

fn chart(doc: &Document) -> Result<()> {
    for (idx, account) in doc.accounts.values().enumerate() {
        if account.name.is_empty() {
            return Err(missing(
                code::ACCOUNT_NAME_MISSING,
                format!("name of account {} (ordinal {idx})", account.number),
            ));
        }
    }
    Ok(())
}

fn plain_posts(section: &str, posts: &[BalancePost]) -> Result<()> {
    for (idx, post) in posts.iter().enumerate() {
        if post.year_index > 0 {
            return Err(inconsistent(
                code::FISCAL_YEAR_INDEX,
                format!("{section} post {idx} has year index {} > 0", post.year_index),
            ));
        }
        if post.account.is_empty() {
            return Err(missing(
                code::POST_ACCOUNT_MISSING,
                format!("account of {section} post {idx}"),
            ));
        }
    }
    Ok(())
}

fn object_posts(section: &str, posts: &[ObjectBalancePost]) -> Result<()> {
    for (idx, post) in posts.iter().enumerate() {
        if post.year_index > 0 {
            return Err(inconsistent(
                code::FISCAL_YEAR_INDEX,
                format!("{section} post {idx} has year index {} > 0", post.year_index),
            ));
        }
        if post.account.is_empty() {
            return Err(missing(
                code::POST_ACCOUNT_MISSING,
                format!("account of {section} post {idx}"),
            ));
        }
        if !post.object.is_complete() {
            return Err(inconsistent(
                code::OBJECT_REF_INCOMPLETE,
                format!("{section} post {idx} has an incomplete object reference"),
            ));
        }
    }
    Ok(())
}

fn period_posts(section: &str, posts: &[PeriodPost]) -> Result<()> {
    for (idx, post) in posts.iter().enumerate() {
        if post.year_index > 0 {
            return Err(inconsistent(
                code::FISCAL_YEAR_INDEX,
                format!("{section} post {idx} has year index {} > 0", post.year_index),
            ));
        }
        if post.account.is_empty() {
            return Err(missing(
                code::POST_ACCOUNT_MISSING,
                format!("account of {section} post {idx}"),
            ));
        }
        if !post.period_is_valid() {
            return Err(inconsistent(
                code::PERIOD_MALFORMED,
                format!("{section} post {idx} has period `{}'", post.period),
            ));
        }
        if let Some(object) = &post.object {
            if !object.is_complete() {
                return Err(inconsistent(
                    code::OBJECT_REF_INCOMPLETE,
                    format!("{section} post {idx} has an incomplete object reference"),
                ));
            }
        }
    }
    Ok(())
}

fn balances(doc: &Document) -> Result<()> {
    plain_posts("#IB", &doc.ib)?;
    plain_posts("#UB", &doc.ub)?;
    object_posts("#OIB", &doc.oib)?;
    object_posts("#OUB", &doc.oub)?;
    plain_posts("#RES", &doc.res)?;
    period_posts("#PSALDO", &doc.psaldo)?;
    period_posts("#PBUDGET", &doc.pbudget)
}

fn journal(doc: &Document) -> Result<()> {
    for (entry_idx, entry) in doc.entries().iter().enumerate() {
        for (line_idx, line) in entry.lines().iter().enumerate() {
            if line.account.is_empty() {
                return Err(missing(
                    code::LINE_ACCOUNT_MISSING,
                    format!("account of line {line_idx} in entry {entry_idx}"),
                ));
            }
            for object in &line.objects {
                if !object.is_complete() {
                    return Err(inconsistent(
                        code::LINE_OBJECT_INCOMPLETE,
                        format!(
                            "line {line_idx} in entry {entry_idx} has an incomplete object pair"
                        ),
                    ));
                }
            }
        }

        // Added/Removed correction lines are bookkeeping annotations and
        // stay outside the zero-sum rule.
        let sum: Decimal = entry
            .lines()
            .iter()
            .filter(|line| line.kind == TransKind::Normal)
            .map(|line| line.amount)
            .sum();
        if sum != Decimal::ZERO {
            return Err(inconsistent(
                code::ENTRY_UNBALANCED,
                format!(
                    "entry {entry_idx} (series {}, no {}) lines sum to {sum}",
                    entry.series,
                    entry.number.as_deref().unwrap_or("-"),
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{code, validate_export, validate_import, Target};
    use crate::account::Account;
    use crate::balance::BalancePost;
    use crate::document::{Document, FiscalYear};
    use crate::journal::{JournalEntry, JournalLine, TransKind};
    use anyhow::Result;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry_with_amounts(amounts: &[Decimal]) -> JournalEntry {
        let mut entry = JournalEntry::new("A", date(2021, 1, 5));
        entry.number = Some("1".to_string());
        for (idx, amount) in amounts.iter().enumerate() {
            let account = ["1910", "2640", "6250"][idx % 3];
            entry.push_line(JournalLine::new(TransKind::Normal, account, *amount));
        }
        entry
    }

    fn base_doc() -> Document {
        let mut doc = Document::new();
        doc.identification.company_name = Some("Övningsbolaget AB".to_string());
        doc
    }

    fn export_doc() -> Document {
        let mut doc = base_doc();
        doc.identification.fiscal_years.push(FiscalYear {
            index: 0,
            start: date(2021, 1, 1),
            end: date(2021, 12, 31),
        });
        doc.insert_account(Account::new("1910", "Kassa"));
        doc.ib.push(BalancePost::new(0, "1910", dec!(100.00)));
        doc.ub.push(BalancePost::new(0, "1910", dec!(200.00)));
        doc.res.push(BalancePost::new(0, "3010", dec!(-100.00)));
        doc
    }

    #[test]
    fn balanced_entry_is_accepted() -> Result<()> {
        let mut doc = base_doc();
        doc.push_entry(entry_with_amounts(&[
            dec!(-2000.00),
            dec!(400.00),
            dec!(1600.00),
        ]));
        validate_import(&doc)?;
        Ok(())
    }

    #[test]
    fn entry_off_by_one_öre_is_rejected() {
        let mut doc = base_doc();
        doc.push_entry(entry_with_amounts(&[
            dec!(-2000.00),
            dec!(400.00),
            dec!(1599.99),
        ]));
        let err = validate_import(&doc).unwrap_err();
        assert_eq!(err.code(), code::ENTRY_UNBALANCED);
    }

    #[test]
    fn correction_lines_do_not_count_toward_the_sum() -> Result<()> {
        let mut doc = base_doc();
        let mut entry = entry_with_amounts(&[dec!(-100.00), dec!(100.00)]);
        entry.push_line(JournalLine::new(TransKind::Removed, "6250", dec!(55.00)));
        doc.push_entry(entry);
        validate_import(&doc)?;
        Ok(())
    }

    #[test]
    fn import_forbids_balances_export_requires_them() {
        let mut import_doc = base_doc();
        import_doc.push_entry(entry_with_amounts(&[dec!(-1.00), dec!(1.00)]));
        assert!(validate_import(&import_doc).is_ok());

        // the same document fails as an export: no accounts, no balances
        let err = validate_export(&import_doc).unwrap_err();
        assert_eq!(err.code(), code::FISCAL_YEAR_MISSING);

        let mut with_balances = export_doc();
        with_balances.push_entry(entry_with_amounts(&[dec!(-1.00), dec!(1.00)]));
        assert!(validate_export(&with_balances).is_ok());
        let err = validate_import(&with_balances).unwrap_err();
        assert_eq!(err.code(), code::BALANCES_FORBIDDEN);
    }

    #[test]
    fn export_without_balances_gets_the_specific_code() {
        let mut doc = export_doc();
        doc.ib.clear();
        doc.ub.clear();
        let err = validate_export(&doc).unwrap_err();
        assert_eq!(err.code(), code::BALANCES_MISSING);
    }

    #[test]
    fn fiscal_year_index_must_not_be_positive() {
        let mut doc = export_doc();
        doc.identification.fiscal_years.push(FiscalYear {
            index: 1,
            start: date(2022, 1, 1),
            end: date(2022, 12, 31),
        });
        let err = super::validate(&doc, Target::Export).unwrap_err();
        assert_eq!(err.code(), code::FISCAL_YEAR_INDEX);
    }

    #[test]
    fn company_name_is_always_required() {
        let mut doc = export_doc();
        doc.identification.company_name = None;
        let err = validate_export(&doc).unwrap_err();
        assert_eq!(err.code(), code::COMPANY_NAME_MISSING);
    }

    #[test]
    fn incomplete_line_object_pair_is_rejected() {
        let mut doc = base_doc();
        let mut entry = JournalEntry::new("A", date(2021, 1, 5));
        let mut line = JournalLine::new(TransKind::Normal, "1910", dec!(0.00));
        line.objects.push(crate::dimension::ObjectRef::new(0, "12"));
        entry.push_line(line);
        doc.push_entry(entry);
        let err = validate_import(&doc).unwrap_err();
        assert_eq!(err.code(), code::LINE_OBJECT_INCOMPLETE);
    }
}
