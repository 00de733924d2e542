//! Field-by-field reconciliation of bibliographic facts.
//!
//! Facts arrive from four partially-overlapping sources: the file's tag
//! store, text heuristics, the sidecar record, and remote lookups. Each one
//! is merged into the authoritative [`BibRecord`] through
//! [`Reconciler::merge_field`], which applies a strict state order:
//!
//! 1. type normalization (year coercion, DOI scheme folding)
//! 2. equality short-circuit
//! 3. missing-old acceptance
//! 4. missing-new rejection
//! 5. conflict, resolved by the caller-supplied [`Confirm`] policy
//!
//! `keywords` deliberately bypasses all five states: a list-typed value
//! replaces the collection outright, last writer wins. The asymmetry versus
//! every other field is intentional policy, not an accident.

use std::collections::BTreeSet;

use thiserror::Error;

use papershelf_pdf::clean_text;

use crate::record::{BibRecord, Field, FieldValue, Identifier};

/// Outcome of a conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    KeepCurrent,
    AcceptIncoming,
}

/// The confirmation capability.
///
/// Resolves a genuine conflict between two non-empty values, both rendered
/// as strings for presentation. Supplied by the caller so automated contexts
/// can plug in [`KeepCurrent`], [`AcceptIncoming`], or an interactive prompt
/// without touching reconciliation logic. Invoked only for state 5
/// conflicts, never for the short-circuit states. The same capability
/// arbitrates tag-store writes, which is why the subject is a plain label
/// rather than a [`Field`].
pub trait Confirm {
    fn resolve(&self, subject: &str, current: &str, incoming: &str) -> Choice;
}

/// Non-interactive default: existing values win.
pub struct KeepCurrent;

impl Confirm for KeepCurrent {
    fn resolve(&self, _subject: &str, _current: &str, _incoming: &str) -> Choice {
        Choice::KeepCurrent
    }
}

/// Force mode: incoming values always win.
pub struct AcceptIncoming;

impl Confirm for AcceptIncoming {
    fn resolve(&self, _subject: &str, _current: &str, _incoming: &str) -> Choice {
        Choice::AcceptIncoming
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("malformed year value `{0}`")]
    MalformedYear(String),
    #[error("field `{field}` rejects value of this kind")]
    WrongKind { field: Field },
}

/// The reconciliation engine. Stateless apart from the confirmation policy.
pub struct Reconciler<'a> {
    confirm: &'a dyn Confirm,
}

impl<'a> Reconciler<'a> {
    pub fn new(confirm: &'a dyn Confirm) -> Self {
        Self { confirm }
    }

    /// Merge one candidate value into the record, returning the resolved
    /// value. On error the previous value is left intact.
    pub fn merge_field(
        &self,
        record: &mut BibRecord,
        field: Field,
        incoming: FieldValue,
    ) -> Result<FieldValue, MergeError> {
        // Set semantics for keywords: list replaces, no merge, no confirmation.
        if field == Field::Keywords {
            return match incoming {
                FieldValue::Keywords(ks) => {
                    let cleaned: BTreeSet<String> = ks
                        .iter()
                        .map(|k| clean_text(k).trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect();
                    record.keywords = cleaned.into_iter().collect();
                    Ok(record.get(field))
                }
                _ => Err(MergeError::WrongKind { field }),
            };
        }

        // 1. Type normalization.
        let incoming = normalize(field, incoming)?;
        let current = record.get(field);

        // 2. Equality short-circuit (idempotent no-op).
        if values_equal(field, &current, &incoming) {
            return Ok(current);
        }

        // 3. Missing-old acceptance.
        if current.is_unset() {
            record.set(field, incoming);
            return Ok(record.get(field));
        }

        // 4. Missing-new rejection.
        if incoming.is_unset() {
            return Ok(current);
        }

        // 5. Conflict: both present, genuinely different.
        match self
            .confirm
            .resolve(field.name(), &current.render(), &incoming.render())
        {
            Choice::AcceptIncoming => {
                tracing::debug!(%field, old = %current.render(), new = %incoming.render(), "conflict resolved: accept incoming");
                record.set(field, incoming);
                Ok(record.get(field))
            }
            Choice::KeepCurrent => {
                tracing::debug!(%field, "conflict resolved: keep current");
                Ok(current)
            }
        }
    }

    /// Apply [`merge_field`](Self::merge_field) for every present field of
    /// `source`, in natural key order. Per-field errors are logged and
    /// skipped; there is no rollback, since each field merge is
    /// independently safe.
    pub fn merge_record(&self, record: &mut BibRecord, source: &BibRecord) {
        for field in source.present_fields() {
            if let Err(e) = self.merge_field(record, field, source.get(field)) {
                tracing::warn!(%field, error = %e, "skipping field merge");
            }
        }
        record.refresh_id();
    }
}

/// Coerce an incoming value to the field's kind.
///
/// Year text is parsed to an integer, truncating any fractional suffix
/// (`"2019.0"` → 2019); empty text maps to the unset sentinel. Text fields
/// accept a year value by rendering it. A negative or unparseable year is a
/// [`MergeError::MalformedYear`].
fn normalize(field: Field, value: FieldValue) -> Result<FieldValue, MergeError> {
    match (field, value) {
        (Field::Year, FieldValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(FieldValue::Year(0));
            }
            let integral = trimmed.split('.').next().unwrap_or(trimmed);
            match integral.parse::<i32>() {
                Ok(y) if y >= 0 => Ok(FieldValue::Year(y)),
                _ => Err(MergeError::MalformedYear(s)),
            }
        }
        (Field::Year, FieldValue::Year(y)) if y < 0 => {
            Err(MergeError::MalformedYear(y.to_string()))
        }
        (Field::Year, v @ FieldValue::Year(_)) => Ok(v),
        (Field::Year, FieldValue::Keywords(_)) => Err(MergeError::WrongKind { field }),
        (_, FieldValue::Year(y)) => Ok(FieldValue::Text(y.to_string())),
        (_, FieldValue::Keywords(_)) => Err(MergeError::WrongKind { field }),
        (_, v @ FieldValue::Text(_)) => Ok(v),
    }
}

/// Equality after normalization. DOI values compare case-folded and
/// scheme-normalized, so a bare value equals its prefixed form.
fn values_equal(field: Field, a: &FieldValue, b: &FieldValue) -> bool {
    if field == Field::Doi {
        if let (FieldValue::Text(a), FieldValue::Text(b)) = (a, b) {
            return norm_doi(a) == norm_doi(b);
        }
    }
    a == b
}

pub(crate) fn norm_doi(s: &str) -> String {
    match Identifier::parse(s) {
        Some(id) => id.value.to_lowercase(),
        None => s.to_lowercase(),
    }
}
