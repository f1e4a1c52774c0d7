//! Observable option sets keyed by registration.
//!
//! Options are shared as `Rc<Options>` and mutated through `&self`; every
//! change fires [`SignalKind::DataChanged`] on the set's hub so that nodes
//! holding cached contexts can invalidate them.

use crate::observer::{SignalHub, SignalKind};
use crate::registration::{self, ApiKind};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// An option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    /// Binary blob, e.g. embedded profile data.
    Opaque(Vec<u8>),
}

impl OptionValue {
    /// Parse text as integer, then double, then keep it as a string.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            OptionValue::Int(v)
        } else if let Ok(v) = trimmed.parse::<f64>() {
            OptionValue::Double(v)
        } else {
            OptionValue::String(text.to_string())
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Double(v) => write!(f, "{}", v),
            OptionValue::String(v) => f.write_str(v),
            OptionValue::StringList(v) => f.write_str(&v.join(",")),
            OptionValue::Opaque(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Where an option value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSource {
    #[default]
    None,
    /// Module default.
    Filter,
    /// Set from image or device data.
    Data,
    /// Set by the caller.
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub registration: String,
    pub value: OptionValue,
    #[serde(default)]
    pub source: OptionSource,
}

/// Set operations for [`Options::filter`] and [`Options::combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

#[derive(Default)]
pub struct Options {
    entries: RefCell<Vec<OptionEntry>>,
    signals: SignalHub,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = OptionEntry>) -> Self {
        Self {
            entries: RefCell::new(entries.into_iter().collect()),
            signals: SignalHub::new(),
        }
    }

    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<OptionEntry> {
        self.entries.borrow().clone()
    }

    /// Best ranked entry for `pattern`; the first one wins a tie.
    pub fn find(&self, pattern: &str) -> Option<OptionEntry> {
        let entries = self.entries.borrow();
        let mut best: Option<(u32, &OptionEntry)> = None;
        for entry in entries.iter() {
            let rank = registration::rank(&entry.registration, pattern, ApiKind::Any);
            if rank > 0 && best.map_or(true, |(r, _)| rank > r) {
                best = Some((rank, entry));
            }
        }
        best.map(|(_, entry)| entry.clone())
    }

    pub fn find_int(&self, pattern: &str) -> Option<i64> {
        match self.find(pattern)?.value {
            OptionValue::Int(v) => Some(v),
            OptionValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn find_double(&self, pattern: &str) -> Option<f64> {
        match self.find(pattern)?.value {
            OptionValue::Double(v) => Some(v),
            OptionValue::Int(v) => Some(v as f64),
            OptionValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn find_string(&self, pattern: &str) -> Option<String> {
        match self.find(pattern)?.value {
            OptionValue::Opaque(_) => None,
            value => Some(value.to_string()),
        }
    }

    /// Insert or replace the entry with this exact registration.
    ///
    /// Returns `true` and fires DATA_CHANGED when the set actually changed.
    pub fn set(&self, registration: &str, value: OptionValue, source: OptionSource) -> bool {
        let changed = {
            let mut entries = self.entries.borrow_mut();
            match entries.iter_mut().find(|e| e.registration == registration) {
                Some(entry) if entry.value == value => false,
                Some(entry) => {
                    entry.value = value;
                    entry.source = source;
                    true
                }
                None => {
                    entries.push(OptionEntry {
                        registration: registration.to_string(),
                        value,
                        source,
                    });
                    true
                }
            }
        };

        if changed {
            tracing::trace!("Option {} changed", registration);
            let key = registration.to_string();
            self.signals.signal(SignalKind::DataChanged, Some(&key));
        }
        changed
    }

    pub fn set_from_text(&self, registration: &str, text: &str, source: OptionSource) -> bool {
        self.set(registration, OptionValue::from_text(text), source)
    }

    /// Remove the entry with this exact registration.
    pub fn remove(&self, registration: &str) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let before = entries.len();
            entries.retain(|e| e.registration != registration);
            before != entries.len()
        };
        if removed {
            let key = registration.to_string();
            self.signals.signal(SignalKind::DataChanged, Some(&key));
        }
        removed
    }

    /// Select entries by registration pattern into a new set.
    ///
    /// `Intersection` keeps the matching entries, `Difference` and
    /// `SymmetricDifference` keep the others, `Union` keeps everything.
    pub fn filter(&self, pattern: &str, op: BoolOp) -> Options {
        let selected = self.entries.borrow().iter().filter(|entry| {
            let found = registration::rank(&entry.registration, pattern, ApiKind::Any) > 0;
            match op {
                BoolOp::Union => true,
                BoolOp::Intersection => found,
                BoolOp::Difference | BoolOp::SymmetricDifference => !found,
            }
        })
        .cloned()
        .collect::<Vec<_>>();
        Options::from_entries(selected)
    }

    /// Combine two sets. Keys compare by [`registration::rank_key`].
    pub fn combine(&self, other: &Options, op: BoolOp) -> Options {
        let mine = self.entries();
        let theirs = other.entries();
        let has_key = |set: &[OptionEntry], key: &str| {
            set.iter()
                .any(|e| registration::rank_key(&e.registration, key, ApiKind::Any) > 0)
        };

        let mut combined = Vec::new();
        match op {
            BoolOp::Union => {
                combined.extend(mine.iter().cloned());
                combined.extend(
                    theirs
                        .iter()
                        .filter(|e| !has_key(&mine, &e.registration))
                        .cloned(),
                );
            }
            BoolOp::Intersection => {
                combined.extend(
                    mine.iter()
                        .filter(|e| has_key(&theirs, &e.registration))
                        .cloned(),
                );
            }
            BoolOp::Difference => {
                combined.extend(
                    mine.iter()
                        .filter(|e| !has_key(&theirs, &e.registration))
                        .cloned(),
                );
            }
            BoolOp::SymmetricDifference => {
                combined.extend(
                    mine.iter()
                        .filter(|e| !has_key(&theirs, &e.registration))
                        .cloned(),
                );
                combined.extend(
                    theirs
                        .iter()
                        .filter(|e| !has_key(&mine, &e.registration))
                        .cloned(),
                );
            }
        }
        Options::from_entries(combined)
    }

    /// `registration: value` lines, in insertion order.
    pub fn to_text(&self) -> String {
        self.entries
            .borrow()
            .iter()
            .map(|e| format!("{}: {}\n", e.registration, e.value))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.entries.borrow())
    }
}

impl Clone for Options {
    /// Copies the entries; observers stay with the original.
    fn clone(&self) -> Self {
        Options::from_entries(self.entries())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("entries", &*self.entries.borrow())
            .finish()
    }
}
