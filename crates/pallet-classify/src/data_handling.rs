//! Labeled datasets handed to the training strategies.
//!
//! An `InstanceList` pairs a feature `Alphabet` and a label `Alphabet` with
//! sparse instances. The training coordinator never looks inside; only the
//! algorithms in `models` do.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifyError, Result};

/// Bidirectional mapping between entry names and dense indices.
///
/// Serialized as its ordered entry list so encodings stay deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Alphabet {
    entries: Vec<String>,
    index: HashMap<String, usize>,
}

impl Alphabet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `entry`, adding it when unseen.
    pub fn lookup_or_insert(&mut self, entry: &str) -> usize {
        if let Some(&idx) = self.index.get(entry) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(entry.to_string());
        self.index.insert(entry.to_string(), idx);
        idx
    }

    pub fn lookup(&self, entry: &str) -> Option<usize> {
        self.index.get(entry).copied()
    }

    pub fn entry(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// False when the entry list repeats a name, which only a decoded alphabet can do.
    pub fn has_unique_entries(&self) -> bool {
        self.index.len() == self.entries.len()
    }
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl From<Vec<String>> for Alphabet {
    fn from(entries: Vec<String>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), i))
            .collect();
        Alphabet { entries, index }
    }
}

impl From<Alphabet> for Vec<String> {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.entries
    }
}

/// One training example: sparse features sorted by index and an optional label.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub name: String,
    pub features: Vec<(usize, f64)>,
    pub label: Option<usize>,
}

impl Instance {
    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    pub fn total_weight(&self) -> f64 {
        self.features.iter().map(|&(_, v)| v).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceList {
    data_alphabet: Alphabet,
    target_alphabet: Alphabet,
    instances: Vec<Instance>,
}

impl InstanceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance built from named feature values.
    ///
    /// Repeated feature names are summed; non-positive or non-finite values are dropped.
    pub fn push_features(&mut self, name: &str, label: Option<&str>, features: &[(&str, f64)]) {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for &(feature, value) in features {
            if !value.is_finite() || value <= 0.0 {
                continue;
            }
            let idx = self.data_alphabet.lookup_or_insert(feature);
            *merged.entry(idx).or_insert(0.0) += value;
        }
        let label = label.map(|l| self.target_alphabet.lookup_or_insert(l));
        self.instances.push(Instance {
            name: name.to_string(),
            features: merged.into_iter().collect(),
            label,
        });
    }

    /// Adds a bag-of-words instance from raw text.
    pub fn push_text(&mut self, name: &str, label: Option<&str>, text: &str) {
        let tokens = tokenize(text);
        let features: Vec<(&str, f64)> = tokens.iter().map(|t| (t.as_str(), 1.0)).collect();
        self.push_features(name, label, &features);
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    pub fn labeled(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| i.is_labeled())
    }

    pub fn unlabeled(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| !i.is_labeled())
    }

    pub fn num_labeled(&self) -> usize {
        self.labeled().count()
    }

    pub fn data_alphabet(&self) -> &Alphabet {
        &self.data_alphabet
    }

    pub fn target_alphabet(&self) -> &Alphabet {
        &self.target_alphabet
    }

    pub fn num_features(&self) -> usize {
        self.data_alphabet.len()
    }

    pub fn num_labels(&self) -> usize {
        self.target_alphabet.len()
    }

    /// Feature values of an instance keyed by feature name.
    pub fn named_features<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        instance
            .features
            .iter()
            .filter_map(move |&(idx, v)| self.data_alphabet.entry(idx).map(|name| (name, v)))
    }

    pub fn label_name(&self, instance: &Instance) -> Option<&str> {
        instance.label.and_then(|l| self.target_alphabet.entry(l))
    }

    pub fn log_summary(&self) {
        log::debug!(
            "Dataset: {} instances ({} labeled), {} features, {} labels",
            self.len(),
            self.num_labeled(),
            self.num_features(),
            self.num_labels()
        );
    }
}

/// Lowercased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Reads a `.tsv` or `.csv` file with `label` and `text` columns (and an optional `name`).
///
/// Rows with an empty label are kept as unlabeled instances.
pub fn read_labeled_text<P: AsRef<Path>>(path: P) -> Result<InstanceList> {
    let path = path.as_ref();
    let delimiter = match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("tsv") => b'\t',
        Some("csv") => b',',
        _ => {
            return Err(ClassifyError::InvalidDataset(format!(
                "File must have a .tsv or .csv extension: {}",
                path.display()
            )))
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ClassifyError::InvalidDataset(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| ClassifyError::InvalidDataset(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let label_col = column("label")
        .ok_or_else(|| ClassifyError::InvalidDataset("missing 'label' column".to_string()))?;
    let text_col = column("text")
        .ok_or_else(|| ClassifyError::InvalidDataset("missing 'text' column".to_string()))?;
    let name_col = column("name");

    let mut list = InstanceList::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ClassifyError::InvalidDataset(e.to_string()))?;
        let label = record.get(label_col).map(str::trim).filter(|l| !l.is_empty());
        let text = record.get(text_col).unwrap_or("");
        let name = name_col
            .and_then(|c| record.get(c))
            .map(str::to_string)
            .unwrap_or_else(|| format!("row_{}", row + 1));
        list.push_text(&name, label, text);
    }

    log::info!("Loaded {} instances from {}", list.len(), path.display());
    list.log_summary();
    Ok(list)
}
