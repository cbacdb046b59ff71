use crate::data_handling::{Alphabet, Instance, InstanceList};
use crate::error::{ClassifyError, Result};

pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Turns log-scores into a probability distribution in place.
pub fn softmax_in_place(scores: &mut [f64]) {
    let lse = log_sum_exp(scores);
    for s in scores.iter_mut() {
        *s = (*s - lse).exp();
    }
}

/// Scales non-negative scores so they sum to one; uniform when they sum to zero.
pub fn normalize_in_place(scores: &mut [f64]) {
    let total: f64 = scores.iter().sum();
    if total > 0.0 && total.is_finite() {
        for s in scores.iter_mut() {
            *s /= total;
        }
    } else if !scores.is_empty() {
        let uniform = 1.0 / scores.len() as f64;
        scores.iter_mut().for_each(|s| *s = uniform);
    }
}

/// Shannon entropy (bits) of a count distribution.
pub fn entropy(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            -p * p.log2()
        })
        .sum()
}

pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Re-indexes an instance's features into `alphabet`, adding unseen names.
pub fn remap_features(
    alphabet: &mut Alphabet,
    list: &InstanceList,
    instance: &Instance,
) -> Vec<(usize, f64)> {
    let mut features: Vec<(usize, f64)> = list
        .named_features(instance)
        .map(|(name, v)| (alphabet.lookup_or_insert(name), v))
        .collect();
    features.sort_by_key(|&(i, _)| i);
    features
}

/// Fails when a dataset carries nothing a supervised trainer can learn from.
pub fn require_labeled(list: &InstanceList, trainer: &str) -> Result<()> {
    if list.num_labeled() == 0 || list.num_labels() == 0 {
        return Err(ClassifyError::TrainingFailed(format!(
            "{} needs at least one labeled instance",
            trainer
        )));
    }
    let skipped = list.len() - list.num_labeled();
    if skipped > 0 {
        log::warn!("{} ignores {} unlabeled instances", trainer, skipped);
    }
    Ok(())
}

/// Fails with `InvalidModel` unless a decoded dimension matches what its alphabets imply.
pub fn check_dim(what: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(ClassifyError::InvalidModel(format!(
            "{} has {} entries, expected {}",
            what, found, expected
        )));
    }
    Ok(())
}

pub fn check_alphabet(what: &str, alphabet: &Alphabet) -> Result<()> {
    if !alphabet.has_unique_entries() {
        return Err(ClassifyError::InvalidModel(format!(
            "{} alphabet repeats an entry",
            what
        )));
    }
    Ok(())
}
