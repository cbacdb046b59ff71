use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::error::ClassifyError;

/// Supported training algorithms and their stable numeric codes.
///
/// The codes are part of the persisted model header, so they must never be
/// renumbered. `0x05` is intentionally unused.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmId {
    Unassigned,
    NaiveBayes,
    MaxEnt,
    DecisionTree,
    C45,
    BalancedWinnow,
    RankMaxEnt,
    NaiveBayesEm,
    MaxEntGe,
    McMaxEnt,
}

impl AlgorithmId {
    /// Every real algorithm, in code order.
    pub const ALL: [AlgorithmId; 9] = [
        AlgorithmId::NaiveBayes,
        AlgorithmId::MaxEnt,
        AlgorithmId::DecisionTree,
        AlgorithmId::C45,
        AlgorithmId::BalancedWinnow,
        AlgorithmId::RankMaxEnt,
        AlgorithmId::NaiveBayesEm,
        AlgorithmId::MaxEntGe,
        AlgorithmId::McMaxEnt,
    ];

    pub fn code(self) -> u8 {
        match self {
            AlgorithmId::Unassigned => 0x00,
            AlgorithmId::NaiveBayes => 0x01,
            AlgorithmId::MaxEnt => 0x02,
            AlgorithmId::DecisionTree => 0x03,
            AlgorithmId::C45 => 0x04,
            AlgorithmId::BalancedWinnow => 0x06,
            AlgorithmId::RankMaxEnt => 0x07,
            AlgorithmId::NaiveBayesEm => 0x08,
            AlgorithmId::MaxEntGe => 0x09,
            AlgorithmId::McMaxEnt => 0x0A,
        }
    }

    pub fn is_assigned(self) -> bool {
        self != AlgorithmId::Unassigned
    }

    /// Only the NaiveBayes family can absorb new data without retraining.
    pub fn supports_incremental(self) -> bool {
        self == AlgorithmId::NaiveBayes
    }

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::Unassigned => "Unassigned",
            AlgorithmId::NaiveBayes => "NaiveBayes",
            AlgorithmId::MaxEnt => "MaxEnt",
            AlgorithmId::DecisionTree => "DecisionTree",
            AlgorithmId::C45 => "C45",
            AlgorithmId::BalancedWinnow => "BalancedWinnow",
            AlgorithmId::RankMaxEnt => "RankMaxEnt",
            AlgorithmId::NaiveBayesEm => "NaiveBayesEM",
            AlgorithmId::MaxEntGe => "MaxEntGE",
            AlgorithmId::McMaxEnt => "MCMaxEnt",
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for AlgorithmId {
    type Error = ClassifyError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(AlgorithmId::Unassigned),
            0x01 => Ok(AlgorithmId::NaiveBayes),
            0x02 => Ok(AlgorithmId::MaxEnt),
            0x03 => Ok(AlgorithmId::DecisionTree),
            0x04 => Ok(AlgorithmId::C45),
            0x06 => Ok(AlgorithmId::BalancedWinnow),
            0x07 => Ok(AlgorithmId::RankMaxEnt),
            0x08 => Ok(AlgorithmId::NaiveBayesEm),
            0x09 => Ok(AlgorithmId::MaxEntGe),
            0x0A => Ok(AlgorithmId::McMaxEnt),
            _ => Err(ClassifyError::UnknownAlgorithm(format!("{:#04x}", code))),
        }
    }
}

impl FromStr for AlgorithmId {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "naivebayes" | "nb" => Ok(AlgorithmId::NaiveBayes),
            "maxent" => Ok(AlgorithmId::MaxEnt),
            "decisiontree" | "decisiontrees" => Ok(AlgorithmId::DecisionTree),
            "c45" => Ok(AlgorithmId::C45),
            "balancedwinnow" | "winnow" => Ok(AlgorithmId::BalancedWinnow),
            "rankmaxent" => Ok(AlgorithmId::RankMaxEnt),
            "naivebayesem" | "nbem" => Ok(AlgorithmId::NaiveBayesEm),
            "maxentge" => Ok(AlgorithmId::MaxEntGe),
            "mcmaxent" | "multiclassmaxent" => Ok(AlgorithmId::McMaxEnt),
            "unassigned" => Ok(AlgorithmId::Unassigned),
            _ => Err(ClassifyError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hyper-parameters for every training algorithm.
///
/// Loaded from JSON by the CLI; missing fields fall back to the defaults.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AlgorithmParams {
    /// Additive smoothing for NaiveBayes feature counts.
    pub alpha: f64,
    pub em_iterations: usize,
    pub unlabeled_weight: f64,

    pub iterations: usize,
    pub learning_rate: f64,
    pub gaussian_prior_variance: f64,
    pub ge_min_feature_count: usize,
    pub generative_weight: f64,
    pub hyperbolic_slope: f64,
    pub hyperbolic_sharpness: f64,

    pub max_depth: usize,
    pub min_info_gain: f64,
    pub min_leaf_instances: usize,
    pub confidence_factor: f64,

    pub epsilon: f64,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            em_iterations: 10,
            unlabeled_weight: 0.1,
            iterations: 100,
            learning_rate: 0.5,
            gaussian_prior_variance: 1.0,
            ge_min_feature_count: 2,
            generative_weight: 0.1,
            hyperbolic_slope: 0.2,
            hyperbolic_sharpness: 10.0,
            max_depth: 5,
            min_info_gain: 0.001,
            min_leaf_instances: 2,
            confidence_factor: 0.25,
            epsilon: 0.5,
            max_iterations: 30,
            seed: 42,
        }
    }
}
