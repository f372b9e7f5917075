//! Gradient-boosted tree classifier
//!
//! Binary log-loss boosting with leaf-wise (best-first) tree growth:
//! each round fits a tree to the Newton step of the current margins and the
//! leaf with the largest gain is split next, until `num_leaves` leaves exist.
//! Features are cut into at most `max_bin` quantile bins once per fit, and
//! split search sweeps per-node gradient histograms over those bins.
//! `Goss` boosting keeps the rows with the largest gradients plus a random
//! share of the rest, up-weighting the sampled remainder.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// Row sampling strategy per boosting round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostingType {
    /// Every row in every round
    Gbdt,
    /// Gradient-based one-side sampling
    Goss,
}

impl fmt::Display for BoostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostingType::Gbdt => write!(f, "gbdt"),
            BoostingType::Goss => write!(f, "goss"),
        }
    }
}

impl FromStr for BoostingType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gbdt" => Ok(BoostingType::Gbdt),
            "goss" => Ok(BoostingType::Goss),
            other => Err(PipelineError::ValidationError(format!("Unknown boosting type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Maximum depth per tree, `None` for unlimited
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub boosting_type: BoostingType,
    /// GOSS: share of rows kept by gradient magnitude
    pub top_rate: f64,
    /// GOSS: share of rows sampled from the remainder
    pub other_rate: f64,
    pub colsample_bytree: f64,
    /// Histogram bins per feature; columns with fewer distinct values split exactly
    pub max_bin: usize,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            boosting_type: BoostingType::Gbdt,
            top_rate: 0.2,
            other_rate: 0.1,
            colsample_bytree: 1.0,
            max_bin: 255,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::ValidationError("n_estimators must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PipelineError::ValidationError(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.num_leaves < 2 {
            return Err(PipelineError::ValidationError("num_leaves must be at least 2".into()));
        }
        if !(2..=256).contains(&self.max_bin) {
            return Err(PipelineError::ValidationError(format!(
                "max_bin must be between 2 and 256, got {}",
                self.max_bin
            )));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::ValidationError("max_depth must be at least 1".into()));
        }
        if self.boosting_type == BoostingType::Goss
            && !(self.top_rate > 0.0 && self.other_rate > 0.0 && self.top_rate + self.other_rate <= 1.0)
        {
            return Err(PipelineError::ValidationError(format!(
                "GOSS needs 0 < top_rate, 0 < other_rate and top_rate + other_rate <= 1, got {} and {}",
                self.top_rate, self.other_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum BoostNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                BoostNode::Leaf { value } => return *value,
                BoostNode::Split { feature, threshold, left, right } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda).max(1e-16)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda).max(1e-16)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> BoostNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    BoostNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

/// Quantile bins of every feature, computed once per fit
struct BinnedFeatures {
    /// Ascending cut points per feature; bin `b` holds values `<= thresholds[b]`
    /// and the last bin holds the rest
    thresholds: Vec<Vec<f64>>,
    /// Bin of every row, per feature
    bins: Vec<Vec<u8>>,
}

impl BinnedFeatures {
    fn new(x: &Array2<f64>, max_bin: usize) -> Self {
        let (thresholds, bins): (Vec<Vec<f64>>, Vec<Vec<u8>>) = (0..x.ncols())
            .into_par_iter()
            .map(|feature| {
                let column: Vec<f64> = x.column(feature).to_vec();
                let cuts = bin_thresholds(&column, max_bin);
                let bins = column
                    .iter()
                    .map(|&v| cuts.partition_point(|&t| t < v) as u8)
                    .collect();
                (cuts, bins)
            })
            .unzip();
        Self { thresholds, bins }
    }

    fn n_features(&self) -> usize {
        self.thresholds.len()
    }
}

/// Cut points between adjacent distinct values, or between quantiles when
/// there are more than `max_bin` distinct values
fn bin_thresholds(values: &[f64], max_bin: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= max_bin {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let mut thresholds: Vec<f64> = Vec::with_capacity(max_bin - 1);
    for k in 1..max_bin {
        let value = sorted[k * sorted.len() / max_bin];
        let next = distinct.partition_point(|&d| d <= value);
        if let Some(&upper) = distinct.get(next) {
            let cut = (value + upper) / 2.0;
            if thresholds.last().map_or(true, |&last| cut > last) {
                thresholds.push(cut);
            }
        }
    }
    thresholds
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

/// Best (gain, bin) for one feature; rows in bins `0..=bin` go left
fn find_best_split_for_feature(
    binned: &BinnedFeatures,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    (total_g, total_h): (f64, f64),
    config: &GradientBoostingConfig,
) -> Option<(f64, usize)> {
    let n_bins = binned.thresholds[feature].len() + 1;
    if n_bins < 2 {
        return None;
    }

    let column = &binned.bins[feature];
    let mut hist = vec![(0.0f64, 0.0f64, 0usize); n_bins];
    for &i in indices {
        let slot = &mut hist[column[i] as usize];
        slot.0 += gradients[i];
        slot.1 += hessians[i];
        slot.2 += 1;
    }

    let lambda = config.reg_lambda;
    let base_score = compute_gain_single(total_g, total_h, lambda);
    let n = indices.len();
    let (mut left_g, mut left_h, mut left_n) = (0.0, 0.0, 0usize);
    let mut best: Option<(f64, usize)> = None;

    for (bin, &(g, h, count)) in hist[..n_bins - 1].iter().enumerate() {
        left_g += g;
        left_h += h;
        left_n += count;
        if count == 0 || left_n < config.min_child_samples || n - left_n < config.min_child_samples {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, lambda)
            + compute_gain_single(total_g - left_g, total_h - left_h, lambda)
            - base_score;
        if gain > best.map_or(0.0, |(b, _)| b) {
            best = Some((gain, bin));
        }
    }
    best
}

/// Best split of `indices` over `features`; the lowest feature index wins ties
fn find_best_split(
    binned: &BinnedFeatures,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    config: &GradientBoostingConfig,
) -> Option<SplitCandidate> {
    if indices.len() < config.min_child_samples * 2 || indices.len() < 2 {
        return None;
    }
    let totals = (
        indices.iter().map(|&i| gradients[i]).sum::<f64>(),
        indices.iter().map(|&i| hessians[i]).sum::<f64>(),
    );

    let per_feature: Vec<(usize, f64, usize)> = features
        .par_iter()
        .filter_map(|&feat| {
            find_best_split_for_feature(binned, gradients, hessians, indices, feat, totals, config)
                .map(|(gain, bin)| (feat, gain, bin))
        })
        .collect();

    let (feature, gain, bin) = per_feature.into_iter().fold(None, |acc: Option<(usize, f64, usize)>, cand| match acc {
        Some(best) if best.1 >= cand.1 => Some(best),
        _ => Some(cand),
    })?;

    let column = &binned.bins[feature];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| column[i] as usize <= bin);

    Some(SplitCandidate {
        feature,
        threshold: binned.thresholds[feature][bin],
        gain,
        left_indices,
        right_indices,
    })
}

struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    // Max-heap on gain; older nodes first on ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.split
            .gain
            .partial_cmp(&other.split.gain)
            .unwrap_or(Ordering::Equal)
            .then(other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Grow one tree leaf-wise over the rows in `indices`
fn build_tree(
    binned: &BinnedFeatures,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    config: &GradientBoostingConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> BoostNode {
    let n_features = binned.n_features();
    let n_selected = ((n_features as f64 * config.colsample_bytree).ceil() as usize).clamp(1, n_features);
    let mut features: Vec<usize> = (0..n_features).collect();
    if n_selected < n_features {
        features.shuffle(rng);
        features.truncate(n_selected);
        features.sort_unstable();
    }

    let max_depth = config.max_depth.unwrap_or(usize::MAX);
    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();

    if max_depth > 0 {
        if let Some(split) = find_best_split(binned, gradients, hessians, indices, &features, config) {
            heap.push(PendingSplit { node_id: 0, split });
        }
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.num_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else {
            break;
        };

        let depth = depths[node_id];
        let left_id = nodes.len();
        let right_id = left_id + 1;

        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        if depth + 1 < max_depth {
            for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
                if let Some(child) = find_best_split(binned, gradients, hessians, child_indices, &features, config) {
                    heap.push(PendingSplit { node_id: child_id, split: child });
                }
            }
        }

        nodes.push(NodeSlot::Leaf(split.left_indices));
        nodes.push(NodeSlot::Leaf(split.right_indices));
        depths.push(depth + 1);
        depths.push(depth + 1);
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> BoostNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => BoostNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

/// GOSS row selection. Returns the chosen rows and the weight applied to the
/// sampled small-gradient rows.
fn goss_sample(
    gradients: &[f64],
    top_rate: f64,
    other_rate: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> (Vec<usize>, Vec<usize>, f64) {
    let n = gradients.len();
    let n_top = ((n as f64 * top_rate).ceil() as usize).min(n);
    let n_other = ((n as f64 * other_rate).ceil() as usize).min(n - n_top);

    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| {
        gradients[b]
            .abs()
            .partial_cmp(&gradients[a].abs())
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let top = sorted[..n_top].to_vec();
    let mut rest = sorted[n_top..].to_vec();
    rest.shuffle(rng);
    rest.truncate(n_other);

    let amplify = if other_rate > 0.0 { (1.0 - top_rate) / other_rate } else { 1.0 };
    (top, rest, amplify)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn check_binary_labels(y: &Array1<i64>) -> Result<()> {
    match y.iter().find(|&&v| v != 0 && v != 1) {
        Some(v) => Err(PipelineError::ValidationError(format!(
            "Binary classifier expects labels 0 and 1, found {}",
            v
        ))),
        None => Ok(()),
    }
}

/// Binary gradient-boosted tree classifier; class 1 is the positive class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    trees: Vec<BoostNode>,
    base_prediction: f64,
    n_features: usize,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        self.config.validate()?;

        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(PipelineError::ValidationError("Cannot fit on an empty matrix".into()));
        }
        if n != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        check_binary_labels(y)?;

        let target: Vec<f64> = y.iter().map(|&v| v as f64).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));

        let pos_rate = (target.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        self.base_prediction = (pos_rate / (1.0 - pos_rate)).ln();
        self.n_features = x.ncols();
        self.trees.clear();

        let binned = BinnedFeatures::new(x, self.config.max_bin);
        let mut raw = Array1::from_elem(n, self.base_prediction);
        let all_rows: Vec<usize> = (0..n).collect();

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let mut gradients: Vec<f64> = probs.iter().zip(&target).map(|(&p, &yi)| p - yi).collect();
            let mut hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let tree = match self.config.boosting_type {
                BoostingType::Gbdt => build_tree(&binned, &gradients, &hessians, &all_rows, &self.config, &mut rng),
                BoostingType::Goss => {
                    let (mut rows, rest, amplify) =
                        goss_sample(&gradients, self.config.top_rate, self.config.other_rate, &mut rng);
                    for &i in &rest {
                        gradients[i] *= amplify;
                        hessians[i] *= amplify;
                    }
                    rows.extend(rest);
                    build_tree(&binned, &gradients, &hessians, &rows, &self.config, &mut rng)
                }
            };

            for (r, row) in raw.iter_mut().zip(x.rows()) {
                *r += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    fn predict_raw(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_fitted(x)?;
        let lr = self.config.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_prediction + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>())
            .collect())
    }

    /// Probability of the positive class per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_raw(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1 } else { 0 }))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
