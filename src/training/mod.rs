//! Model training
//!
//! Tree learners (a Gini tree and the random forest used to rank
//! features, a leaf-wise gradient-boosted classifier), a stratified
//! k-fold splitter, classification metrics and the [`ModelTrainer`] stage.

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod metrics;
pub mod random_forest;
mod trainer;

pub use cross_validation::{CVSplit, StratifiedKFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use gradient_boosting::{BoostingType, GradientBoostingClassifier, GradientBoostingConfig};
pub use metrics::{ConfusionCounts, EvaluationMetrics};
pub use random_forest::{MaxFeatures, RandomForest};
pub use trainer::{build_search_space, params_to_config, ModelTrainer, TrainingData, TrainingOutcome, MODEL_NAME};
