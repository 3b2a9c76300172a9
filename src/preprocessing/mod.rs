//! Data preprocessing module
//!
//! - [`LabelEncoder`] - maps the binary churn label onto `0.0` / `1.0`
//! - [`FeaturePipeline`] - mean/mode imputation, one-hot encoding of text
//!   columns and standard scaling of numeric columns

mod label;
mod features;

pub use label::LabelEncoder;
pub use features::{FeaturePipeline, FeatureTransform};
