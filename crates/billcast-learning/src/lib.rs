//! # billcast-learning
//!
//! Random-forest regression for cleaned utility-billing batches.
//!
//! This crate takes the output of `billcast-processing`, fits a bagged
//! ensemble of regression trees on the numeric feature columns, scores it on
//! a held-out partition and persists it for later scoring.
//!
//! ## Features
//!
//! - **Seeded split**: 80/20 by default, shuffled with seed 42
//! - **Random forest**: 200 bootstrap trees grown with variance-reduction
//!   splits, fitted in parallel with rayon
//! - **Metrics**: R² and RMSE on the held-out rows
//! - **Persistence**: one `bincode` artifact, replaced atomically
//! - **Scoring**: predictions appended to a copy of the batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use billcast_learning::{Predictor, Trainer, TrainedModel, TrainerConfig};
//! use billcast_processing::io::load_csv_with_fallbacks;
//! use billcast_processing::{CleaningPipeline, SchemaConfig};
//!
//! let raw = load_csv_with_fallbacks("bills.csv")?;
//! let cleaned = CleaningPipeline::builder().build()?.process(raw)?;
//!
//! let schema = SchemaConfig::default();
//! let model = Trainer::new(TrainerConfig::default(), schema.clone()).train(&cleaned.data)?;
//! println!("R² = {:.3}, RMSE = {:.2}", model.metrics.r2, model.metrics.rmse);
//!
//! let model = TrainedModel::load("model/water_bill_model.bin")?;
//! let scored = Predictor::new(&model, &schema).predict(&cleaned.data)?;
//! println!("{}", scored.head(Some(5)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, LearningError>`](LearningError). Errors
//! from the cleaning crate are carried as
//! [`LearningError::Preprocessing`].

pub mod config;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod trainer;

pub use config::{DEFAULT_MODEL_PATH, TrainerConfig, TrainerConfigBuilder};
pub use error::{LearningError, Result};
pub use forest::{ForestParams, RandomForest, RegressionTree};
pub use metrics::Metrics;
pub use model::TrainedModel;
pub use pipeline::{ForecastOutput, ForecastPipeline, ForecastPipelineBuilder};
pub use predictor::Predictor;
pub use trainer::{Split, Trainer, train_test_split};
