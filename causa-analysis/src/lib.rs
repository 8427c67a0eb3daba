//! # Causa Analysis
//!
//! **Entropy, anomaly and emergent-pattern analysis over causal stores**
//!
//! Two independent analyzers live here. The entropy analyzer measures how
//! much information and causal structure a store's history carries and
//! compares measurements against a baseline. The emergence detector watches
//! several stores at once and classifies how they behave together.
//!
//! ## Features
//!
//! - **Entropy**: Shannon entropy of recorded values plus a causal complexity score
//! - **Anomaly**: Relative entropy deviation against a baseline
//! - **Emergence**: Sliding-window sampler with eight pattern detectors
//! - **Background sampling**: Interval task on tokio, stoppable at any time
//!
//! ## Quick Start
//!
//! ```rust
//! use causa_analysis::measure_entropy_for;
//! use causa_core::CausalStore;
//!
//! let mut store = CausalStore::new("coin", "heads".to_string());
//! store.set("tails".to_string());
//!
//! let report = measure_entropy_for(&store).unwrap();
//! assert!((report.shannon - 1.0).abs() < 1e-9);
//! assert_eq!(report.metadata.unique_states, 2);
//! ```
//!
//! ## Patterns
//!
//! | Pattern | Signal |
//! |---------|--------|
//! | `synchronization` | Most samples show two or more stores changing together |
//! | `oscillation` | A store's change series correlates with itself at some lag |
//! | `cascade` | Three or more stores move first, one after another |
//! | `convergence` / `divergence` | Cross-store variance trends down / up |
//! | `clustering` | Stores split into groups with similar change rates |
//! | `feedback-loop` | A moves, then B, then A again |
//! | `equilibrium` | Little recent change anywhere |

pub mod config;
pub mod detectors;
pub mod emergence;
pub mod entropy;
pub mod error;
pub mod numeric;
pub mod pattern;
pub mod probe;
pub mod window;

// Re-export main types for convenience
pub use config::{AnomalyConfig, EmergenceConfig};
pub use detectors::{run_detectors, Detection};
pub use emergence::EmergenceDetector;
pub use entropy::{
    causal_complexity, detect_anomaly, measure_entropy, measure_entropy_for, shannon_entropy,
    AnomalyDetector, AnomalyReport, EntropyMetadata, EntropyReport,
};
pub use error::{AnalysisError, Result};
pub use numeric::numeric_projection;
pub use pattern::{EmergentPattern, PatternType};
pub use probe::{CellProbe, StoreProbe};
pub use window::Snapshot;
