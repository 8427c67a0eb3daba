//! Entropy command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use causa_analysis::{measure_entropy_for, AnomalyDetector, AnomalyReport, EntropyReport};

use crate::config::CliConfig;
use crate::history::load_store;
use crate::output;

/// Arguments for the entropy command.
#[derive(Args)]
pub struct EntropyArgs {
    /// Exported history file (JSON array of events)
    pub file: PathBuf,

    /// History to compare against
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,

    /// Relative deviation that counts as an anomaly (overrides config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Exit with code 2 when an anomaly is detected
    #[arg(long)]
    pub fail_on_anomaly: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct EntropyJsonOutput {
    store: String,
    entropy: EntropyReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<EntropyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anomaly: Option<AnomalyReport>,
}

async fn measure(path: &Path) -> Result<(String, EntropyReport), String> {
    let store = load_store(path).await?;
    let report = measure_entropy_for(&store).map_err(|e| e.to_string())?;
    Ok((store.key().to_string(), report))
}

pub async fn run(args: EntropyArgs, config: &CliConfig) -> i32 {
    let mut anomaly_config = config.anomaly.clone();
    if let Some(threshold) = args.threshold {
        anomaly_config.relative_threshold = threshold;
    }
    let detector = match AnomalyDetector::new(anomaly_config) {
        Ok(d) => d,
        Err(e) => {
            output::error(&e.to_string());
            return 1;
        }
    };

    let (store, entropy) = match measure(&args.file).await {
        Ok(m) => m,
        Err(e) => {
            output::error(&e);
            return 1;
        }
    };
    let baseline = match &args.baseline {
        Some(path) => match measure(path).await {
            Ok((_, report)) => Some(report),
            Err(e) => {
                output::error(&e);
                return 1;
            }
        },
        None => None,
    };
    let anomaly = baseline.as_ref().map(|b| detector.check(&entropy, b));
    let code = match &anomaly {
        Some(a) if a.is_anomaly && args.fail_on_anomaly => 2,
        _ => 0,
    };

    if args.json {
        let rendered = output::json(&EntropyJsonOutput {
            store,
            entropy,
            baseline,
            anomaly,
        });
        return if rendered == 0 { code } else { rendered };
    }

    output::header(&format!("Entropy: {}", store));
    output::kv("Shannon", &format!("{:.4} bits", entropy.shannon));
    output::kv("Causal complexity", &format!("{:.4}", entropy.causal_complexity));
    output::kv("Unique states", &entropy.metadata.unique_states.to_string());
    output::kv("Events", &entropy.metadata.total_events.to_string());
    output::kv("Max depth", &entropy.metadata.max_depth.to_string());
    output::kv(
        "Avg branching",
        &format!("{:.2}", entropy.metadata.avg_branching_factor),
    );

    if let (Some(baseline), Some(anomaly)) = (&baseline, &anomaly) {
        println!();
        output::kv("Baseline", &format!("{:.4} bits", baseline.shannon));
        output::kv("Delta", &format!("{:+.4} bits", anomaly.delta));
        output::kv(
            "Relative",
            &format!("{:.2} (threshold {:.2})", anomaly.relative, detector.threshold()),
        );
        if anomaly.is_anomaly {
            output::warn("Anomaly: entropy deviates from the baseline");
        } else {
            output::success("Within the baseline's range");
        }
    } else {
        println!();
        output::hint("Pass --baseline <FILE> to check for anomalies.");
    }
    code
}
