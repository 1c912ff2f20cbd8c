//! Run summary: counts, skip breakdown and cost statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use spreadlab_core::components::median;

use crate::dataset::BacktestDataset;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub emitted: usize,
    pub skipped: usize,
    /// Skips keyed by the stage that failed.
    pub skipped_by_stage: BTreeMap<String, usize>,
    /// Skips keyed by error kind.
    pub skipped_by_kind: BTreeMap<String, usize>,
    pub call_spreads: usize,
    pub put_spreads: usize,
    pub cost_mean: Option<f64>,
    pub cost_median: Option<f64>,
    pub cost_min: Option<f64>,
    pub cost_max: Option<f64>,
    /// Share of rows opened for a net credit.
    pub credit_share: Option<f64>,
}

impl RunSummary {
    pub fn from_dataset(dataset: &BacktestDataset) -> Self {
        let rows = dataset.rows();
        let skipped = dataset.skipped();

        let mut skipped_by_stage = BTreeMap::new();
        let mut skipped_by_kind = BTreeMap::new();
        for s in skipped {
            *skipped_by_stage.entry(s.stage.to_string()).or_insert(0) += 1;
            *skipped_by_kind.entry(s.kind.clone()).or_insert(0) += 1;
        }

        let costs: Vec<f64> = rows.iter().map(|r| r.cost).filter(|c| c.is_finite()).collect();
        let (cost_mean, cost_median, cost_min, cost_max, credit_share) = if costs.is_empty() {
            (None, None, None, None, None)
        } else {
            let n = costs.len() as f64;
            (
                Some(costs.iter().sum::<f64>() / n),
                Some(median(costs.iter().copied())),
                costs.iter().copied().reduce(f64::min),
                costs.iter().copied().reduce(f64::max),
                Some(costs.iter().filter(|c| **c > 0.0).count() as f64 / n),
            )
        };

        Self {
            attempted: rows.len() + skipped.len(),
            emitted: rows.len(),
            skipped: skipped.len(),
            skipped_by_stage,
            skipped_by_kind,
            call_spreads: rows.iter().filter(|r| r.side == "call").count(),
            put_spreads: rows.iter().filter(|r| r.side == "put").count(),
            cost_mean,
            cost_median,
            cost_min,
            cost_max,
            credit_share,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.4}"));

        writeln!(f, "Dates attempted:  {}", self.attempted)?;
        writeln!(f, "Rows emitted:     {}", self.emitted)?;
        writeln!(f, "Dates skipped:    {}", self.skipped)?;
        for (stage, count) in &self.skipped_by_stage {
            writeln!(f, "  {stage:<22} {count}")?;
        }
        writeln!(f, "Call / put:       {} / {}", self.call_spreads, self.put_spreads)?;
        writeln!(f, "Cost mean:        {}", opt(self.cost_mean))?;
        writeln!(f, "Cost median:      {}", opt(self.cost_median))?;
        writeln!(f, "Cost min / max:   {} / {}", opt(self.cost_min), opt(self.cost_max))?;
        write!(
            f,
            "Net credit share: {}",
            self.credit_share
                .map_or_else(|| "n/a".to_string(), |x| format!("{:.1}%", x * 100.0))
        )
    }
}
