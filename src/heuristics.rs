//! Cleanup of perceived shelf layouts before they are asserted.
//!
//! Perception sees the same layer twice, misses the separators at the shelf
//! edges, and misses separators between labels. The functions here patch
//! that up on plain coordinate lists. Separator and barcode positions are
//! normalized by the layer width, so `0.0` is the left edge and `1.0` the
//! right edge; layer heights are in meters.

use serde::{Deserialize, Serialize};

/// Layout cleanup applied before asserting perception results.
pub trait LayoutHeuristics: Send + Sync {
    /// Collapses layer heights closer than the merge distance. Ascending.
    fn merge_close_shelf_layers(&self, heights: &[f64]) -> Vec<f64>;

    /// Adds a separator between neighbouring barcodes that have none.
    ///
    /// Returns both lists sorted by position.
    fn add_separator_between_barcodes(
        &self,
        separators: &[f64],
        barcodes: &[(f64, String)],
    ) -> (Vec<f64>, Vec<(f64, String)>);

    /// Adds separators at the layer edges when perception missed them.
    fn add_edge_separators(&self, separators: &[f64]) -> Vec<f64>;

    /// Collapses separators closer than the merge distance. Ascending.
    fn merge_close_separators(&self, separators: &[f64]) -> Vec<f64>;
}

/// Thresholds for [`DefaultHeuristics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Layers closer than this (meters) are one layer.
    pub layer_merge_distance: f64,
    /// Separators closer than this (fraction of width) are one separator.
    pub separator_merge_distance: f64,
    /// A separator closer than this to an edge counts as the edge separator.
    pub edge_distance: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            layer_merge_distance: 0.05,
            separator_merge_distance: 0.02,
            edge_distance: 0.05,
        }
    }
}

/// Threshold based cleanup.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeuristics {
    config: HeuristicsConfig,
}

impl DefaultHeuristics {
    /// Heuristics with the given thresholds.
    pub const fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    pub const fn config(&self) -> &HeuristicsConfig {
        &self.config
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Averages runs of ascending values whose neighbours are within `distance`.
fn merge_runs(values: &[f64], distance: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut run: Vec<f64> = Vec::new();
    for v in sorted(values) {
        if let Some(last) = run.last() {
            if v - last > distance {
                out.push(mean(&run));
                run.clear();
            }
        }
        run.push(v);
    }
    if !run.is_empty() {
        out.push(mean(&run));
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

impl LayoutHeuristics for DefaultHeuristics {
    fn merge_close_shelf_layers(&self, heights: &[f64]) -> Vec<f64> {
        merge_runs(heights, self.config.layer_merge_distance)
    }

    fn add_separator_between_barcodes(
        &self,
        separators: &[f64],
        barcodes: &[(f64, String)],
    ) -> (Vec<f64>, Vec<(f64, String)>) {
        let mut separators = sorted(separators);
        let mut barcodes: Vec<(f64, String)> = barcodes
            .iter()
            .filter(|(x, _)| x.is_finite())
            .cloned()
            .collect();
        barcodes.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut added = Vec::new();
        for pair in barcodes.windows(2) {
            let (left, right) = (pair[0].0, pair[1].0);
            if !separators.iter().any(|s| *s > left && *s < right) {
                added.push((left + right) / 2.0);
            }
        }
        separators.extend(added);
        separators.sort_by(f64::total_cmp);
        (separators, barcodes)
    }

    fn add_edge_separators(&self, separators: &[f64]) -> Vec<f64> {
        let mut out = sorted(separators);
        let d = self.config.edge_distance;
        if !out.iter().any(|s| *s <= d) {
            out.insert(0, 0.0);
        }
        if !out.iter().any(|s| *s >= 1.0 - d) {
            out.push(1.0);
        }
        out
    }

    fn merge_close_separators(&self, separators: &[f64]) -> Vec<f64> {
        merge_runs(separators, self.config.separator_merge_distance)
    }
}
