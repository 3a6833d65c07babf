//! End-to-end driver: net disk in, rendered report out

use crate::config::TreeStatsConfig;
use crate::entropy::{EntropyCalculator, RelativeEntropy};
use crate::error::Result;
use crate::logging::LoggingSystem;
use crate::net_disk::NetDisk;
use crate::output::{OutputManager, ReportMetadata};
use std::path::PathBuf;
use tracing::info;

/// What to compute and where to write it
#[derive(Debug, Clone)]
pub struct TreeStatsRequest {
    pub net_disk: PathBuf,
    pub net_name: String,
    pub output_file: PathBuf,
}

pub struct TreeStatsPipeline {
    config: TreeStatsConfig,
}

impl TreeStatsPipeline {
    pub fn new(config: TreeStatsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeStatsConfig {
        &self.config
    }

    /// Open the store, score the named net, write the report, close the store
    pub fn run(&self, logging: &LoggingSystem, request: &TreeStatsRequest) -> Result<RelativeEntropy> {
        logging.in_scope(|| self.run_in_scope(logging, request))
    }

    fn run_in_scope(&self, logging: &LoggingSystem, request: &TreeStatsRequest) -> Result<RelativeEntropy> {
        info!(net_disk = %request.net_disk.display(), "Net disk name");
        info!(net_name = %request.net_name, "Net name");
        info!(output_file = %request.output_file.display(), "Output file");

        let disk = logging.time_operation("open_net_disk", || NetDisk::open(&request.net_disk))?;
        let root = disk.net_by_name(&request.net_name)?;
        info!(net = %root, "Parsed the top level net of the cactus tree");

        let metrics = logging.metrics();
        let calculator = EntropyCalculator::new(self.config.scoring.clone()).with_metrics(&metrics);
        let report = logging.time_operation("relative_entropy", || calculator.report(&disk, root))?;
        info!(
            total_p = report.total_p,
            total_q = report.total_q,
            entropy = report.entropy,
            "The total P, Q and relative entropy of the cactus tree"
        );

        let metadata = ReportMetadata::new(metrics.run_id(), &request.net_disk, &request.net_name);
        let format = OutputManager::new(self.config.output.clone()).write_report(
            &request.output_file,
            &metadata,
            &report,
        )?;
        info!(%format, output_file = %request.output_file.display(), "Wrote report");

        logging.log_metrics_summary();
        disk.close();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeStatsError;
    use crate::graph::NetGraphBuilder;
    use tempfile::TempDir;

    fn request(dir: &TempDir, net_name: &str) -> TreeStatsRequest {
        TreeStatsRequest {
            net_disk: dir.path().join("disk"),
            net_name: net_name.to_string(),
            output_file: dir.path().join("stats.tsv"),
        }
    }

    fn write_disk(dir: &TempDir) {
        let mut builder = NetGraphBuilder::new();
        let root = builder.add_net("root");
        builder.add_pairing(root, 0, 9);
        NetDisk::save(&builder.build().unwrap(), dir.path().join("disk")).unwrap();
    }

    #[test]
    fn test_run_writes_report() {
        let dir = TempDir::new().unwrap();
        write_disk(&dir);
        let request = request(&dir, "root");

        let logging = LoggingSystem::disabled();
        let report = TreeStatsPipeline::new(TreeStatsConfig::default())
            .run(&logging, &request)
            .unwrap();
        assert_eq!(report.entropy, 0.0);

        let contents = std::fs::read_to_string(&request.output_file).unwrap();
        assert!(contents.ends_with("24.000000\t24.000000\t0.000000\n"));
        assert_eq!(logging.metrics().get_counter("leaf_nets"), 1);
        assert!(logging.metrics().total_time("relative_entropy").is_some());
    }

    #[test]
    fn test_unknown_net_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write_disk(&dir);
        let request = request(&dir, "elsewhere");

        let result = TreeStatsPipeline::new(TreeStatsConfig::default())
            .run(&LoggingSystem::disabled(), &request);
        assert!(matches!(result, Err(TreeStatsError::NetNotFound(_))));
        assert!(!request.output_file.exists());
    }
}
