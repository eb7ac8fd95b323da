use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use descriptor::{DetectConfig, ScanContextConfig};
use loopclosure::LoopConfig;
use pgo::SmootherConfig;
use pointcloud::IcpConfig;
use relocalize::RelocalizeConfig;

/// The exhaustive set of recognized configuration knobs from spec.md §6,
/// deserializable from a TOML overlay file (see `bins/stitchd`).
///
/// Field names match the spec's knob names rather than Rust naming
/// convention in a few spots (`sc_dist_thres` instead of `SC_DIST_THRES`,
/// `loop_vaild_period` kept with the original's typo) so a reviewer
/// diffing this against spec.md §6 doesn't have to guess the mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub loop_closure_search_radius: f64,
    pub keyframe_search_num: usize,
    pub loop_closure_fitness_score_thld: f64,
    pub icp_downsamp_size: f64,
    pub loop_keyframe_num_thld: usize,
    pub sc_dist_thres: f64,
    /// `period_name -> [t0, t1, t2, t3, ...]`; missing keys default to
    /// "always on".
    pub loop_vaild_period: HashMap<String, Vec<f64>>,
    pub save_globalmap_en: bool,
    pub save_resolution: f64,
    /// Re-localization timeout budget per attempted keyframe.
    pub relocalize_timeout_ms: u64,
    /// Extra smoother relinearization passes after a loop/GPS factor
    /// closes.
    pub extra_passes_after_loop: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            loop_closure_search_radius: 10.0,
            keyframe_search_num: 20,
            loop_closure_fitness_score_thld: 0.05,
            icp_downsamp_size: 0.1,
            loop_keyframe_num_thld: 50,
            sc_dist_thres: 0.13,
            loop_vaild_period: HashMap::new(),
            save_globalmap_en: false,
            save_resolution: 0.3,
            relocalize_timeout_ms: 100,
            extra_passes_after_loop: 5,
        }
    }
}

impl StitchConfig {
    fn odom_period(&self) -> Vec<f64> {
        self.loop_vaild_period.get("odom").cloned().unwrap_or_default()
    }

    fn scancontext_period(&self) -> Vec<f64> {
        self.loop_vaild_period
            .get("scancontext")
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn scancontext(&self) -> ScanContextConfig {
        ScanContextConfig::default()
    }

    pub(crate) fn detect(&self) -> DetectConfig {
        DetectConfig {
            min_candidates: self.loop_keyframe_num_thld,
            exclude_recent: 0,
            num_candidates: 10,
            dist_threshold: self.sc_dist_thres,
        }
    }

    pub(crate) fn icp(&self) -> IcpConfig {
        IcpConfig::default()
    }

    pub(crate) fn relocalize(&self) -> RelocalizeConfig {
        RelocalizeConfig {
            scancontext: self.scancontext(),
            detect: self.detect(),
            icp: self.icp(),
            fitness_threshold: self.loop_closure_fitness_score_thld,
        }
    }

    pub(crate) fn loopclosure(&self) -> LoopConfig {
        LoopConfig {
            loop_closure_search_radius: self.loop_closure_search_radius,
            keyframe_search_num: self.keyframe_search_num,
            loop_closure_fitness_score_thld: self.loop_closure_fitness_score_thld,
            icp_downsamp_size: self.icp_downsamp_size,
            loop_keyframe_num_thld: self.loop_keyframe_num_thld,
            sc_dist_thres: self.sc_dist_thres,
            odom_period: self.odom_period(),
            scancontext_period: self.scancontext_period(),
        }
    }

    pub(crate) fn smoother(&self) -> SmootherConfig {
        SmootherConfig {
            extra_passes_after_loop: self.extra_passes_after_loop,
            ..SmootherConfig::default()
        }
    }
}
