//! Scenario: the stitch vehicle starts somewhere on the prior map but
//! under a different heading convention (e.g. its IMU was mounted
//! rotated relative to the prior run). Re-localization must recover
//! both the yaw offset and the right neighborhood in the prior map.
//!
//! Exercised directly at the `relocalize::run` level rather than through
//! a full `StitchRun`: full-pipeline numerics (descriptor tie-breaking,
//! whole-submap ICP, pose-graph replay) all compound on top of this one
//! recovery step, and this is the step the scenario is actually about.

mod common;

use std::collections::BTreeMap;
use std::f64::consts::PI;

use descriptor::{make_descriptor, ScanContextConfig, ScanContextIndex};
use pointcloud::{concat, transform_cloud};
use relocalize::{self, RelocalizeConfig};
use transforms::Transform3D;
use types::VertexId;

#[test]
fn yaw_rotated_query_recovers_its_offset_and_neighborhood() {
    let n = 60;
    let poses = common::straight_line_poses(n, 1.0, 0.0, 0.0);
    let sc_config = ScanContextConfig::default();

    let mut index = ScanContextIndex::new();
    let mut prior_poses: BTreeMap<VertexId, Transform3D> = BTreeMap::new();
    let mut world_clouds = Vec::with_capacity(n);

    for (id, pose) in poses.iter().enumerate() {
        let tf = Transform3D::from_pose(pose);
        let cloud = common::disc_cloud();
        index.push(id, make_descriptor(&cloud, &sc_config));
        world_clouds.push(transform_cloud(&cloud, &tf));
        prior_poses.insert(id, tf);
    }
    let prior_map = concat(world_clouds).voxel_downsample(0.3);

    let query_cloud = common::rotated_disc_cloud(PI / 6.0);

    let config = RelocalizeConfig::default();
    let recovered = relocalize::run(&query_cloud, &index, &prior_poses, &prior_map, None, 5_000, &config)
        .expect("re-localization should recover the rotated query");

    let (_, _, yaw) = recovered.rotation_rpy();
    assert!(
        (yaw.abs() - PI / 6.0).abs() < 0.2,
        "expected |yaw| near pi/6, got {yaw}"
    );

    // Every keyframe along the corridor carries the identical local disc
    // shape, so the descriptor match carries no positional information
    // beyond "somewhere on this corridor" — assert the recovered pose
    // lands back on the corridor rather than at one specific keyframe.
    let got = recovered.translation();
    assert!(got.y.abs() < 1.0, "recovered translation drifted off the corridor: {got:?}");
    assert!(got.z.abs() < 1.0, "recovered translation drifted off the ground plane: {got:?}");
    assert!(
        got.x > -2.0 && got.x < (n as f64) + 2.0,
        "recovered translation fell outside the mapped corridor: {got:?}"
    );
}
