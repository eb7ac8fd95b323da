use crate::factor::{Factor, FactorKind};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;
use transforms::Transform3D;
use types::VertexId;

#[derive(Error, Debug)]
pub enum FgError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed factor_graph.fg: {0}")]
    Parse(String),
}

/// Write the `factor_graph.fg` header-plus-records format.
///
/// Noises are variances in memory; the file stores standard deviations,
/// so every noise component is square-rooted here.
pub fn write_factor_graph(
    path: &Path,
    vertices: &BTreeMap<VertexId, Transform3D>,
    edges: &[Factor],
) -> Result<(), FgError> {
    let mut out = String::new();
    writeln!(out, "VERTEX_SIZE: {}", vertices.len()).unwrap();
    for (id, tf) in vertices.iter() {
        let (x, y, z) = (tf.translation().x, tf.translation().y, tf.translation().z);
        let (roll, pitch, yaw) = tf.rotation_rpy();
        writeln!(out, "VERTEX {id}: {x} {y} {z} {roll} {pitch} {yaw}").unwrap();
    }

    writeln!(out, "EDGE_SIZE: {}", edges.len()).unwrap();
    for factor in edges {
        let (x, y, z) = (
            factor.value.translation().x,
            factor.value.translation().y,
            factor.value.translation().z,
        );
        let (roll, pitch, yaw) = factor.value.rotation_rpy();
        let sigmas: Vec<String> = factor.noise.iter().map(|v| format!("{}", v.max(0.0).sqrt())).collect();
        let sigmas = sigmas.join(" ");

        match factor.kind {
            FactorKind::Prior => {
                writeln!(
                    out,
                    "EDGE {}: {} {x} {y} {z} {roll} {pitch} {yaw} {sigmas}",
                    factor.kind.code(),
                    factor.to_id
                )
                .unwrap();
            }
            FactorKind::Between | FactorKind::Loop => {
                writeln!(
                    out,
                    "EDGE {}: {} {} {x} {y} {z} {roll} {pitch} {yaw} {sigmas}",
                    factor.kind.code(),
                    factor.from_id,
                    factor.to_id
                )
                .unwrap();
            }
            FactorKind::Gps => {
                writeln!(
                    out,
                    "EDGE {}: {} {x} {y} {z} {sigmas}",
                    factor.kind.code(),
                    factor.to_id
                )
                .unwrap();
            }
        }
    }

    fs::write(path, out)?;
    Ok(())
}

pub fn read_factor_graph(path: &Path) -> Result<(BTreeMap<VertexId, Transform3D>, Vec<Factor>), FgError> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();

    let header = lines
        .next()
        .ok_or_else(|| FgError::Parse("missing VERTEX_SIZE header".into()))?;
    let vertex_count: usize = tokens(header)
        .get(1)
        .ok_or_else(|| FgError::Parse("malformed VERTEX_SIZE line".into()))?
        .parse()
        .map_err(|_| FgError::Parse("non-numeric VERTEX_SIZE".into()))?;

    let mut vertices = BTreeMap::new();
    for _ in 0..vertex_count {
        let line = lines
            .next()
            .ok_or_else(|| FgError::Parse("truncated vertex list".into()))?;
        let t = tokens(line);
        if t.len() < 8 || t[0] != "VERTEX" {
            return Err(FgError::Parse(format!("malformed VERTEX line: {line}")));
        }
        let id: VertexId = parse(&t[1])?;
        let x: f64 = parse(&t[2])?;
        let y: f64 = parse(&t[3])?;
        let z: f64 = parse(&t[4])?;
        let roll: f64 = parse(&t[5])?;
        let pitch: f64 = parse(&t[6])?;
        let yaw: f64 = parse(&t[7])?;
        vertices.insert(id, Transform3D::new(x, y, z, roll, pitch, yaw));
    }

    let edge_header = lines
        .next()
        .ok_or_else(|| FgError::Parse("missing EDGE_SIZE header".into()))?;
    let edge_count: usize = tokens(edge_header)
        .get(1)
        .ok_or_else(|| FgError::Parse("malformed EDGE_SIZE line".into()))?
        .parse()
        .map_err(|_| FgError::Parse("non-numeric EDGE_SIZE".into()))?;

    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let line = lines
            .next()
            .ok_or_else(|| FgError::Parse("truncated edge list".into()))?;
        edges.push(parse_edge(line)?);
    }

    Ok((vertices, edges))
}

fn parse_edge(line: &str) -> Result<Factor, FgError> {
    let t = tokens(line);
    if t.len() < 2 || t[0] != "EDGE" {
        return Err(FgError::Parse(format!("malformed EDGE line: {line}")));
    }
    let code: u8 = parse(&t[1])?;
    let kind = FactorKind::from_code(code).ok_or_else(|| FgError::Parse(format!("unknown edge kind {code}")))?;

    match kind {
        FactorKind::Prior => {
            if t.len() < 9 {
                return Err(FgError::Parse(format!("malformed Prior edge: {line}")));
            }
            let id: VertexId = parse(&t[2])?;
            let pose = parse_pose6(&t[3..9])?;
            let noise = parse_noise(&t[9..], 6)?;
            Ok(Factor::prior(id, pose, noise))
        }
        FactorKind::Between | FactorKind::Loop => {
            if t.len() < 10 {
                return Err(FgError::Parse(format!("malformed Between/Loop edge: {line}")));
            }
            let from: VertexId = parse(&t[2])?;
            let to: VertexId = parse(&t[3])?;
            let pose = parse_pose6(&t[4..10])?;
            let noise = parse_noise(&t[10..], 6)?;
            Ok(Factor {
                kind,
                from_id: from,
                to_id: to,
                value: pose,
                noise,
            })
        }
        FactorKind::Gps => {
            if t.len() < 6 {
                return Err(FgError::Parse(format!("malformed Gps edge: {line}")));
            }
            let id: VertexId = parse(&t[2])?;
            let x: f64 = parse(&t[3])?;
            let y: f64 = parse(&t[4])?;
            let z: f64 = parse(&t[5])?;
            let noise = parse_noise(&t[6..], 3)?;
            Ok(Factor::gps(id, Transform3D::new(x, y, z, 0.0, 0.0, 0.0), noise))
        }
    }
}

fn parse_pose6(fields: &[String]) -> Result<Transform3D, FgError> {
    let x: f64 = parse(&fields[0])?;
    let y: f64 = parse(&fields[1])?;
    let z: f64 = parse(&fields[2])?;
    let roll: f64 = parse(&fields[3])?;
    let pitch: f64 = parse(&fields[4])?;
    let yaw: f64 = parse(&fields[5])?;
    Ok(Transform3D::new(x, y, z, roll, pitch, yaw))
}

fn parse_noise(fields: &[String], expected: usize) -> Result<Vec<f64>, FgError> {
    if fields.len() < expected {
        return Err(FgError::Parse("truncated noise vector".into()));
    }
    fields[..expected]
        .iter()
        .map(|f| parse::<f64>(f).map(|sigma: f64| sigma * sigma))
        .collect()
}

fn parse<T: std::str::FromStr>(s: &str) -> Result<T, FgError> {
    s.parse().map_err(|_| FgError::Parse(format!("could not parse {s:?}")))
}

fn tokens(line: &str) -> Vec<String> {
    line.replace(':', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_all_factor_kinds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("factor_graph.fg");

        let mut vertices = BTreeMap::new();
        vertices.insert(0, Transform3D::identity());
        vertices.insert(1, Transform3D::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.1));

        let edges = vec![
            Factor::prior(0, Transform3D::identity(), vec![0.01; 6]),
            Factor::between(0, 1, Transform3D::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.1), vec![0.04; 6]),
            Factor::loop_closure(1, 0, Transform3D::identity(), vec![0.0025; 6]),
            Factor::gps(0, Transform3D::new(5.0, 6.0, 7.0, 0.0, 0.0, 0.0), vec![1.0; 3]),
        ];

        write_factor_graph(&path, &vertices, &edges).unwrap();
        let (loaded_vertices, loaded_edges) = read_factor_graph(&path).unwrap();

        assert_eq!(loaded_vertices.len(), vertices.len());
        assert_eq!(loaded_edges.len(), edges.len());
        for (original, loaded) in edges.iter().zip(loaded_edges.iter()) {
            assert_eq!(original.kind, loaded.kind);
            assert_eq!(original.from_id, loaded.from_id);
            assert_eq!(original.to_id, loaded.to_id);
            for (a, b) in original.noise.iter().zip(loaded.noise.iter()) {
                assert!((a - b).abs() < 1e-9, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse_edge("EDGE 9: 0 1.0 2.0 3.0").unwrap_err();
        assert!(matches!(err, FgError::Parse(_)));
    }
}
