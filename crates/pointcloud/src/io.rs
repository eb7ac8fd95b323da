use crate::cloud::PointCloud;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use types::Pose6D;

const CLOUD_MAGIC: [u8; 4] = *b"PCLB";
const TRAJECTORY_MAGIC: [u8; 4] = *b"TRJB";

/// Errors from the binary keyframe-cloud / trajectory codec.
///
/// Layout is a minimal custom binary format (header + little-endian
/// `f64` fields) rather than the full PCD file format (see `DESIGN.md`).
#[derive(Error, Debug)]
pub enum CloudIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic bytes, expected {expected:?} got {got:?}")]
    BadMagic { expected: [u8; 4], got: [u8; 4] },
    #[error("truncated file: expected {expected} more bytes")]
    Truncated { expected: usize },
}

fn read_magic<R: Read>(r: &mut R, expected: [u8; 4]) -> Result<(), CloudIoError> {
    let mut got = [0u8; 4];
    r.read_exact(&mut got)?;
    if got != expected {
        return Err(CloudIoError::BadMagic { expected, got });
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, CloudIoError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, CloudIoError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Write a keyframe cloud in the zero-padded per-keyframe binary layout
/// (`keyframe/NNNNNN.pcd`).
pub fn write_cloud(path: &Path, cloud: &PointCloud) -> Result<(), CloudIoError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&CLOUD_MAGIC)?;
    w.write_all(&(cloud.len() as u32).to_le_bytes())?;
    for p in &cloud.points {
        w.write_all(&p.x.to_le_bytes())?;
        w.write_all(&p.y.to_le_bytes())?;
        w.write_all(&p.z.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_cloud(path: &Path) -> Result<PointCloud, CloudIoError> {
    let mut r = BufReader::new(File::open(path)?);
    read_magic(&mut r, CLOUD_MAGIC)?;
    let count = read_u32(&mut r)? as usize;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = read_f64(&mut r)?;
        let y = read_f64(&mut r)?;
        let z = read_f64(&mut r)?;
        points.push(Vector3::new(x, y, z));
    }
    Ok(PointCloud::from_points(points))
}

/// Write the `trajectory.pcd` pose sequence: `(x, y, z, roll, pitch, yaw,
/// time, intensity)` per pose, double precision, preserving an exact
/// round trip.
pub fn write_trajectory(path: &Path, poses: &[Pose6D]) -> Result<(), CloudIoError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&TRAJECTORY_MAGIC)?;
    w.write_all(&(poses.len() as u32).to_le_bytes())?;
    for p in poses {
        for field in [p.x, p.y, p.z, p.roll, p.pitch, p.yaw, p.time, p.intensity] {
            w.write_all(&field.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn read_trajectory(path: &Path) -> Result<Vec<Pose6D>, CloudIoError> {
    let mut r = BufReader::new(File::open(path)?);
    read_magic(&mut r, TRAJECTORY_MAGIC)?;
    let count = read_u32(&mut r)? as usize;
    let mut poses = Vec::with_capacity(count);
    for _ in 0..count {
        let x = read_f64(&mut r)?;
        let y = read_f64(&mut r)?;
        let z = read_f64(&mut r)?;
        let roll = read_f64(&mut r)?;
        let pitch = read_f64(&mut r)?;
        let yaw = read_f64(&mut r)?;
        let time = read_f64(&mut r)?;
        let intensity = read_f64(&mut r)?;
        poses.push(Pose6D {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
            time,
            intensity,
        });
    }
    Ok(poses)
}
