use descriptor::Descriptor;
use nalgebra::DMatrix;
use std::fs;
use std::path::Path;

/// Write a descriptor as a whitespace-delimited matrix with three decimal
/// places, one row per line.
///
/// The ring-key isn't persisted separately: it's a deterministic row-mean
/// of the matrix, so it's recomputed on load rather than stored twice.
pub fn write_scd(path: &Path, descriptor: &Descriptor) -> std::io::Result<()> {
    let mut out = String::new();
    for row in descriptor.matrix.row_iter() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:.3}", v)).collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    fs::write(path, out)
}

pub fn read_scd(path: &Path) -> std::io::Result<Descriptor> {
    let content = fs::read_to_string(path)?;
    let rows: Vec<Vec<f64>> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .map(|tok| tok.parse::<f64>().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let num_rings = rows.len();
    let num_sectors = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut matrix = DMatrix::zeros(num_rings, num_sectors);
    for (r, row) in rows.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            matrix[(r, c)] = *v;
        }
    }
    let ring_key = (0..num_rings).map(|r| matrix.row(r).mean()).collect();

    Ok(Descriptor { matrix, ring_key })
}
