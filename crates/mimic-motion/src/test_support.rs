//! Fixture builders shared by the unit tests of this crate.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Encode `data` as a version 1.0 little-endian `<f4` `.npy` buffer.
pub(crate) fn npy_bytes(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
    let shape_text = if shape.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape_text}, }}");
    // Preamble + header + newline is padded to a multiple of 64 bytes.
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = b"\x93NUMPY".to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Write a deflated `.npz` archive with one `<name>.npy` entry per pair.
pub(crate) fn write_npz(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = File::create(path).expect("create npz");
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(format!("{name}.npy"), options).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish npz");
}

/// Encoded arrays of a synthetic clip: the root walks along +x at 1 m/s
/// while yawing at 0.5 rad/s, joint `j` at frame `i` sits at `i + j/10`.
pub(crate) fn synthetic_entries(
    frames: usize,
    bodies: usize,
    dof: usize,
    dt: f32,
) -> Vec<(&'static str, Vec<u8>)> {
    let mut pos = Vec::with_capacity(frames * bodies * 3);
    let mut quat = Vec::with_capacity(frames * bodies * 4);
    let mut jpos = Vec::with_capacity(frames * dof);
    let mut jvel = Vec::with_capacity(frames * dof);
    for i in 0..frames {
        let t = i as f32 * dt;
        let half_yaw = 0.25 * t;
        for b in 0..bodies {
            pos.extend_from_slice(&[t + b as f32, 0.0, 0.8]);
            quat.extend_from_slice(&[half_yaw.cos(), 0.0, 0.0, half_yaw.sin()]);
        }
        for j in 0..dof {
            jpos.push(i as f32 + j as f32 / 10.0);
            jvel.push(-(i as f32));
        }
    }
    vec![
        ("body_pos_w", npy_bytes(&[frames, bodies, 3], &pos)),
        ("body_quat_w", npy_bytes(&[frames, bodies, 4], &quat)),
        ("joint_pos", npy_bytes(&[frames, dof], &jpos)),
        ("joint_vel", npy_bytes(&[frames, dof], &jvel)),
    ]
}
