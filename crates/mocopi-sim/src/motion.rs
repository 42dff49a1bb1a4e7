//! Synthetic motion: a standing figure that sways and swings its arms.

use mocopi_core::compose::BoneTransform;
use mocopi_core::wire::NUM_BONES;

/// Rest offsets from each bone's parent, in metres.
fn rest_offset(id: usize) -> [f32; 3] {
    match id {
        0 => [0.0, 0.9, 0.0],
        1..=6 => [0.0, 0.08, 0.0],
        7..=10 => [0.0, 0.06, 0.0],
        11 => [-0.05, 0.05, 0.0],
        15 => [0.05, 0.05, 0.0],
        12..=14 => [-0.12, 0.0, 0.0],
        16..=18 => [0.12, 0.0, 0.0],
        19 => [-0.09, -0.05, 0.0],
        23 => [0.09, -0.05, 0.0],
        _ => [0.0, -0.2, 0.0],
    }
}

/// Quaternion for a rotation of `angle` radians about z, as x, y, z, w.
fn about_z(angle: f32) -> [f32; 4] {
    let half = angle * 0.5;
    [0.0, 0.0, half.sin(), half.cos()]
}

/// Transforms for every bone at time `t` seconds.
pub fn pose_at(t: f32) -> Vec<BoneTransform> {
    let sway = (t * std::f32::consts::TAU * 0.5).sin();
    (0..NUM_BONES)
        .map(|id| {
            let angle = match id {
                0 => 0.05 * sway,
                12 | 16 => 0.6 * sway,
                20 | 24 => -0.3 * sway,
                _ => 0.0,
            };
            BoneTransform::new(id as u16, about_z(angle), rest_offset(id))
        })
        .collect()
}
