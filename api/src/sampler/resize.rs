use image::RgbImage;

/// Overlap weights of the source pixels covered by each destination pixel along one axis.
fn area_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src {
                let covered = end.min((s + 1) as f64) - start.max(s as f64);
                if covered > 1e-9 {
                    weights.push((s, (covered / scale) as f32));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

/// Area-interpolated resize of an RGB image, written into `out` as
/// `(height, width, 3)` values scaled to [0, 1].
pub fn resize_area_normalized(img: &RgbImage, width: usize, height: usize, out: &mut [f32]) {
    debug_assert_eq!(out.len(), width * height * 3);

    let x_weights = area_weights(img.width() as usize, width);
    let y_weights = area_weights(img.height() as usize, height);
    let src = img.as_raw();
    let src_width = img.width() as usize;

    for (y, ys) in y_weights.iter().enumerate() {
        for (x, xs) in x_weights.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(sy, wy) in ys {
                for &(sx, wx) in xs {
                    let w = wy * wx;
                    let idx = (sy * src_width + sx) * 3;
                    acc[0] += src[idx] as f32 * w;
                    acc[1] += src[idx + 1] as f32 * w;
                    acc[2] += src[idx + 2] as f32 * w;
                }
            }
            let o = (y * width + x) * 3;
            for c in 0..3 {
                out[o + c] = (acc[c] / 255.0).clamp(0.0, 1.0);
            }
        }
    }
}
