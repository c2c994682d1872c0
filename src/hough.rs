// src/hough.rs
//
// Progressive probabilistic Hough transform over a binary edge map.
//
// Edge points are visited in pseudo-random order. Each visited point votes
// in the (theta, rho) accumulator; once a bin reaches the vote threshold the
// line through that bin is walked in both directions from the point,
// tolerating up to `max_line_gap` empty pixels, to find the segment ends.
// Pixels on the walked segment are removed from the mask (and their votes
// withdrawn when the segment is long enough) so they never seed another
// segment. Segments come out in the order they are found.
//
// The visiting order comes from a fixed-seed multiply-with-carry generator
// with the same constants as OpenCV's default RNG, so the output order is
// reproducible from run to run.

use crate::types::{EdgeMap, HoughConfig, Segment};

const SHIFT: i32 = 16;

/// Multiply-with-carry generator, seeded with all ones.
struct MwcRng {
    state: u64,
}

impl MwcRng {
    const COEFF: u64 = 4_164_903_690;

    fn new() -> Self {
        Self { state: u64::MAX }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = (self.state as u32 as u64)
            .wrapping_mul(Self::COEFF)
            .wrapping_add(self.state >> 32);
        self.state as u32
    }

    /// Uniform in `0..n`; `n` must be non-zero.
    fn below(&mut self, n: usize) -> usize {
        self.next_u32() as usize % n
    }
}

#[derive(Debug, Clone)]
pub struct ProbabilisticHough {
    rho: f32,
    theta: f32,
    threshold: i32,
    min_line_length: i32,
    max_line_gap: i32,
    max_lines: usize,
}

impl ProbabilisticHough {
    pub fn new(config: &HoughConfig) -> Self {
        Self {
            rho: config.rho,
            theta: config.theta_deg.to_radians(),
            threshold: config.threshold as i32,
            min_line_length: config.min_line_length as i32,
            max_line_gap: config.max_line_gap as i32,
            max_lines: config.max_lines,
        }
    }

    pub fn detect(&self, edges: &EdgeMap) -> Vec<Segment> {
        let width = edges.width() as i32;
        let height = edges.height() as i32;
        let mut lines = Vec::new();
        if width == 0 || height == 0 {
            return lines;
        }

        let irho = 1.0 / self.rho;
        let num_angle = ((std::f32::consts::PI / self.theta).round_ties_even() as usize).max(1);
        let num_rho = (((width + height) * 2 + 1) as f32 / self.rho).round_ties_even() as usize;
        let rho_offset = ((num_rho - 1) / 2) as i32;

        // (cos, sin) per angle, scaled by 1/rho
        let trig: Vec<(f32, f32)> = (0..num_angle)
            .map(|n| {
                let angle = n as f32 * self.theta;
                (angle.cos() * irho, angle.sin() * irho)
            })
            .collect();
        let rho_bin = |n: usize, x: i32, y: i32| -> usize {
            let (c, s) = trig[n];
            let r = (x as f32 * c + y as f32 * s).round_ties_even() as i32 + rho_offset;
            r.clamp(0, num_rho as i32 - 1) as usize
        };

        let mut accum = vec![0i32; num_angle * num_rho];
        let mut mask = vec![false; (width * height) as usize];
        let mut points: Vec<(i32, i32)> = Vec::new();
        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel[0] != 0 {
                mask[(y as i32 * width + x as i32) as usize] = true;
                points.push((x as i32, y as i32));
            }
        }

        let mut rng = MwcRng::new();
        let mut count = points.len();
        while count > 0 {
            let idx = rng.below(count);
            let (px, py) = points[idx];
            // Drop the point from the pool by overwriting it with the last one
            points[idx] = points[count - 1];
            count -= 1;

            // Already consumed by an earlier segment
            if !mask[(py * width + px) as usize] {
                continue;
            }

            let mut max_val = self.threshold - 1;
            let mut max_n = 0;
            for n in 0..num_angle {
                let cell = &mut accum[n * num_rho + rho_bin(n, px, py)];
                *cell += 1;
                if *cell > max_val {
                    max_val = *cell;
                    max_n = n;
                }
            }
            if max_val < self.threshold {
                continue;
            }

            // Direction along the winning line, in 16.16 fixed point
            let a = -trig[max_n].1;
            let b = trig[max_n].0;
            let (x_major, x0, y0, dx0, dy0) = if a.abs() > b.abs() {
                let dy0 = (b * (1 << SHIFT) as f32 / a.abs()).round_ties_even() as i32;
                let dx0 = if a > 0.0 { 1 } else { -1 };
                (true, px, (py << SHIFT) + (1 << (SHIFT - 1)), dx0, dy0)
            } else {
                let dx0 = (a * (1 << SHIFT) as f32 / b.abs()).round_ties_even() as i32;
                let dy0 = if b > 0.0 { 1 } else { -1 };
                (false, (px << SHIFT) + (1 << (SHIFT - 1)), py, dx0, dy0)
            };
            let to_pixel = |x: i32, y: i32| -> (i32, i32) {
                if x_major {
                    (x, y >> SHIFT)
                } else {
                    (x >> SHIFT, y)
                }
            };
            let in_bounds = |x: i32, y: i32| x >= 0 && x < width && y >= 0 && y < height;

            let mut line_end = [(px, py); 2];
            for (k, end) in line_end.iter_mut().enumerate() {
                let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
                let (mut x, mut y) = (x0, y0);
                let mut gap = 0;
                loop {
                    let (j, i) = to_pixel(x, y);
                    if !in_bounds(j, i) {
                        break;
                    }
                    if mask[(i * width + j) as usize] {
                        gap = 0;
                        *end = (j, i);
                    } else {
                        gap += 1;
                        if gap > self.max_line_gap {
                            break;
                        }
                    }
                    x += dx;
                    y += dy;
                }
            }

            let good_line = (line_end[1].0 - line_end[0].0).abs() >= self.min_line_length
                || (line_end[1].1 - line_end[0].1).abs() >= self.min_line_length;

            // Walk again up to the found ends, consuming the pixels
            for (k, &end) in line_end.iter().enumerate() {
                let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
                let (mut x, mut y) = (x0, y0);
                loop {
                    let (j, i) = to_pixel(x, y);
                    if !in_bounds(j, i) {
                        break;
                    }
                    let cell = (i * width + j) as usize;
                    if mask[cell] {
                        if good_line {
                            for n in 0..num_angle {
                                accum[n * num_rho + rho_bin(n, j, i)] -= 1;
                            }
                        }
                        mask[cell] = false;
                    }
                    if (j, i) == end {
                        break;
                    }
                    x += dx;
                    y += dy;
                }
            }

            if good_line {
                lines.push(Segment::new(
                    line_end[0].0,
                    line_end[0].1,
                    line_end[1].0,
                    line_end[1].1,
                ));
                if lines.len() >= self.max_lines {
                    break;
                }
            }
        }

        lines
    }
}
