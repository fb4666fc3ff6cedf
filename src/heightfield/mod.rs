//! Procedural heightfield
//!
//! Perlin fBm with a ridge-noise blend, matching the terrain generator the
//! renderer seeds itself with when no heightmap is on disk. Stands in for
//! the external height-sampling collaborator in the CLI and tests.

/// Classic Perlin permutation table.
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209,
    76, 132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198,
    173, 186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44,
    154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79,
    113, 224, 232, 178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12,
    191, 179, 162, 241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29,
    24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline]
fn perm(i: usize) -> usize {
    PERM[i & 255] as usize
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

fn grad(hash: usize, x: f32, y: f32) -> f32 {
    let h = hash & 7;
    let u = if h < 4 { x } else { y };
    let v = if h < 4 { y } else { x };
    let u = if h & 1 != 0 { -u } else { u };
    let v = if h & 2 != 0 { -2.0 * v } else { 2.0 * v };
    u + v
}

fn perlin(x: f32, y: f32) -> f32 {
    let xi = x.floor() as i32 as usize & 255;
    let yi = y.floor() as i32 as usize & 255;
    let xf = x - x.floor();
    let yf = y - y.floor();

    let u = fade(xf);
    let v = fade(yf);

    let aa = perm(perm(xi) + yi);
    let ab = perm(perm(xi) + yi + 1);
    let ba = perm(perm(xi + 1) + yi);
    let bb = perm(perm(xi + 1) + yi + 1);

    let x1 = lerp(grad(aa, xf, yf), grad(ba, xf - 1.0, yf), u);
    let x2 = lerp(grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0), u);

    lerp(x1, x2, v)
}

/// Fractal Brownian motion: stacked octaves of Perlin noise.
fn fbm(x: f32, y: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += perlin(x * frequency, y * frequency) * amplitude;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

/// Seeded procedural terrain over the unit square.
#[derive(Debug, Clone, Copy)]
pub struct Heightfield {
    offset_x: f32,
    offset_y: f32,
}

impl Heightfield {
    const OCTAVES: u32 = 6;
    const PERSISTENCE: f32 = 0.5;
    const LACUNARITY: f32 = 2.0;
    const BASE_SCALE: f32 = 4.0;

    /// Create a heightfield; the seed only shifts the noise domain.
    pub fn new(seed: u32) -> Self {
        Self {
            offset_x: (seed % 1000) as f32 * 0.1,
            offset_y: (seed / 1000 % 1000) as f32 * 0.1,
        }
    }

    /// Sample the normalized height in `[0, 1]` at parametric `(u, v)`.
    ///
    /// Base fBm blended 70/30 with squared ridge noise for mountain crests.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let nx = u * Self::BASE_SCALE + self.offset_x;
        let ny = v * Self::BASE_SCALE + self.offset_y;

        let base = fbm(nx, ny, Self::OCTAVES, Self::PERSISTENCE, Self::LACUNARITY);
        let ridge = 1.0
            - fbm(
                nx * 2.0 + 100.0,
                ny * 2.0 + 100.0,
                4,
                Self::PERSISTENCE,
                Self::LACUNARITY,
            )
            .abs();
        let ridge = ridge * ridge;

        let blended = base * 0.7 + ridge * 0.3;
        ((blended + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_normalized() {
        let field = Heightfield::new(42);
        for i in 0..32 {
            for j in 0..32 {
                let h = field.sample(i as f32 / 32.0, j as f32 / 32.0);
                assert!((0.0..=1.0).contains(&h));
            }
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        let a = Heightfield::new(7);
        let b = Heightfield::new(7);
        assert_eq!(a.sample(0.3, 0.6), b.sample(0.3, 0.6));
    }

    #[test]
    fn test_seed_shifts_terrain() {
        let a = Heightfield::new(1);
        let b = Heightfield::new(900);
        let differs = (0..16).any(|i| {
            let u = i as f32 / 16.0;
            a.sample(u, u) != b.sample(u, u)
        });
        assert!(differs);
    }

    #[test]
    fn test_terrain_is_not_flat() {
        let field = Heightfield::new(3);
        let h0 = field.sample(0.1, 0.1);
        let varied = (0..64).any(|i| {
            let u = i as f32 / 64.0;
            (field.sample(u, 1.0 - u) - h0).abs() > 1e-3
        });
        assert!(varied);
    }
}
