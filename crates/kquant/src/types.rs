use rgb::RGBA8;

pub const CHANNELS: usize = 4;

/// Squared Euclidean distance over all four channels, unweighted.
#[inline(always)]
pub(crate) fn squared_distance(x: RGBA8, y: RGBA8) -> u32 {
    let dr = x.r as i32 - y.r as i32;
    let dg = x.g as i32 - y.g as i32;
    let db = x.b as i32 - y.b as i32;
    let da = x.a as i32 - y.a as i32;
    (dr * dr + dg * dg + db * db + da * da) as u32
}
