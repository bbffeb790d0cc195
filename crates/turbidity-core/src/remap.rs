//! Clamped linear remapping between numeric ranges
//!
//! Used to turn raw ADC samples into levels and percentages. All arithmetic
//! is carried out in `f32`; the conversion into the destination type happens
//! once, at the very end, through [`FromRemapped`].

/// Conversion from the `f32` result of a remap into a destination type.
///
/// Integer destinations truncate toward zero and saturate at the type's
/// bounds (the semantics of an `as` cast). Float destinations are returned
/// unchanged.
pub trait FromRemapped {
    fn from_remapped(value: f32) -> Self;
}

impl FromRemapped for f32 {
    fn from_remapped(value: f32) -> Self {
        value
    }
}

impl FromRemapped for u8 {
    fn from_remapped(value: f32) -> Self {
        value as u8
    }
}

/// Clamp `x` into `[low, high]`.
///
/// Unlike [`f32::clamp`] this never panics when `low > high`: the lower
/// bound is applied first, then the upper bound.
pub fn constrain(x: f32, low: f32, high: f32) -> f32 {
    if x < low {
        low
    } else if x > high {
        high
    } else {
        x
    }
}

/// Linearly map `x` from `[from_low, from_high]` onto `[to_low, to_high]`
/// without clamping.
///
/// A degenerate source range (`from_high == from_low`) maps everything to
/// `to_low`.
pub fn map_value(x: f32, from_low: f32, from_high: f32, to_low: f32, to_high: f32) -> f32 {
    let span = from_high - from_low;
    if span == 0.0 {
        return to_low;
    }
    to_low + (x - from_low) * (to_high - to_low) / span
}

/// Clamp `x` into the source range, then linearly map it onto the
/// destination range.
///
/// The destination range may be descending (`to_low > to_high`), in which
/// case the output decreases as `x` increases.
///
/// ```
/// use turbidity_core::remap::map_clamped;
///
/// let level: u8 = map_clamped(650.0, 447.0, 650.0, 1.0, 5.0);
/// assert_eq!(level, 5);
///
/// let level: u8 = map_clamped(9999.0, 447.0, 650.0, 5.0, 1.0);
/// assert_eq!(level, 1);
/// ```
pub fn map_clamped<T: FromRemapped>(
    x: f32,
    from_low: f32,
    from_high: f32,
    to_low: f32,
    to_high: f32,
) -> T {
    let clamped = constrain(x, from_low, from_high);
    T::from_remapped(map_value(clamped, from_low, from_high, to_low, to_high))
}
