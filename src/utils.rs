//! Utility functions for the mergbw-light-ble crate.

/// Largest brightness on the host scale.
pub const HOST_BRIGHTNESS_MAX: u16 = 255;

/// Scale a host brightness (0-255) linearly onto `0..=device_max`.
///
/// Out-of-range inputs are clamped to `device_max`. The result is truncated,
/// never rounded up.
///
/// # Example
///
/// ```
/// use mergbw_light_ble::utils::scale_brightness;
///
/// assert_eq!(scale_brightness(255, 100), 100);
/// assert_eq!(scale_brightness(128, 100), 50);
/// assert_eq!(scale_brightness(400, 100), 100);
/// ```
#[inline]
pub fn scale_brightness(brightness: u16, device_max: u16) -> u16 {
    let scaled = u32::from(brightness) * u32::from(device_max) / u32::from(HOST_BRIGHTNESS_MAX);
    scaled.min(u32::from(device_max)) as u16
}

/// Convert an RGB colour to hue and saturation, discarding value.
///
/// Both results are fractions in `[0, 1)` and `[0, 1]` respectively.
/// Greys (including black) have hue and saturation 0.
///
/// # Example
///
/// ```
/// use mergbw_light_ble::utils::rgb_to_hue_saturation;
///
/// let (hue, sat) = rgb_to_hue_saturation(0, 255, 0);
/// assert!((hue - 1.0 / 3.0).abs() < 1e-9);
/// assert_eq!(sat, 1.0);
/// ```
pub fn rgb_to_hue_saturation(r: u8, g: u8, b: u8) -> (f64, f64) {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    if max == min {
        return (0.0, 0.0);
    }

    let range = max - min;
    let saturation = range / max;

    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;

    let hue = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    ((hue / 6.0).rem_euclid(1.0), saturation)
}
