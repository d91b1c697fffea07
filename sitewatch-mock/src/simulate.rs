use std::f64::consts::PI;

use rand::Rng;

/// Indoor temperature in °C over a day: coolest before dawn, warmest mid
/// afternoon.
pub fn simulated_temperature(day_fraction: f64) -> f64 {
    let radians = (day_fraction - 0.375) * 2.0 * PI;

    20.0 + radians.sin() * 4.0
}

pub fn simulated_humidity(day_fraction: f64) -> f64 {
    let radians = day_fraction * 2.0 * PI;

    if (0.3..=0.7).contains(&day_fraction) {
        (radians.sin().max(0.0) * 25.0) + 35.0
    } else {
        (radians.cos().max(0.0) * 30.0) + 40.0
    }
}

/// Adds sensor noise and rounds to one decimal, like a cheap DHT reading.
pub fn jitter<R: Rng>(rng: &mut R, value: f64, spread: f64) -> f64 {
    let noisy = value + rng.random_range(-spread..=spread);

    (noisy * 10.0).round() / 10.0
}

pub fn day_fraction(tick: u32, cycle_ticks: u32) -> f64 {
    (tick % cycle_ticks) as f64 / cycle_ticks as f64
}
