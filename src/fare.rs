//! Fare calculation: distance × seat-class unit price × train-type coefficient.

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is kept to the cent.
pub const FARE_SCALE: u32 = 2;

/// Computes the fare for a cumulative distance.
///
/// The product is rounded to cents half-up (0.005 → 0.01).
///
/// # Panics
///
/// Panics if `distance_km` is negative or if `unit_price` or `coefficient` is
/// not strictly positive.
pub fn fare(distance_km: Decimal, unit_price: Decimal, coefficient: Decimal) -> Decimal {
    assert!(
        distance_km >= Decimal::ZERO,
        "distance must not be negative, got {distance_km}"
    );
    assert!(unit_price > Decimal::ZERO, "unit price must be positive, got {unit_price}");
    assert!(coefficient > Decimal::ZERO, "coefficient must be positive, got {coefficient}");

    let raw = distance_km * unit_price * coefficient;
    let mut rounded = raw.round_dp_with_strategy(FARE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(FARE_SCALE);
    rounded
}
