use serde::Serialize;

/// Price quote for a single lot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub predicted_unit_price: f64,
    pub nett_quantity: f64,
    pub predicted_amount: f64,
}

/// Combine a raw model price with the lot quantities.
///
/// The amount is computed from the unrounded unit price and rounded once.
pub fn quote(unit_price: f64, bag_weight: f64, no_of_bags: u32) -> PriceQuote {
    let nett_quantity = f64::from(no_of_bags) * bag_weight;
    PriceQuote {
        predicted_unit_price: round_cents(unit_price),
        nett_quantity,
        predicted_amount: round_cents(unit_price * nett_quantity),
    }
}

/// Round to two decimal places on the exact binary value, ties to even, so
/// `963.125` becomes `963.12`. `-0.0` collapses to `0.0`.
pub fn round_cents(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = format!("{value:.2}").parse::<f64>().unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
