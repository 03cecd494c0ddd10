pub mod math;
pub mod version;

pub use math::vector2::Vector2;
pub use version::{VersionNumber, VersionRange};

/// The minimum number of bits required to represent this number.
#[inline]
pub fn encompassing_bits(count: usize) -> u8 {
    if count == 1 {
        1
    } else {
        count.ilog2() as u8 + if count.is_power_of_two() { 0 } else { 1 }
    }
}
