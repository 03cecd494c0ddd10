use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A horizontal (x, z) coordinate pair, used throughout the level to address
/// chunks and regions without pulling in a 3D vertical component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector2<T> {
    pub x: T,
    pub z: T,
}

impl<T> Vector2<T> {
    pub const fn new(x: T, z: T) -> Self {
        Self { x, z }
    }
}

impl<T: Add<Output = T>> Add for Vector2<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.z + rhs.z)
    }
}

impl<T: Sub<Output = T>> Sub for Vector2<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.z - rhs.z)
    }
}

impl Vector2<i32> {
    /// The region coordinate containing this chunk coordinate.
    pub const fn region(&self) -> Vector2<i32> {
        Vector2::new(self.x >> 5, self.z >> 5)
    }

    /// This chunk's position local to its region, each axis in `[0, 32)`.
    pub const fn local(&self) -> Vector2<u8> {
        Vector2::new((self.x & 31) as u8, (self.z & 31) as u8)
    }
}
