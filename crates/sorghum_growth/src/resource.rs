use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Both components must exceed this for a bud to grow
pub const SUFFICIENT_THRESHOLD: f32 = 1.0;

/// Nutrient and carbon available to a plant or held by a bud
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceParcel {
    pub nutrient: f32,
    pub carbon: f32,
}

impl ResourceParcel {
    pub fn new(nutrient: f32, carbon: f32) -> Self {
        Self { nutrient, carbon }
    }

    pub fn is_enough(&self) -> bool {
        self.nutrient > SUFFICIENT_THRESHOLD && self.carbon > SUFFICIENT_THRESHOLD
    }

    /// Component-wise minimum
    pub fn capped(&self, cap: &ResourceParcel) -> ResourceParcel {
        ResourceParcel::new(self.nutrient.min(cap.nutrient), self.carbon.min(cap.carbon))
    }

    /// Component-wise, never below zero
    pub fn saturating_sub(&self, other: &ResourceParcel) -> ResourceParcel {
        ResourceParcel::new(
            (self.nutrient - other.nutrient).max(0.0),
            (self.carbon - other.carbon).max(0.0),
        )
    }
}

impl AddAssign for ResourceParcel {
    fn add_assign(&mut self, rhs: Self) {
        self.nutrient += rhs.nutrient;
        self.carbon += rhs.carbon;
    }
}

impl Add for ResourceParcel {
    type Output = ResourceParcel;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sub for ResourceParcel {
    type Output = ResourceParcel;

    fn sub(self, rhs: Self) -> Self::Output {
        ResourceParcel::new(self.nutrient - rhs.nutrient, self.carbon - rhs.carbon)
    }
}

impl Mul<f32> for ResourceParcel {
    type Output = ResourceParcel;

    fn mul(self, rhs: f32) -> Self::Output {
        ResourceParcel::new(self.nutrient * rhs, self.carbon * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_enough_needs_both() {
        assert!(ResourceParcel::new(1.5, 1.5).is_enough());
        assert!(!ResourceParcel::new(1.0, 5.0).is_enough());
        assert!(!ResourceParcel::new(5.0, 0.5).is_enough());
        assert!(!ResourceParcel::default().is_enough());
    }

    #[test]
    fn test_accumulates() {
        let mut parcel = ResourceParcel::new(0.5, 0.75);
        parcel += ResourceParcel::new(0.75, 0.5);
        assert_eq!(parcel, ResourceParcel::new(1.25, 1.25));
        assert!(parcel.is_enough());
        assert_eq!(parcel * 2.0, ResourceParcel::new(2.5, 2.5));
    }

    #[test]
    fn test_capped_and_saturating_sub() {
        let pool = ResourceParcel::new(5_000_000.0, 3.0);
        let capped = pool.capped(&ResourceParcel::new(10.0, 10.0));
        assert_eq!(capped, ResourceParcel::new(10.0, 3.0));
        assert_eq!(
            capped.saturating_sub(&ResourceParcel::new(4.0, 4.0)),
            ResourceParcel::new(6.0, 0.0)
        );
    }
}
