//! The fundamental unit of time in the emulator.

/// A count of CPU cycles.
///
/// Instructions report their cost in cycles and timers consume cycles.
/// Converting to seconds needs an [`Oscillator`](crate::Oscillator), because
/// the guest can change its clock source at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u8> for Ticks {
    fn from(cycles: u8) -> Self {
        Self(u64::from(cycles))
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl core::iter::Sum for Ticks {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, t| acc + t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_saturates() {
        assert_eq!(Ticks::new(3) - Ticks::new(5), Ticks::ZERO);
    }

    #[test]
    fn sums_instruction_costs() {
        let total: Ticks = [1u8, 2, 7].into_iter().map(Ticks::from).sum();
        assert_eq!(total.get(), 10);
    }
}
