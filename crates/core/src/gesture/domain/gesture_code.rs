use std::fmt;

/// Largest finger count a gesture can carry.
pub const MAX_FINGERS: u8 = 5;

/// The per-frame output consumed downstream: the number of extended fingers,
/// rendered as `"0"` through `"5"`. `"0"` means "no action".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GestureCode(u8);

impl GestureCode {
    pub const NONE: GestureCode = GestureCode(0);

    /// Counts above [`MAX_FINGERS`] saturate.
    pub fn from_count(count: u8) -> Self {
        Self(count.min(MAX_FINGERS))
    }

    pub fn count(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GestureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<GestureCode> for String {
    fn from(code: GestureCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0")]
    #[case(3, "3")]
    #[case(5, "5")]
    #[case(9, "5")]
    fn test_renders_clamped_count(#[case] count: u8, #[case] expected: &str) {
        assert_eq!(GestureCode::from_count(count).to_string(), expected);
    }

    #[test]
    fn test_none_is_zero() {
        assert!(GestureCode::NONE.is_none());
        assert_eq!(GestureCode::default(), GestureCode::NONE);
        assert!(!GestureCode::from_count(1).is_none());
    }
}
