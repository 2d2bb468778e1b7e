//! Field element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a field cell.
///
/// Bounds the types usable as cell values, ensuring they support the
/// numeric conversions the samplers and statistics need.
pub trait FieldElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Minimum value representable by this type
    fn min_value() -> Self;

    /// Maximum value representable by this type
    fn max_value() -> Self;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert an f64 into this type, `None` when the value does not fit
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_field_element_int {
    ($t:ty) => {
        impl FieldElement for $t {
            fn min_value() -> Self {
                <$t>::MIN
            }

            fn max_value() -> Self {
                <$t>::MAX
            }

            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_field_element_float {
    ($t:ty) => {
        impl FieldElement for $t {
            fn min_value() -> Self {
                <$t>::MIN
            }

            fn max_value() -> Self {
                <$t>::MAX
            }

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_field_element_int!(i8);
impl_field_element_int!(i16);
impl_field_element_int!(i32);
impl_field_element_int!(i64);
impl_field_element_int!(u8);
impl_field_element_int!(u16);
impl_field_element_int!(u32);
impl_field_element_int!(u64);
impl_field_element_float!(f32);
impl_field_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_conversions() {
        assert_eq!(<u16 as FieldElement>::from_f64(42.0), Some(42u16));
        assert_eq!(<u16 as FieldElement>::from_f64(-1.0), None);
        assert_eq!(<u16 as FieldElement>::from_f64(1e9), None);
        assert_eq!(42u16.to_f64(), Some(42.0));
    }

    #[test]
    fn test_float_nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
        assert!(!1.5f64.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn test_int_nodata_is_sentinel_only() {
        assert!(u16::MAX.is_nodata(Some(u16::MAX)));
        assert!(!0u16.is_nodata(Some(u16::MAX)));
        assert!(!u16::MAX.is_nodata(None));
    }
}
