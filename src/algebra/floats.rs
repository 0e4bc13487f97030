#![allow(non_snake_case)]
use num_traits::{Float, FloatConst, FromPrimitive, NumAssign};
use std::fmt::{Debug, Display, LowerExp};

/// Main trait for floating point types used across the engine.
///
/// All floating point calculations are represented internally on values
/// implementing `FloatT`, with `f32` and `f64` the intended instantiations.
/// `FloatT` relies on [`num_traits`](num_traits) for most of its constituent
/// trait bounds.  `Send + Sync` are required so that iterates, factorizations
/// and problem data can be shared with the assembly worker pool.
pub trait FloatT:
    'static
    + Send
    + Sync
    + Float
    + FloatConst
    + NumAssign
    + Default
    + FromPrimitive
    + Display
    + LowerExp
    + Debug
    + std::iter::Sum
{
}

impl<T> FloatT for T where
    T: 'static
        + Send
        + Sync
        + Float
        + FloatConst
        + NumAssign
        + Default
        + FromPrimitive
        + Display
        + LowerExp
        + Debug
        + std::iter::Sum
{
}

/// Trait for converting Rust primitives to [`FloatT`](crate::algebra::FloatT)
///
/// Implemented on f32/64 and u32/64 so that constant primitives can be
/// written as `(2.0).as_T()` rather than the awful `T::from_f64(2.0).unwrap()`.
pub trait AsFloatT<T>: 'static {
    fn as_T(&self) -> T;
}

macro_rules! impl_as_FloatT {
    ($ty:ty, $ident:ident) => {
        impl<T> AsFloatT<T> for $ty
        where
            T: std::ops::Mul<T, Output = T> + FromPrimitive + 'static,
        {
            #[inline]
            fn as_T(&self) -> T {
                T::$ident(*self).unwrap()
            }
        }
    };
}
impl_as_FloatT!(u32, from_u32);
impl_as_FloatT!(u64, from_u64);
impl_as_FloatT!(usize, from_usize);
impl_as_FloatT!(f32, from_f32);
impl_as_FloatT!(f64, from_f64);
