//! Feature-gated switch between rayon and plain iteration.
//!
//! Realizations are embarrassingly parallel once each one owns its seed
//! substream, so the samplers and the propagation runner drive everything
//! through `into_par_iter()`. With the `parallel` feature off, a minimal
//! shim maps that call onto `into_iter()` and the rest of the chain
//! resolves to `Iterator` methods. Output is bitwise identical either way.

#[cfg(feature = "parallel")]
pub use rayon::iter::{IntoParallelIterator, ParallelIterator};

#[cfg(not(feature = "parallel"))]
pub trait IntoParallelIterator {
    type Iter;
    type Item;
    fn into_par_iter(self) -> Self::Iter;
}

#[cfg(not(feature = "parallel"))]
impl<I: IntoIterator> IntoParallelIterator for I {
    type Iter = I::IntoIter;
    type Item = I::Item;
    fn into_par_iter(self) -> Self::Iter {
        self.into_iter()
    }
}
