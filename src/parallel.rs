//! Parallel iteration abstraction for the pixel batch driver.
//!
//! With the `parallel` feature (default) pixels are dispatched through rayon.
//! Without it, or on targets without threads, the same code runs
//! sequentially. Per-pixel computations never use this module; only the
//! batch layer does.
//!
//! ```ignore
//! use crate::iter_maybe_parallel;
//!
//! let rows: Vec<_> = iter_maybe_parallel!(0..n_pixels)
//!     .map(|i| process(i))
//!     .collect();
//! ```

/// Conditionally parallel iteration over ranges or owned collections.
///
/// When the `parallel` feature is enabled, uses `into_par_iter()`.
/// Otherwise, uses `into_iter()` for sequential execution. `collect()` keeps
/// input order in both cases.
#[macro_export]
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

pub use iter_maybe_parallel;
