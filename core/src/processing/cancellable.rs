//! Loops that stop early once a run is cancelled or an item fails.

use crate::prelude::{CancelToken, FilterResult};
use rayon::prelude::*;

/// Sequential loop checking `token` before every item.
pub fn for_each_cancellable<I, F>(iter: I, token: &CancelToken, mut func: F) -> FilterResult<()>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> FilterResult<()>,
{
    for item in iter {
        token.check()?;
        func(item)?;
    }
    Ok(())
}

/// Parallel loop on the current rayon pool. Items not yet started when the
/// token flips are skipped and the loop returns `Cancelled`.
pub fn par_for_each_cancellable<I, F>(iter: I, token: &CancelToken, func: F) -> FilterResult<()>
where
    I: IntoParallelIterator,
    I::Item: Send,
    F: Fn(I::Item) -> FilterResult<()> + Sync + Send,
{
    iter.into_par_iter().try_for_each(|item| {
        token.check()?;
        func(item)
    })
}
