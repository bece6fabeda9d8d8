use std::num::NonZeroUsize;

/// A contiguous slice of a listing and its zero-based page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    pub page: usize,
    pub items: Vec<T>,
}

/// Split `items` into pages of `page_size`, preserving order.
///
/// Only the last page may be short; an empty input produces no pages at all.
pub fn paginate<T: Clone>(items: &[T], page_size: NonZeroUsize) -> Vec<Chunk<T>> {
    items
        .chunks(page_size.get())
        .enumerate()
        .map(|(page, slice)| Chunk {
            page,
            items: slice.to_vec(),
        })
        .collect()
}
