use std::ops::Range;

/// Resolve an inclusive, possibly negative `[start, end]` index pair against
/// a collection of `len` items, the way `ZRANGE` does.
pub fn resolve(len: usize, start: i64, end: i64) -> Range<usize> {
    let len_i = len as i64;
    let start = if start < 0 { (len_i + start).max(0) } else { start };
    let end = if end < 0 { len_i + end } else { end.min(len_i - 1) };

    if len == 0 || start > end || start >= len_i {
        return 0..0;
    }
    start as usize..(end as usize + 1)
}
