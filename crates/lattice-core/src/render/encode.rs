//! Run encoder: marks maximal runs of same-colored cells.
//!
//! A single walk stamps [`CellFlags::ENCODE_START`] and
//! [`CellFlags::ENCODE_END`] so the serializer can emit one SGR pair per
//! run instead of per cell. Runs never span cells whose foreground or
//! background differ.

use crate::cell::{Cell, CellFlags};

/// Mark encode boundaries over a flat cell buffer. Existing markers are
/// cleared first; the buffer may come from a previous cycle.
pub fn encode(buffer: &mut [Cell]) {
    if buffer.is_empty() {
        return;
    }
    for cell in buffer.iter_mut() {
        cell.reset_encoding();
    }
    let last = buffer.len() - 1;
    buffer[0].flags.insert(CellFlags::ENCODE_START);
    buffer[last].flags.insert(CellFlags::ENCODE_END);
    if buffer.len() == 1 {
        buffer[0].flags.insert(CellFlags::ENCODE_END);
        return;
    }

    for index in 1..last {
        let same_as_previous = buffer[index].same_colors(&buffer[index - 1]);
        let same_as_next = buffer[index].same_colors(&buffer[index + 1]);

        // A cell that does not share colors with its successor closes a run.
        if !same_as_next {
            buffer[index].flags.insert(CellFlags::ENCODE_END);
        }
        // A cell that does not share colors with its predecessor opens one.
        if !same_as_previous {
            buffer[index].flags.insert(CellFlags::ENCODE_START);
        }
    }

    // If the second-to-last cell closed a run, the last cell stands alone.
    if buffer[last - 1].flags.contains(CellFlags::ENCODE_END)
        && !buffer[last].same_colors(&buffer[last - 1])
    {
        buffer[last].flags.insert(CellFlags::ENCODE_START);
    }
}

/// Decode the run markers back into `(start, end)` index pairs (inclusive).
/// Used by tests to check the encoding round-trips.
pub fn decode_runs(buffer: &[Cell]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (index, cell) in buffer.iter().enumerate() {
        if cell.flags.contains(CellFlags::ENCODE_START) && open.is_none() {
            open = Some(index);
        }
        if cell.flags.contains(CellFlags::ENCODE_END) {
            if let Some(start) = open.take() {
                runs.push((start, index));
            }
        }
    }
    runs
}
