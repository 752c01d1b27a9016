//! Offset to line table.
//!
//! The table is a sequence of `(byte_delta, line_delta)` byte pairs. Summing
//! the pairs in order gives the (offset, line) points where the source line
//! changes. Both deltas are capped at 127 per pair; larger steps are split
//! over several pairs.

use crate::widen::UNIT;

/// Largest delta a single pair carries.
pub const MAX_DELTA: usize = 127;

/// Encode per-instruction lines into a delta table.
///
/// `lines` holds one entry per emitted instruction; `None` marks a
/// synthesized instruction with no source line of its own. The line stored
/// for an instruction is its listing line plus `header_offset`.
///
/// A line change is placed at the start of the run of synthesized
/// instructions preceding its instruction, so a prefix reports the line of
/// the instruction it widens. The first pair always starts at offset 0.
pub fn encode(lines: &[Option<usize>], header_offset: usize) -> Vec<u8> {
    let mut table = vec![];
    let mut gap = 0;
    let mut dist = UNIT as usize;
    let mut last = 0;

    for line in lines {
        let Some(line) = line else {
            dist += UNIT as usize;
            continue;
        };
        let entry = line + header_offset;
        push(&mut table, gap, entry.saturating_sub(last));
        last = entry;
        gap = dist;
        dist = UNIT as usize;
    }
    table
}

/// Append one line change, chunked so no delta exceeds [`MAX_DELTA`].
/// The byte gap rides on the first line piece.
fn push(table: &mut Vec<u8>, mut gap: usize, mut delta: usize) {
    while gap > MAX_DELTA {
        table.extend([MAX_DELTA as u8, 0]);
        gap -= MAX_DELTA;
    }
    loop {
        let step = delta.min(MAX_DELTA);
        table.extend([gap as u8, step as u8]);
        gap = 0;
        delta -= step;
        if delta == 0 {
            break;
        }
    }
}

/// Line of the instruction at `offset`: walk the pairs until the running
/// offset passes `offset`, returning the line reached so far.
pub fn lookup(table: &[u8], first_line: usize, offset: u32) -> usize {
    let mut line = first_line;
    let mut addr: u32 = 0;
    for pair in table.chunks_exact(2) {
        addr += pair[0] as u32;
        if addr > offset {
            break;
        }
        line += pair[1] as usize;
    }
    line
}
