//! Range reduction
//!
//! The browser reports coverage as nested ranges: a function body with a hit
//! count, blocks inside it with their own counts, and so on. What callers want
//! is the flat list of byte spans that actually ran.
//!
//! ```text
//! input:   [0..................10) count 1
//!                [3.....6)           count 0
//! output:  [0....3)      [6.....10)
//! ```
//!
//! The reduction is a sweep over range endpoints with a stack of active hit
//! counts. The top of the stack is the count of the innermost open range.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A half-open span `[start, end)` with the number of times it executed.
///
/// Field names on the wire follow the profiler's `startOffset`/`endOffset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRange {
    #[serde(rename = "startOffset")]
    pub start: usize,
    #[serde(rename = "endOffset")]
    pub end: usize,
    pub count: u64,
}

impl CoverageRange {
    pub fn new(start: usize, end: usize, count: u64) -> Self {
        Self { start, end, count }
    }

    fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// A span of source text that executed at least once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsedRange {
    pub start: usize,
    pub end: usize,
}

impl UsedRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    // Declaration order is sort order: closings come first at a shared offset
    End,
    Start,
}

struct Point<'a> {
    offset: usize,
    edge: Edge,
    range: &'a CoverageRange,
}

fn compare_points(a: &Point<'_>, b: &Point<'_>) -> Ordering {
    a.offset
        .cmp(&b.offset)
        .then_with(|| a.edge.cmp(&b.edge))
        .then_with(|| match a.edge {
            // Outer ranges open before inner ones...
            Edge::Start => b.range.width().cmp(&a.range.width()),
            // ...and close after them
            Edge::End => a.range.width().cmp(&b.range.width()),
        })
}

/// Collapse possibly nested, overlapping ranges into the sorted, disjoint
/// spans whose innermost hit count is non-zero.
///
/// Spans narrower than two units are dropped; they are boundary artifacts of
/// the instrumentation rather than real code.
pub fn reduce(ranges: &[CoverageRange]) -> Vec<UsedRange> {
    let mut points: Vec<Point<'_>> = Vec::with_capacity(ranges.len() * 2);
    for range in ranges {
        points.push(Point {
            offset: range.start,
            edge: Edge::Start,
            range,
        });
        points.push(Point {
            offset: range.end,
            edge: Edge::End,
            range,
        });
    }
    // Stable: identical points keep input order
    points.sort_by(compare_points);

    let mut counts: Vec<u64> = Vec::new();
    let mut used: Vec<UsedRange> = Vec::new();
    let mut last_offset = 0;

    for point in &points {
        if let Some(&top) = counts.last() {
            if top > 0 && last_offset < point.offset {
                match used.last_mut() {
                    Some(prev) if prev.end == last_offset => prev.end = point.offset,
                    _ => used.push(UsedRange::new(last_offset, point.offset)),
                }
            }
        }
        last_offset = point.offset;
        match point.edge {
            Edge::Start => counts.push(point.range.count),
            Edge::End => {
                counts.pop();
            }
        }
    }

    used.retain(|range| range.len() > 1);
    used
}
