//! A sparse set of pixels on the desktop, used for damage tracking, window
//! visibility and clipping.
//!
//! The region is stored as disjoint horizontal rows ordered from top to
//! bottom, each carrying a sorted list of non-touching spans. Adjacent rows
//! with identical spans are coalesced, which keeps the representation
//! canonical: two regions cover the same pixels if and only if their row
//! structure is identical.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::geometry::DesktopRect;

/// A horizontal run of pixels `[left, right)` inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    left: i32,
    right: i32,
}

/// A band of rows `[top, bottom)` sharing the same set of spans.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    top: i32,
    bottom: i32,
    spans: Vec<Span>,
}

impl Row {
    fn new(top: i32, bottom: i32) -> Self {
        Self {
            top,
            bottom,
            spans: Vec::new(),
        }
    }
}

/// A 2D region of the integer plane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopRegion {
    // Rows keyed by their bottom coordinate, so a range query for "first row
    // whose bottom is above y" is a single tree lookup.
    rows: BTreeMap<i32, Row>,
}

impl DesktopRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: DesktopRect) -> Self {
        let mut region = Self::new();
        region.add_rect(&rect);
        region
    }

    pub fn from_rects(rects: &[DesktopRect]) -> Self {
        let mut region = Self::new();
        region.add_rects(rects);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn set_rect(&mut self, rect: DesktopRect) {
        self.clear();
        self.add_rect(&rect);
    }

    pub fn add_rect(&mut self, rect: &DesktopRect) {
        if rect.is_empty() {
            return;
        }

        // Top of the part of `rect` that has not been inserted yet; advances
        // row by row until it reaches `rect.bottom()`.
        let mut top = rect.top();
        while top < rect.bottom() {
            let next = self
                .rows
                .range((Bound::Excluded(top), Bound::Unbounded))
                .next()
                .map(|(&key, row)| (key, row.top));

            let key = match next {
                None => {
                    // Nothing below: the rest of the rect becomes one new row.
                    let bottom = rect.bottom();
                    self.rows.insert(bottom, Row::new(top, bottom));
                    bottom
                }
                Some((_, row_top)) if top < row_top => {
                    // A gap above the next row; fill it up to that row.
                    let bottom = rect.bottom().min(row_top);
                    self.rows.insert(bottom, Row::new(top, bottom));
                    bottom
                }
                Some((key, row_top)) if top > row_top => {
                    // `top` falls inside an existing row: split it so the
                    // lower part starts exactly at `top`.
                    let spans = self.rows[&key].spans.clone();
                    self.rows.insert(
                        top,
                        Row {
                            top: row_top,
                            bottom: top,
                            spans,
                        },
                    );
                    self.rows.get_mut(&key).unwrap().top = top;
                    key
                }
                Some((key, _)) => key,
            };

            // If the rect ends inside this row, split off the part below.
            let key = {
                let row_bottom = self.rows[&key].bottom;
                if rect.bottom() < row_bottom {
                    let spans = self.rows[&key].spans.clone();
                    self.rows.get_mut(&key).unwrap().top = rect.bottom();
                    self.rows.insert(
                        rect.bottom(),
                        Row {
                            top,
                            bottom: rect.bottom(),
                            spans,
                        },
                    );
                    rect.bottom()
                } else {
                    key
                }
            };

            {
                let row = self.rows.get_mut(&key).unwrap();
                Self::add_span_to_row(row, rect.left(), rect.right());
                top = row.bottom;
            }
            self.merge_with_preceding_row(key);
        }

        // The row right below the rect may have become identical to the last
        // one we touched.
        let following = self
            .rows
            .range((Bound::Excluded(top), Bound::Unbounded))
            .next()
            .map(|(&key, _)| key);
        if let Some(key) = following {
            self.merge_with_preceding_row(key);
        }
    }

    pub fn add_rects(&mut self, rects: &[DesktopRect]) {
        for rect in rects {
            self.add_rect(rect);
        }
    }

    pub fn add_region(&mut self, region: &DesktopRegion) {
        for rect in region.iter() {
            self.add_rect(&rect);
        }
    }

    /// Replaces this region with the intersection of `region1` and `region2`.
    pub fn intersect(&mut self, region1: &DesktopRegion, region2: &DesktopRegion) {
        self.clear();
        if region1.rows.is_empty() || region2.rows.is_empty() {
            return;
        }
        for (top, bottom) in strip_boundaries(&[region1, region2]) {
            let (Some(a), Some(b)) = (region1.row_at(top), region2.row_at(top)) else {
                continue;
            };
            let spans = intersect_spans(&a.spans, &b.spans);
            if !spans.is_empty() {
                self.append_row(top, bottom, spans);
            }
        }
    }

    pub fn intersect_with(&mut self, region: &DesktopRegion) {
        let old = std::mem::take(self);
        self.intersect(&old, region);
    }

    pub fn intersect_with_rect(&mut self, rect: &DesktopRect) {
        let region = DesktopRegion::from_rect(*rect);
        self.intersect_with(&region);
    }

    pub fn subtract(&mut self, region: &DesktopRegion) {
        if self.rows.is_empty() || region.rows.is_empty() {
            return;
        }
        let mut result = DesktopRegion::new();
        for (top, bottom) in strip_boundaries(&[&*self, region]) {
            let Some(row) = self.row_at(top) else { continue };
            let spans = match region.row_at(top) {
                Some(hole) => subtract_spans(&row.spans, &hole.spans),
                None => row.spans.clone(),
            };
            if !spans.is_empty() {
                result.append_row(top, bottom, spans);
            }
        }
        *self = result;
    }

    pub fn subtract_rect(&mut self, rect: &DesktopRect) {
        let region = DesktopRegion::from_rect(*rect);
        self.subtract(&region);
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let rows = std::mem::take(&mut self.rows);
        for (_, mut row) in rows {
            row.top += dy;
            row.bottom += dy;
            if dx != 0 {
                for span in &mut row.spans {
                    span.left += dx;
                    span.right += dx;
                }
            }
            self.rows.insert(row.bottom, row);
        }
    }

    pub fn equals(&self, other: &DesktopRegion) -> bool {
        self == other
    }

    /// Iterates the canonical rectangle decomposition, top to bottom. Spans
    /// repeated across adjacent rows are fused into single taller rectangles,
    /// so no two emitted rectangles can be merged vertically.
    pub fn iter(&self) -> RegionIterator<'_> {
        RegionIterator {
            rows: self.rows.values().collect(),
            row_idx: 0,
            span_idx: 0,
        }
    }

    // The row covering the horizontal line at `y`, if any.
    fn row_at(&self, y: i32) -> Option<&Row> {
        self.rows
            .range((Bound::Excluded(y), Bound::Unbounded))
            .next()
            .map(|(_, row)| row)
            .filter(|row| row.top <= y)
    }

    // Appends a row known to lie below every existing one, fusing it into the
    // previous row when both are adjacent and carry the same spans.
    fn append_row(&mut self, top: i32, bottom: i32, spans: Vec<Span>) {
        if let Some((&last_key, last_row)) = self.rows.iter().next_back() {
            if last_key == top && last_row.spans == spans {
                let mut row = self.rows.remove(&last_key).unwrap();
                row.bottom = bottom;
                self.rows.insert(bottom, row);
                return;
            }
        }
        self.rows.insert(bottom, Row { top, bottom, spans });
    }

    fn merge_with_preceding_row(&mut self, key: i32) {
        let merge_from = {
            let Some(row) = self.rows.get(&key) else { return };
            match self.rows.range(..key).next_back() {
                Some((&prev_key, prev))
                    if prev.bottom == row.top && prev.spans == row.spans =>
                {
                    Some((prev_key, prev.top))
                }
                _ => None,
            }
        };
        if let Some((prev_key, prev_top)) = merge_from {
            self.rows.remove(&prev_key);
            self.rows.get_mut(&key).unwrap().top = prev_top;
        }
    }

    fn add_span_to_row(row: &mut Row, left: i32, right: i32) {
        // Fast path for rects inserted left to right.
        if row.spans.last().map_or(true, |last| left > last.right) {
            row.spans.push(Span { left, right });
            return;
        }

        // First span ending at or after `left`, and one past the last span
        // starting at or before `right`. Touching spans coalesce.
        let start = row.spans.partition_point(|s| s.right < left);
        let end = row.spans.partition_point(|s| s.left <= right);
        if end <= start {
            row.spans.insert(start, Span { left, right });
            return;
        }

        let merged = Span {
            left: left.min(row.spans[start].left),
            right: right.max(row.spans[end - 1].right),
        };
        row.spans[start] = merged;
        row.spans.drain(start + 1..end);
    }
}

fn span_in_row(row: &Row, span: Span) -> bool {
    row.spans
        .binary_search_by(|s| s.left.cmp(&span.left))
        .map(|idx| row.spans[idx] == span)
        .unwrap_or(false)
}

// All maximal y-intervals over which every listed region has a constant row
// structure.
fn strip_boundaries(regions: &[&DesktopRegion]) -> Vec<(i32, i32)> {
    let mut edges = BTreeSet::new();
    for region in regions {
        for row in region.rows.values() {
            edges.insert(row.top);
            edges.insert(row.bottom);
        }
    }
    let edges: Vec<i32> = edges.into_iter().collect();
    edges.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

fn intersect_spans(set1: &[Span], set2: &[Span]) -> Vec<Span> {
    let mut output = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < set1.len() && j < set2.len() {
        let left = set1[i].left.max(set2[j].left);
        let right = set1[i].right.min(set2[j].right);
        if left < right {
            output.push(Span { left, right });
        }
        if set1[i].right < set2[j].right {
            i += 1;
        } else {
            j += 1;
        }
    }
    output
}

// Parts of `set_a` not covered by `set_b`.
fn subtract_spans(set_a: &[Span], set_b: &[Span]) -> Vec<Span> {
    let mut output = Vec::new();
    let mut ib = 0;
    for a in set_a {
        if ib >= set_b.len() || a.right < set_b[ib].left {
            output.push(*a);
            continue;
        }

        let mut pos = a.left;
        while ib < set_b.len() && set_b[ib].left < a.right {
            let b = set_b[ib];
            if b.left > pos {
                output.push(Span {
                    left: pos,
                    right: b.left,
                });
            }
            if b.right > pos {
                pos = b.right;
                if pos >= a.right {
                    break;
                }
            }
            ib += 1;
        }
        if pos < a.right {
            output.push(Span {
                left: pos,
                right: a.right,
            });
        }
    }
    output
}

/// See [`DesktopRegion::iter`].
pub struct RegionIterator<'a> {
    rows: Vec<&'a Row>,
    row_idx: usize,
    span_idx: usize,
}

impl Iterator for RegionIterator<'_> {
    type Item = DesktopRect;

    fn next(&mut self) -> Option<DesktopRect> {
        loop {
            let row = *self.rows.get(self.row_idx)?;
            let Some(&span) = row.spans.get(self.span_idx) else {
                self.row_idx += 1;
                self.span_idx = 0;
                continue;
            };
            self.span_idx += 1;

            // Already emitted as part of a taller rectangle starting on an
            // earlier row.
            if self.row_idx > 0 {
                let prev = self.rows[self.row_idx - 1];
                if prev.bottom == row.top && span_in_row(prev, span) {
                    continue;
                }
            }

            // Fuse with matching spans on the rows directly below.
            let mut bottom = row.bottom;
            for below in &self.rows[self.row_idx + 1..] {
                if below.top != bottom || !span_in_row(below, span) {
                    break;
                }
                bottom = below.bottom;
            }
            return Some(DesktopRect::ltrb(span.left, row.top, span.right, bottom));
        }
    }
}

impl<'a> IntoIterator for &'a DesktopRegion {
    type Item = DesktopRect;
    type IntoIter = RegionIterator<'a>;

    fn into_iter(self) -> RegionIterator<'a> {
        self.iter()
    }
}
