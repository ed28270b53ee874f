//! In-register transpose by pairwise swaps
//! 
//! A tile of `rows x cols` registers holds logical values column-major: the
//! register at `(r, c)` holds value `r + c * rows`. Vectorized LDS stores want
//! each row to be a contiguous ascending run instead, e.g. for 2x4:
//! 
//! ```text
//!     0 2 4 6        0 1 2 3
//!     1 3 5 7   =>   4 5 6 7
//! ```
//! 
//! [`SwapPlan`] records, per row, the `v_swap_b32` exchanges that produce
//! that layout without scratch registers. The plan depends only on the shape;
//! callers replay it against their own register tile, interleaving each
//! row's swaps with the store of that row. A finished row does not always
//! land in its own register group: [`SwapPlan::bucket`] names the group
//! that holds it.

use crate::asm::{Offset, Sym};
use crate::emit::Emitter;
use crate::lds::DsWrite;
use igc_common::CodegenError;
use log::{debug, trace};

/// Swap work for one row of the tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSwap {
    /// The row already forms destination row `bucket`
    Unified { bucket: usize },
    /// `(origin, target)` value pairs to exchange, in order
    Swaps(Vec<(usize, usize)>),
}

impl RowSwap {
    pub fn pairs(&self) -> &[(usize, usize)] {
        match self {
            RowSwap::Unified { .. } => &[],
            RowSwap::Swaps(pairs) => pairs.as_slice(),
        }
    }
}

/// Destination rows not yet claimed by a finished row
struct BucketCursor {
    consumed: Vec<bool>,
    next: usize,
}

impl BucketCursor {
    fn new(rows: usize) -> Self {
        Self {
            consumed: vec![false; rows],
            next: 0,
        }
    }

    /// First unclaimed bucket; the cursor never moves backwards
    fn reserve(&mut self) -> Result<usize, CodegenError> {
        while self.next < self.consumed.len() && self.consumed[self.next] {
            self.next += 1;
        }
        if self.next == self.consumed.len() {
            return Err(CodegenError::internal("swap plan ran out of destination rows"));
        }
        Ok(self.next)
    }

    fn consume(&mut self, bucket: usize) {
        if let Some(slot) = self.consumed.get_mut(bucket) {
            *slot = true;
        }
    }
}

/// Column-major value layout of a `rows x cols` tile
pub fn initial_layout(rows: usize, cols: usize) -> Vec<Vec<usize>> {
    (0..rows)
        .map(|r| (0..cols).map(|c| r + c * rows).collect())
        .collect()
}

/// Whether `row` is already a usable vector without any swap
/// 
/// Every column must sit the same even distance from `[0, 1, .., cols-1]`.
fn row_is_unified(row: &[usize]) -> bool {
    let first = row[0];
    if first % 2 != 0 {
        return false;
    }
    row.iter().enumerate().all(|(c, &v)| v.abs_diff(c) == first)
}

/// Position of `value` among rows `from..`
fn locate(tile: &[Vec<usize>], value: usize, from: usize) -> Option<(usize, usize)> {
    tile.iter()
        .enumerate()
        .skip(from)
        .find_map(|(r, row)| row.iter().position(|&v| v == value).map(|c| (r, c)))
}

/// Register index `value` as a slot offset
fn slot_index(value: usize) -> Result<u32, CodegenError> {
    u32::try_from(value).map_err(|_| CodegenError::internal(format!("register index {} out of range", value)))
}

/// Shape-only transpose schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    rows: usize,
    cols: usize,
    entries: Vec<RowSwap>,
    /// Register group holding each finished row
    buckets: Vec<usize>,
}

impl SwapPlan {
    pub fn new(rows: usize, cols: usize) -> Result<Self, CodegenError> {
        if rows <= 1 || cols <= 1 {
            return Err(CodegenError::InvalidShape { rows, cols });
        }

        let mut tile = initial_layout(rows, cols);
        let mut buckets = BucketCursor::new(rows);
        let mut entries = Vec::with_capacity(rows);
        let mut finished = Vec::with_capacity(rows);

        for r in 0..rows {
            if row_is_unified(&tile[r]) {
                let bucket = tile[r][0] / cols;
                trace!("row {}: unified as destination row {}", r, bucket);
                buckets.consume(bucket);
                entries.push(RowSwap::Unified { bucket });
                finished.push(bucket);
                continue;
            }

            let bucket = buckets.reserve()?;
            let mut pairs = Vec::new();
            for c in 0..cols {
                let target = bucket * cols + c;
                let origin = tile[r][c];
                if origin == target {
                    continue;
                }
                let (tr, tc) = locate(&tile, target, r).ok_or_else(|| {
                    CodegenError::internal(format!(
                        "swap plan {}x{}: value {} not found at or below row {}",
                        rows, cols, target, r
                    ))
                })?;
                tile[tr][tc] = origin;
                tile[r][c] = target;
                pairs.push((origin, target));
            }
            trace!("row {}: {} swaps into destination row {}", r, pairs.len(), bucket);
            buckets.consume(bucket);
            entries.push(RowSwap::Swaps(pairs));
            finished.push(bucket);
        }

        let plan = Self {
            rows,
            cols,
            entries,
            buckets: finished,
        };
        debug!("swap plan {}x{}: {} swaps", rows, cols, plan.swap_count());
        Ok(plan)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn entries(&self) -> &[RowSwap] {
        &self.entries
    }

    /// Register group `g` (registers `g*cols ..`) that holds `row` once its swaps ran
    pub fn bucket(&self, row: usize) -> Option<usize> {
        self.buckets.get(row).copied()
    }

    pub fn swap_count(&self) -> usize {
        self.entries.iter().map(|e| e.pairs().len()).sum()
    }

    /// Replay the plan on a tile of values by exchanging value positions
    pub fn apply(&self, tile: &mut [Vec<usize>]) -> Result<(), CodegenError> {
        for entry in &self.entries {
            for &(a, b) in entry.pairs() {
                let pa = locate(tile, a, 0);
                let pb = locate(tile, b, 0);
                let ((ra, ca), (rb, cb)) = pa.zip(pb).ok_or_else(|| {
                    CodegenError::internal(format!("swap replay: tile lacks value {} or {}", a, b))
                })?;
                tile[ra][ca] = b;
                tile[rb][cb] = a;
            }
        }
        Ok(())
    }

    /// `v_swap_b32` instructions for `row`, registers named by value
    pub fn swap_instructions(&self, row: usize, src: &Sym) -> Result<Vec<String>, CodegenError> {
        let Some(entry) = self.entries.get(row) else {
            return Ok(Vec::new());
        };
        entry
            .pairs()
            .iter()
            .map(|&(a, b)| -> Result<String, CodegenError> {
                Ok(format!(
                    "v_swap_b32 v[{}], v[{}]",
                    src.slot(slot_index(a)?),
                    src.slot(slot_index(b)?)
                ))
            })
            .collect()
    }
}

/// Row-vectorized LDS store of a column-major register tile
/// 
/// Each row's swaps are issued right before that row's store, so the swap
/// latency hides behind the previous store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeStore {
    plan: SwapPlan,
    base_offset: u32,
    stride: u32,
}

impl TransposeStore {
    pub fn new(plan: SwapPlan, base_offset: u32, stride: u32) -> Self {
        Self {
            plan,
            base_offset,
            stride,
        }
    }

    /// Row `n` is written to `base + n * stride` from the register group
    /// the plan left it in.
    pub fn select(&self, e: &mut Emitter, v_sst: &Sym, v_src: &Sym) -> Result<Vec<String>, CodegenError> {
        let cols = self.plan.cols;
        let sst = DsWrite::new(slot_index(cols)?.saturating_mul(4))?;
        e.capture(|e| -> Result<(), CodegenError> {
            for n in 0..self.plan.rows {
                e.emit_all(self.plan.swap_instructions(n, v_src)?);
                let bucket = self.plan.bucket(n).ok_or_else(|| {
                    CodegenError::internal(format!("swap plan has no register group for row {}", n))
                })?;
                let row = i64::from(slot_index(n)?);
                let offset = Offset::Immediate(i64::from(self.base_offset) + row * i64::from(self.stride));
                trace!("transpose store: row {} from register group {}", n, bucket);
                e.emit(sst.render(&v_sst.base(), &v_src.slot(slot_index(bucket * cols)?), &offset));
            }
            Ok(())
        })
    }

    /// One issue per row store plus one per swap
    pub fn issues(&self) -> u32 {
        u32::try_from(self.plan.rows + self.plan.swap_count()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transposed(rows: usize, cols: usize) -> Vec<Vec<usize>> {
        let plan = SwapPlan::new(rows, cols).unwrap();
        let mut tile = initial_layout(rows, cols);
        plan.apply(&mut tile).unwrap();
        tile
    }

    #[test]
    fn test_initial_layout() {
        assert_eq!(initial_layout(2, 4), vec![vec![0, 2, 4, 6], vec![1, 3, 5, 7]]);
    }

    #[test]
    fn test_plan_2x4() {
        let plan = SwapPlan::new(2, 4).unwrap();
        assert_eq!(
            plan.entries(),
            &[
                RowSwap::Swaps(vec![(2, 1), (4, 2), (6, 3)]),
                RowSwap::Swaps(vec![(6, 5)]),
            ]
        );
        assert_eq!(plan.swap_count(), 4);
        assert_eq!(transposed(2, 4), vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn test_plan_4x4_unifies_last_row() {
        let plan = SwapPlan::new(4, 4).unwrap();
        assert_eq!(
            plan.entries(),
            &[
                RowSwap::Swaps(vec![(4, 1), (8, 2), (12, 3)]),
                RowSwap::Swaps(vec![(9, 6), (13, 7)]),
                RowSwap::Swaps(vec![(14, 11)]),
                RowSwap::Unified { bucket: 3 },
            ]
        );
        assert_eq!(
            transposed(4, 4),
            vec![
                vec![0, 1, 2, 3],
                vec![4, 5, 6, 7],
                vec![8, 9, 10, 11],
                vec![12, 13, 14, 15],
            ]
        );
    }

    #[test]
    fn test_plan_4x2_keeps_unified_rows_in_place() {
        let plan = SwapPlan::new(4, 2).unwrap();
        assert_eq!(
            plan.entries(),
            &[
                RowSwap::Swaps(vec![(4, 1)]),
                RowSwap::Unified { bucket: 2 },
                RowSwap::Swaps(vec![(6, 3)]),
                RowSwap::Unified { bucket: 3 },
            ]
        );
        assert_eq!(transposed(4, 2), vec![vec![0, 1], vec![4, 5], vec![2, 3], vec![6, 7]]);
        let buckets: Vec<_> = (0..4).map(|r| plan.bucket(r).unwrap()).collect();
        assert_eq!(buckets, vec![0, 2, 1, 3]);
        assert_eq!(plan.bucket(4), None);
        for entry in plan.entries() {
            if let RowSwap::Unified { .. } = entry {
                assert!(entry.pairs().is_empty());
            }
        }
    }

    #[test]
    fn test_every_row_becomes_a_vector() {
        for (rows, cols) in [(2, 2), (2, 8), (3, 3), (3, 5), (4, 8), (8, 4)] {
            let tile = transposed(rows, cols);
            let mut buckets: Vec<usize> = tile
                .iter()
                .map(|row| {
                    assert_eq!(row[0] % cols, 0, "{}x{}: {:?}", rows, cols, tile);
                    for (c, &v) in row.iter().enumerate() {
                        assert_eq!(v, row[0] + c, "{}x{}: {:?}", rows, cols, tile);
                    }
                    row[0] / cols
                })
                .collect();
            buckets.sort_unstable();
            assert_eq!(buckets, (0..rows).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_invalid_shapes() {
        assert_eq!(SwapPlan::new(1, 4), Err(CodegenError::InvalidShape { rows: 1, cols: 4 }));
        assert_eq!(SwapPlan::new(4, 1), Err(CodegenError::InvalidShape { rows: 4, cols: 1 }));
        assert_eq!(SwapPlan::new(1, 1), Err(CodegenError::InvalidShape { rows: 1, cols: 1 }));
    }

    #[test]
    fn test_plan_lookup_failure_is_internal_error() {
        // row 6 of 7x3 needs value 18, which an earlier row already took
        let err = SwapPlan::new(7, 3).unwrap_err();
        assert!(err.is_internal(), "{:?}", err);
        assert!(err.to_string().contains("value 18"), "{}", err);
    }

    #[test]
    fn test_replay_on_foreign_tile_is_internal_error() {
        let plan = SwapPlan::new(2, 2).unwrap();
        let mut tile = vec![vec![10, 11], vec![12, 13]];
        assert!(plan.apply(&mut tile).unwrap_err().is_internal());
    }

    #[test]
    fn test_swap_instructions() {
        let plan = SwapPlan::new(2, 4).unwrap();
        let src = Sym::new("v_src");
        assert_eq!(
            plan.swap_instructions(0, &src).unwrap(),
            vec![
                "v_swap_b32 v[v_src+2], v[v_src+1]",
                "v_swap_b32 v[v_src+4], v[v_src+2]",
                "v_swap_b32 v[v_src+6], v[v_src+3]",
            ]
        );
        assert_eq!(plan.swap_instructions(1, &src).unwrap(), vec!["v_swap_b32 v[v_src+6], v[v_src+5]"]);
        assert!(plan.swap_instructions(2, &src).unwrap().is_empty());
    }

    #[test]
    fn test_transpose_store_2x4() {
        let store = TransposeStore::new(SwapPlan::new(2, 4).unwrap(), 0, 1024);
        let mut e = Emitter::new();
        let lines = store.select(&mut e, &Sym::new("v_sst"), &Sym::new("v_src")).unwrap();
        assert_eq!(
            lines,
            vec![
                "v_swap_b32 v[v_src+2], v[v_src+1]",
                "v_swap_b32 v[v_src+4], v[v_src+2]",
                "v_swap_b32 v[v_src+6], v[v_src+3]",
                "ds_write_b128 v[v_sst], v[v_src:v_src+3]",
                "v_swap_b32 v[v_src+6], v[v_src+5]",
                "ds_write_b128 v[v_sst], v[v_src+4:v_src+4+3] offset:1024",
            ]
        );
        assert_eq!(store.issues(), lines.len() as u32);
    }

    #[test]
    fn test_transpose_store_4x2_follows_register_groups() {
        let store = TransposeStore::new(SwapPlan::new(4, 2).unwrap(), 0, 64);
        let mut e = Emitter::new();
        let lines = store.select(&mut e, &Sym::new("v_sst"), &Sym::new("v_src")).unwrap();
        assert_eq!(
            lines,
            vec![
                "v_swap_b32 v[v_src+4], v[v_src+1]",
                "ds_write_b64 v[v_sst], v[v_src:v_src+1]",
                "ds_write_b64 v[v_sst], v[v_src+4:v_src+4+1] offset:64",
                "v_swap_b32 v[v_src+6], v[v_src+3]",
                "ds_write_b64 v[v_sst], v[v_src+2:v_src+2+1] offset:128",
                "ds_write_b64 v[v_sst], v[v_src+6:v_src+6+1] offset:192",
            ]
        );
        assert_eq!(store.issues(), lines.len() as u32);
    }

    /// Replays the plan on registers holding `(row, col)` elements and checks
    /// that each store reads exactly its own row.
    #[test]
    fn test_stores_write_their_own_row() {
        for rows in 2..=16 {
            for cols in 2..=4 {
                let Ok(plan) = SwapPlan::new(rows, cols) else {
                    continue;
                };
                let mut regs: Vec<(usize, usize)> = (0..rows * cols).map(|i| (i % rows, i / rows)).collect();
                for n in 0..rows {
                    for &(a, b) in plan.entries()[n].pairs() {
                        regs.swap(a, b);
                    }
                    let base = plan.bucket(n).unwrap() * cols;
                    let expected: Vec<_> = (0..cols).map(|c| (n, c)).collect();
                    assert_eq!(regs[base..base + cols], expected[..], "{}x{} row {}", rows, cols, n);
                }
            }
        }
    }

    #[test]
    fn test_transpose_store_rejects_wide_rows() {
        let store = TransposeStore::new(SwapPlan::new(2, 8).unwrap(), 0, 64);
        let mut e = Emitter::new();
        let result = store.select(&mut e, &Sym::new("v_sst"), &Sym::new("v_src"));
        assert_eq!(result, Err(CodegenError::UnsupportedWidth(32)));
    }
}
