use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::{CompactHeightfield, RegionId};

/// Fatal failures of [`CompactHeightfield::build_layer_regions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionBuildError {
    /// The monotone sweep produced more distinct regions than fit in the
    /// 15-bit region index space.
    #[error("monotone sweep produced {0} regions, which exceeds the 15-bit region id space")]
    TooManyRegions(u32),
}

/// No vertical neighbour has been observed yet for this sweep span.
const NEI_NONE: u16 = 0;
/// More than one distinct vertical neighbour was observed; the sweep span
/// cannot be folded into an existing region.
const NEI_AMBIGUOUS: u16 = u16::MAX;

/// Paints every walkable span in `[x0, x1) x [z0, z1)` with `id`, used to
/// anchor the four border strips before the interior sweep runs.
fn paint_border_strip(
    heightfield: &CompactHeightfield,
    src_region: &mut [RegionId],
    x0: u16,
    x1: u16,
    z0: u16,
    z1: u16,
    id: RegionId,
) {
    for z in z0..z1 {
        for x in x0..x1 {
            let cell = *heightfield.get_cell_at(x, z);
            for i in cell.index() as usize..(cell.index() + cell.count()) as usize {
                if heightfield.areas[i].is_walkable() {
                    src_region[i] = id;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SweepSpan {
    /// The final region id assigned to this sweep run.
    id: u16,
    /// The single region observed immediately below (in -z), if any.
    neighbour: u16,
    /// How many spans in this sweep run touched `neighbour`.
    sample_count: u16,
}

impl CompactHeightfield {
    /// Assigns every walkable span a region id using a monotone row sweep,
    /// then merges and filters the resulting regions.
    ///
    /// Each row is swept independently, inheriting region ids from the span
    /// immediately to the west (`-x`) and reconciling them against the row
    /// below (`-z`) via a per-row [`SweepSpan`] table. A sweep run keeps the
    /// neighbour's id only when every one of its spans agrees on exactly one
    /// neighbour; otherwise it receives a fresh id. This produces regions
    /// that are monotone along `x` within each row, with row-to-row merging
    /// handled by the bookkeeping above rather than a flood fill.
    pub fn build_layer_regions(
        &mut self,
        border_size: u16,
        min_region_area: u32,
    ) -> Result<(), RegionBuildError> {
        let width = self.width;
        let height = self.height;
        let mut src_region = vec![RegionId::NONE; self.spans.len()];
        let mut region_id: u32 = 1;

        if border_size > 0 {
            let bs = border_size.min(width).min(height);
            let strips = [
                (0, width, 0, bs),
                (0, width, height.saturating_sub(bs), height),
                (0, bs, 0, height),
                (width.saturating_sub(bs), width, 0, height),
            ];
            for (x0, x1, z0, z1) in strips {
                let mut id = RegionId::NONE.with_index(region_id as u16);
                id.insert(RegionId::BORDER);
                paint_border_strip(self, &mut src_region, x0, x1, z0, z1, id);
                region_id += 1;
            }
        }

        for z in border_size..height.saturating_sub(border_size) {
            let mut sweeps: Vec<SweepSpan> = vec![SweepSpan::default()];
            // Keyed by the *previous row's* final region id, which lives in
            // a different, already-compacted id space than this row's local
            // sweep indices, so this can't be a plain `Vec` sized to the row.
            let mut prev_count: std::collections::HashMap<u16, u32> = std::collections::HashMap::new();
            let mut row_id: u16 = 1;

            for x in border_size..width.saturating_sub(border_size) {
                let cell = *self.get_cell_at(x, z);
                for i in cell.index() as usize..(cell.index() + cell.count()) as usize {
                    if !self.areas[i].is_walkable() {
                        continue;
                    }

                    let mut sid = 0u16;
                    if let Some(west) = self.neighbour_span_index(x, z, i, 0) {
                        if self.areas[west].is_walkable()
                            && self.areas[west] == self.areas[i]
                            && src_region[west] != RegionId::NONE
                            && !src_region[west].is_border()
                        {
                            sid = src_region[west].index();
                        }
                    }

                    if sid == 0 {
                        sid = row_id;
                        row_id += 1;
                        sweeps.push(SweepSpan::default());
                        debug_assert_eq!(sweeps.len() as u16, sid + 1);
                    }

                    if let Some(south) = self.neighbour_span_index(x, z, i, 3) {
                        let south_region = src_region[south].index();
                        if south_region != 0
                            && south_region != sid
                            && self.areas[south].is_walkable()
                            && self.areas[south] == self.areas[i]
                            && !src_region[south].is_border()
                        {
                            let entry = &mut sweeps[sid as usize];
                            if entry.neighbour == NEI_NONE || entry.neighbour == south_region {
                                if entry.neighbour == NEI_NONE {
                                    entry.neighbour = south_region;
                                }
                                entry.sample_count += 1;
                                *prev_count.entry(south_region).or_insert(0) += 1;
                            } else {
                                entry.neighbour = NEI_AMBIGUOUS;
                            }
                        }
                    }

                    src_region[i] = RegionId::NONE.with_index(sid);
                }
            }

            for sweep in sweeps.iter_mut().skip(1) {
                let reuse = sweep.neighbour != NEI_AMBIGUOUS
                    && sweep.neighbour != NEI_NONE
                    && prev_count.get(&sweep.neighbour).copied().unwrap_or(0) == sweep.sample_count as u32;
                sweep.id = if reuse {
                    sweep.neighbour
                } else {
                    let id = region_id as u16;
                    region_id += 1;
                    id
                };
            }

            for x in border_size..width.saturating_sub(border_size) {
                let cell = *self.get_cell_at(x, z);
                for i in cell.index() as usize..(cell.index() + cell.count()) as usize {
                    let local = src_region[i].index();
                    if local > 0 && (local as usize) < sweeps.len() {
                        src_region[i] = RegionId::NONE.with_index(sweeps[local as usize].id);
                    }
                }
            }
        }

        if region_id > RegionId::ID_MASK as u32 + 1 {
            return Err(RegionBuildError::TooManyRegions(region_id));
        }

        debug!(regions = region_id - 1, "monotone sweep assigned regions");

        for (i, span) in self.spans.iter_mut().enumerate() {
            span.region = src_region[i];
        }

        self.merge_and_filter_layer_regions(region_id, min_region_area);
        Ok(())
    }

    /// Merges regions smaller than `min_region_area` into a connected
    /// neighbour, then compacts the surviving ids to a dense `1..=n` range.
    ///
    /// A region is eligible for merging into a neighbour only if the two
    /// never appear stacked in the same `(x, z)` column at different
    /// heights: that would mean the merged region touches itself through an
    /// overhang, which later stages cannot represent. Regions touching the
    /// tile border are never discarded regardless of size, since trimming
    /// them would falsify adjacent tiles' region coverage.
    fn merge_and_filter_layer_regions(&mut self, region_count: u32, min_region_area: u32) {
        let region_count = region_count as usize;
        if region_count <= 1 {
            return;
        }

        let mut span_count = vec![0u32; region_count];
        let mut connections: Vec<HashSet<u16>> = vec![HashSet::new(); region_count];
        let mut floors: Vec<HashSet<u16>> = vec![HashSet::new(); region_count];
        let mut is_border = vec![false; region_count];

        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.get_cell_at(x, z);
                let start = cell.index() as usize;
                let end = start + cell.count() as usize;

                let column_regions: Vec<u16> = (start..end)
                    .map(|i| self.spans[i].region.index())
                    .filter(|&r| r != 0)
                    .collect();
                for (pos, &r) in column_regions.iter().enumerate() {
                    for (other_pos, &other) in column_regions.iter().enumerate() {
                        if pos != other_pos && other != r {
                            floors[r as usize].insert(other);
                        }
                    }
                }

                for i in start..end {
                    let region = self.spans[i].region;
                    let r = region.index();
                    if r == 0 {
                        continue;
                    }
                    span_count[r as usize] += 1;
                    if region.is_border() {
                        is_border[r as usize] = true;
                    }
                    for direction in 0..4u8 {
                        if let Some(ni) = self.neighbour_span_index(x, z, i, direction) {
                            let nr = self.spans[ni].region.index();
                            if nr != 0 && nr != r {
                                connections[r as usize].insert(nr);
                            }
                        }
                    }
                }
            }
        }

        // A region that merely connects to a border region also counts as
        // "touching the border" for the size filter below, even though none
        // of its own spans carry the `BORDER` flag.
        for r in 1..region_count {
            if is_border[r] {
                continue;
            }
            if connections[r].iter().any(|&n| is_border[n as usize]) {
                is_border[r] = true;
            }
        }

        let mut remap: Vec<u16> = (0..region_count as u16).collect();
        let find = |remap: &[u16], mut r: u16| -> u16 {
            while remap[r as usize] != r {
                r = remap[r as usize];
            }
            r
        };

        for r in 1..region_count {
            if span_count[r] == 0 || is_border[r] || span_count[r] as u32 >= min_region_area {
                continue;
            }
            let candidate = connections[r]
                .iter()
                .copied()
                .filter(|&n| n != 0 && !floors[r].contains(&n))
                .max_by_key(|&n| span_count[n as usize]);
            match candidate {
                Some(target) => {
                    let root_target = find(&remap, target);
                    remap[r] = root_target;
                    trace!(region = r, merged_into = root_target, "merged small region");
                }
                None => {
                    warn!(region = r, span_count = span_count[r], "could not merge undersized region, keeping as-is");
                }
            }
        }

        let mut dense: Vec<u16> = vec![0; region_count];
        let mut next_id: u16 = 1;
        for r in 1..region_count {
            let root = find(&remap, r as u16);
            if span_count[root as usize] == 0 {
                continue;
            }
            if dense[root as usize] == 0 {
                dense[root as usize] = next_id;
                next_id += 1;
            }
        }

        for span in self.spans.iter_mut() {
            let r = span.region.index();
            if r == 0 {
                continue;
            }
            let root = find(&remap, r);
            let new_id = dense[root as usize];
            let border = span.region.is_border();
            span.region = RegionId::NONE.with_index(new_id);
            if border {
                span.region.insert(RegionId::BORDER);
            }
        }

        self.max_region = RegionId::NONE.with_index(next_id.saturating_sub(1));
        debug!(final_regions = next_id - 1, "merged and filtered layer regions");
    }
}
