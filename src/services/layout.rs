//! Arrangement algorithms: pure `(objects, target ids, params) → objects`.
//!
//! Only targets move; everything else is returned untouched and in place.
//! Target ids that are not on the canvas are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::CanvasObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    #[serde(alias = "x", alias = "row", alias = "horizontally")]
    Horizontal,
    #[serde(alias = "y", alias = "column", alias = "vertically")]
    Vertical,
}

impl Axis {
    fn center(self, obj: &CanvasObject) -> f64 {
        match self {
            Self::Horizontal => obj.center_x(),
            Self::Vertical => obj.center_y(),
        }
    }

    fn half(self, obj: &CanvasObject) -> f64 {
        match self {
            Self::Horizontal => obj.width / 2.0,
            Self::Vertical => obj.height / 2.0,
        }
    }

    fn set_center(self, obj: &mut CanvasObject, center: f64) {
        match self {
            Self::Horizontal => obj.x = center - obj.width / 2.0,
            Self::Vertical => obj.y = center - obj.height / 2.0,
        }
    }

    fn cross(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

/// Positions of the targets in the order given by `ids`.
fn target_indices(objects: &[CanvasObject], ids: &[Uuid]) -> Vec<usize> {
    let index: HashMap<Uuid, usize> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id, i))
        .collect();
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(&i) = index.get(id) {
            if !seen.contains(&i) {
                seen.push(i);
            }
        }
    }
    seen
}

fn min_center(objects: &[CanvasObject], targets: &[usize], axis: Axis) -> f64 {
    targets
        .iter()
        .map(|&i| axis.center(&objects[i]))
        .fold(f64::INFINITY, f64::min)
}

// =============================================================================
// LINEAR
// =============================================================================

/// Lay targets out along `axis` in the given id order with `spacing` between
/// neighbouring edges. The first target keeps its main-axis position; the
/// cross axis is pinned to the smallest cross-axis center among targets.
#[must_use]
pub fn arrange_linear(objects: &[CanvasObject], ids: &[Uuid], axis: Axis, spacing: f64) -> Vec<CanvasObject> {
    let mut out = objects.to_vec();
    let targets = target_indices(&out, ids);
    if targets.is_empty() {
        return out;
    }

    let cross = axis.cross();
    let cross_center = min_center(&out, &targets, cross);

    let mut prev: Option<(f64, f64)> = None;
    for &i in &targets {
        let obj = &mut out[i];
        let half = axis.half(obj);
        let center = match prev {
            Some((prev_center, prev_half)) => prev_center + prev_half + spacing + half,
            None => axis.center(obj),
        };
        axis.set_center(obj, center);
        cross.set_center(obj, cross_center);
        prev = Some((center, half));
    }
    out
}

// =============================================================================
// GRID
// =============================================================================

/// Pack targets into rows starting at the targets' bounding-box minimum.
///
/// With `columns` set, each row holds that many targets. Otherwise a row
/// grows while its summed widths plus spacing stay within `max_row_width`
/// (a row always holds at least one target). Row height is the tallest
/// target in the row.
#[must_use]
pub fn arrange_grid(
    objects: &[CanvasObject],
    ids: &[Uuid],
    columns: Option<usize>,
    spacing: f64,
    max_row_width: f64,
) -> Vec<CanvasObject> {
    let mut out = objects.to_vec();
    let targets = target_indices(&out, ids);
    if targets.is_empty() {
        return out;
    }

    let origin_x = targets
        .iter()
        .map(|&i| out[i].x)
        .fold(f64::INFINITY, f64::min);
    let origin_y = targets
        .iter()
        .map(|&i| out[i].y)
        .fold(f64::INFINITY, f64::min);

    let mut rows: Vec<Vec<usize>> = Vec::new();
    match columns.filter(|&c| c > 0) {
        Some(cols) => rows.extend(targets.chunks(cols).map(<[usize]>::to_vec)),
        None => {
            let mut row: Vec<usize> = Vec::new();
            let mut row_width = 0.0;
            for &i in &targets {
                let width = out[i].width;
                let next_width = if row.is_empty() { width } else { row_width + spacing + width };
                if !row.is_empty() && next_width > max_row_width {
                    rows.push(std::mem::take(&mut row));
                    row_width = width;
                } else {
                    row_width = next_width;
                }
                row.push(i);
            }
            if !row.is_empty() {
                rows.push(row);
            }
        }
    }

    let mut y = origin_y;
    for row in rows {
        let mut x = origin_x;
        let mut row_height: f64 = 0.0;
        for i in row {
            let obj = &mut out[i];
            obj.x = x;
            obj.y = y;
            x += obj.width + spacing;
            row_height = row_height.max(obj.height);
        }
        y += row_height + spacing;
    }
    out
}

// =============================================================================
// DISTRIBUTE
// =============================================================================

/// Spread target centers evenly between the outermost two along `axis`, and
/// align every target's cross-axis center to the smallest one among them.
/// Fewer than three targets is a no-op.
#[must_use]
pub fn distribute_evenly(objects: &[CanvasObject], ids: &[Uuid], axis: Axis) -> Vec<CanvasObject> {
    let mut out = objects.to_vec();
    let mut targets = target_indices(&out, ids);
    if targets.len() < 3 {
        return out;
    }

    targets.sort_by(|&a, &b| axis.center(&out[a]).total_cmp(&axis.center(&out[b])));
    let first = axis.center(&out[targets[0]]);
    let last = axis.center(&out[targets[targets.len() - 1]]);
    let cross = axis.cross();
    let cross_center = min_center(&out, &targets, cross);

    #[allow(clippy::cast_precision_loss)]
    let step = (last - first) / (targets.len() - 1) as f64;
    let count = targets.len();
    for (n, &i) in targets.iter().enumerate() {
        let obj = &mut out[i];
        // Endpoints are pinned exactly rather than recomputed.
        if n != 0 && n != count - 1 {
            #[allow(clippy::cast_precision_loss)]
            let offset = step * n as f64;
            axis.set_center(obj, first + offset);
        }
        cross.set_center(obj, cross_center);
    }
    out
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
