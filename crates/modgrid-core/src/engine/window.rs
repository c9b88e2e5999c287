use crate::core::models::grid::Grid;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Smallest near-square shape with at least `needed` cells.
pub fn initial_shape(needed: usize) -> (usize, usize) {
    let needed = needed.max(1);
    let mut width = (needed as f64).sqrt().ceil() as usize;
    while width * width < needed {
        width += 1;
    }
    let height = needed.div_ceil(width);
    (width, height)
}

/// Picks the window the search should be confined to.
///
/// Starting from a near-square shape, every placement of the shape is scored by
/// how many `available` cells it covers, then by how many of those are
/// supercharged; earlier (row-major) placements win ties. The first shape with a
/// placement covering at least `needed` available cells is used. Height and
/// width grow alternately until the shape spans the grid. Returns `None` when
/// no window fits, in which case the caller keeps the whole region.
pub fn select_window(grid: &Grid, available: &[usize], needed: usize) -> Option<Window> {
    if needed == 0 || available.len() < needed {
        return None;
    }

    let mut mask = vec![false; grid.len()];
    for &index in available {
        mask[index] = true;
    }

    let (mut width, mut height) = initial_shape(needed);
    let mut grow_height = true;
    loop {
        let w = width.min(grid.width());
        let h = height.min(grid.height());
        if let Some(window) = best_placement(grid, &mask, w, h, needed) {
            debug!(
                x = window.x,
                y = window.y,
                width = window.width,
                height = window.height,
                "Selected search window."
            );
            return Some(window);
        }
        if w == grid.width() && h == grid.height() {
            return None;
        }
        if (grow_height && height < grid.height()) || width >= grid.width() {
            height += 1;
        } else {
            width += 1;
        }
        grow_height = !grow_height;
    }
}

fn best_placement(
    grid: &Grid,
    mask: &[bool],
    width: usize,
    height: usize,
    needed: usize,
) -> Option<Window> {
    let mut best: Option<(usize, usize, Window)> = None;
    for y in 0..=(grid.height() - height) {
        for x in 0..=(grid.width() - width) {
            let mut count = 0;
            let mut supercharged = 0;
            for wy in y..y + height {
                for wx in x..x + width {
                    let index = wy * grid.width() + wx;
                    if mask[index] {
                        count += 1;
                        if grid.cell_at(index).supercharged {
                            supercharged += 1;
                        }
                    }
                }
            }
            if count < needed {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_count, best_sc, _)) => {
                    (count, supercharged) > (*best_count, *best_sc)
                }
            };
            if better {
                best = Some((
                    count,
                    supercharged,
                    Window {
                        x,
                        y,
                        width,
                        height,
                    },
                ));
            }
        }
    }
    best.map(|(_, _, window)| window)
}

/// The `available` cells that fall inside `window`, in row-major order.
pub fn cells_in(grid: &Grid, available: &[usize], window: &Window) -> Vec<usize> {
    available
        .iter()
        .copied()
        .filter(|&index| {
            let (x, y) = grid.coords_of(index);
            window.contains(x, y)
        })
        .collect()
}
