//! Mask thinning and skeleton path extraction.
//!
//! Two thinning algorithms reduce a filled object mask to a roughly
//! 1-pixel-wide skeleton: Zhang-Suen neighborhood thinning (connected,
//! endpoint-preserving, the default) and an iterative morphological
//! erode/open/subtract skeleton. The longest path through the thinned mask
//! supplies both the curvilinear length and the ordered point sequence used
//! for curvature sampling.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use cucumeter_common::ThinningMethod;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

/// Integer step costs in milli-pixels, so path lengths stay exactly
/// comparable inside the priority queue.
const STEP_ORTHOGONAL: u64 = 1000;
const STEP_DIAGONAL: u64 = 1414;

/// Reduce a filled binary mask to a 1-pixel-wide skeleton.
/// An empty mask thins to an empty mask.
pub fn skeletonize(mask: &GrayImage, method: ThinningMethod) -> GrayImage {
    match method {
        ThinningMethod::ZhangSuen => zhang_suen(mask),
        ThinningMethod::Morphological => morphological_skeleton(mask),
    }
}

/// Classic two-subiteration thinning. Each pass peels removable boundary
/// pixels whose deletion preserves connectivity and endpoints; iteration
/// stops when a full pass removes nothing, so an already-thin skeleton is a
/// fixed point.
fn zhang_suen(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut grid: Vec<bool> = mask.pixels().map(|p| p[0] > 0).collect();
    if w < 3 || h < 3 {
        return to_image(&grid, w, h);
    }
    loop {
        let removed = thinning_pass(&mut grid, w as usize, h as usize, true)
            + thinning_pass(&mut grid, w as usize, h as usize, false);
        if removed == 0 {
            break;
        }
    }
    to_image(&grid, w, h)
}

fn thinning_pass(grid: &mut [bool], w: usize, h: usize, first_subiteration: bool) -> usize {
    let mut to_remove = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if !grid[idx] {
                continue;
            }
            // 8-neighborhood in ring order: N, NE, E, SE, S, SW, W, NW
            let p = [
                grid[idx - w],
                grid[idx - w + 1],
                grid[idx + 1],
                grid[idx + w + 1],
                grid[idx + w],
                grid[idx + w - 1],
                grid[idx - 1],
                grid[idx - w - 1],
            ];
            let neighbors = p.iter().filter(|&&v| v).count();
            if !(2..=6).contains(&neighbors) {
                continue;
            }
            let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
            if transitions != 1 {
                continue;
            }
            // p[0]=N, p[2]=E, p[4]=S, p[6]=W
            let removable = if first_subiteration {
                !(p[0] && p[2] && p[4]) && !(p[2] && p[4] && p[6])
            } else {
                !(p[0] && p[2] && p[6]) && !(p[0] && p[4] && p[6])
            };
            if removable {
                to_remove.push(idx);
            }
        }
    }
    for &idx in &to_remove {
        grid[idx] = false;
    }
    to_remove.len()
}

fn to_image(grid: &[bool], w: u32, h: u32) -> GrayImage {
    let mut out = GrayImage::new(w, h);
    for (i, &v) in grid.iter().enumerate() {
        if v {
            out.put_pixel(i as u32 % w, i as u32 / w, Luma([255u8]));
        }
    }
    out
}

/// Iterative morphological skeleton: each round accumulates the pixels the
/// cross-shaped opening removes, then continues from the eroded mask until
/// nothing is left. Cheap, but fragments are possible on noisy masks.
fn morphological_skeleton(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    // one-pixel background pad so blobs touching the mask edge still erode
    // and the loop is guaranteed to drain
    let mut work = GrayImage::new(w + 2, h + 2);
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] > 0 {
            work.put_pixel(x + 1, y + 1, Luma([255u8]));
        }
    }
    let mut skeleton = GrayImage::new(w + 2, h + 2);

    while work.pixels().any(|p| p[0] > 0) {
        let eroded = erode(&work, Norm::L1, 1);
        let opened = dilate(&eroded, Norm::L1, 1);
        for (x, y, px) in work.enumerate_pixels() {
            if px[0] > 0 && opened.get_pixel(x, y)[0] == 0 {
                skeleton.put_pixel(x, y, Luma([255u8]));
            }
        }
        work = eroded;
    }

    let mut out = GrayImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        *px = *skeleton.get_pixel(x + 1, y + 1);
    }
    out
}

/// Remove endpoint branches shorter than `max_branch_len` pixels that
/// terminate at a junction.
///
/// Thinning a wide blob leaves a diagonal spur at each corner; routing the
/// longest path through those spurs overstates curvilinear length by up to
/// one diameter. Branches that never reach a junction — the spine itself —
/// are kept regardless of length, so an unbranched skeleton passes through
/// unchanged.
pub fn prune_spurs(skeleton: &GrayImage, max_branch_len: u32) -> GrayImage {
    let (w, h) = skeleton.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let mut grid: Vec<bool> = skeleton.pixels().map(|p| p[0] > 0).collect();

    let neighbors = |grid: &[bool], x: i32, y: i32| -> Vec<(i32, i32)> {
        let mut out = Vec::with_capacity(8);
        for dy in -1..=1i32 {
            for dx in -1..=1i32 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && ny >= 0 && nx < wi && ny < hi && grid[(ny * wi + nx) as usize] {
                    out.push((nx, ny));
                }
            }
        }
        out
    };

    loop {
        let endpoints: Vec<(i32, i32)> = (0..hi)
            .flat_map(|y| (0..wi).map(move |x| (x, y)))
            .filter(|&(x, y)| grid[(y * wi + x) as usize] && neighbors(&grid, x, y).len() == 1)
            .collect();

        let mut removed = 0usize;
        for start in endpoints {
            if !grid[(start.1 * wi + start.0) as usize] {
                continue;
            }
            let nbrs = neighbors(&grid, start.0, start.1);
            if nbrs.len() != 1 {
                continue;
            }
            let mut branch = vec![start];
            let mut prev = start;
            let mut cur = nbrs[0];
            let mut junction = false;
            while branch.len() <= max_branch_len as usize {
                let nbrs = neighbors(&grid, cur.0, cur.1);
                if nbrs.len() >= 3 {
                    junction = true;
                    break;
                }
                branch.push(cur);
                match nbrs.into_iter().find(|&p| p != prev) {
                    Some(next) => {
                        prev = cur;
                        cur = next;
                    }
                    // open curve: ran off the other end, nothing to prune
                    None => break,
                }
            }
            if junction {
                for &(x, y) in &branch {
                    grid[(y * wi + x) as usize] = false;
                }
                removed += branch.len();
            }
        }
        if removed == 0 {
            break;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..hi {
        for x in 0..wi {
            if grid[(y * wi + x) as usize] {
                out.put_pixel(x as u32, y as u32, Luma([255u8]));
            }
        }
    }
    out
}

/// Foreground pixel coordinates of a thinned mask.
pub fn skeleton_points(skeleton: &GrayImage) -> Vec<(u32, u32)> {
    skeleton
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Ordered pixel path between the two most separated skeleton points.
#[derive(Debug, Clone)]
pub struct SkeletonPath {
    pub points: Vec<(u32, u32)>,
    /// Curvilinear length in pixels, diagonal steps weighted √2.
    pub length_px: f64,
}

/// Longest shortest-path through the skeleton, found with two farthest-point
/// sweeps over the 8-connected pixel graph. Returns `None` for an empty
/// skeleton.
///
/// On a disconnected skeleton only the component containing the scan-order
/// first pixel is traversed; the Zhang-Suen default never produces one for a
/// single blob.
pub fn longest_path(skeleton: &GrayImage) -> Option<SkeletonPath> {
    let points = skeleton_points(skeleton);
    let &start = points.first()?;

    let (tip_a, _, _) = farthest_from(skeleton, start);
    let (tip_b, distance, prev) = farthest_from(skeleton, tip_a);

    let w = skeleton.width() as usize;
    let mut path = Vec::new();
    let mut current = (tip_b.1 as usize) * w + tip_b.0 as usize;
    let start_idx = (tip_a.1 as usize) * w + tip_a.0 as usize;
    loop {
        path.push(((current % w) as u32, (current / w) as u32));
        if current == start_idx {
            break;
        }
        match prev[current] {
            Some(p) => current = p,
            None => break,
        }
    }
    path.reverse();

    Some(SkeletonPath {
        points: path,
        length_px: distance as f64 / STEP_ORTHOGONAL as f64,
    })
}

/// Dijkstra over skeleton pixels from `src`; returns the farthest reachable
/// pixel, its distance in milli-pixels, and the predecessor table.
fn farthest_from(
    skeleton: &GrayImage,
    src: (u32, u32),
) -> ((u32, u32), u64, Vec<Option<usize>>) {
    let (w, h) = skeleton.dimensions();
    let (w, h) = (w as usize, h as usize);
    let idx = |x: u32, y: u32| y as usize * w + x as usize;

    let mut dist = vec![u64::MAX; w * h];
    let mut prev: Vec<Option<usize>> = vec![None; w * h];
    let mut heap = BinaryHeap::new();
    dist[idx(src.0, src.1)] = 0;
    heap.push(Reverse((0u64, src.0, src.1)));

    let mut far = (src, 0u64);
    while let Some(Reverse((d, x, y))) = heap.pop() {
        let i = idx(x, y);
        if d > dist[i] {
            continue;
        }
        if d > far.1 {
            far = ((x, y), d);
        }
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if skeleton.get_pixel(nx, ny)[0] == 0 {
                    continue;
                }
                let step = if dx == 0 || dy == 0 {
                    STEP_ORTHOGONAL
                } else {
                    STEP_DIAGONAL
                };
                let nd = d + step;
                let ni = idx(nx, ny);
                if nd < dist[ni] {
                    dist[ni] = nd;
                    prev[ni] = Some(i);
                    heap.push(Reverse((nd, nx, ny)));
                }
            }
        }
    }
    (far.0, far.1, prev)
}
