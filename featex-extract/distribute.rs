use crate::error::{ExtractError, ExtractResult};
use featex_core::{Keypoint, Region};

/// One partition cell: a rectangle, the candidates currently assigned to
/// it, and a flag marking cells that can never split further. Nodes live
/// in a dense arena; "erase and replace with children" kills the parent
/// slot and appends new ones.
#[derive(Debug)]
struct Node {
    region: Region,
    keys: Vec<Keypoint>,
    no_more: bool,
    alive: bool,
}

impl Node {
    fn new(region: Region) -> Self {
        Self {
            region,
            keys: Vec::new(),
            no_more: false,
            alive: true,
        }
    }
}

/// Thin `candidates` down to at most `quota` keypoints spread roughly
/// evenly over `region`, keeping the highest-scoring candidate of every
/// terminal cell.
///
/// Candidate coordinates are region-local: `(0, 0)` is the region's
/// upper-left corner. When the candidate count already fits the quota the
/// input is returned unchanged.
pub fn distribute(
    candidates: Vec<Keypoint>,
    region: Region,
    quota: usize,
) -> ExtractResult<Vec<Keypoint>> {
    if candidates.len() <= quota {
        return Ok(candidates);
    }

    let width = region.width();
    let height = region.height();
    if width <= 0 || height <= 0 {
        return Err(ExtractError::ZeroAreaRegion { width, height });
    }

    // Initial split into roughly square full-height columns.
    let n_ini = ((width as f32 / height as f32).round() as i32).max(1);
    let hx = width as f32 / n_ini as f32;

    let mut arena: Vec<Node> = (0..n_ini)
        .map(|i| {
            Node::new(Region::new(
                (hx * i as f32) as i32,
                (hx * (i + 1) as f32) as i32,
                0,
                height,
            ))
        })
        .collect();

    for kp in candidates {
        let idx = ((kp.x / hx) as i32).clamp(0, n_ini - 1) as usize;
        arena[idx].keys.push(kp);
    }

    let mut live = 0usize;
    for node in &mut arena {
        match node.keys.len() {
            0 => node.alive = false,
            1 => {
                node.no_more = true;
                live += 1;
            }
            _ => live += 1,
        }
    }

    // Children with more than one key, carried between rounds so the
    // prioritized phase can pick the fullest nodes first.
    let mut expandable: Vec<(usize, usize)> = Vec::new();

    let mut finished = false;
    while !finished {
        let prev_live = live;
        expandable.clear();

        let splittable: Vec<usize> = (0..arena.len())
            .filter(|&i| arena[i].alive && !arena[i].no_more)
            .collect();

        for idx in splittable {
            split_node(&mut arena, idx, &mut live, &mut expandable);
            if live >= quota {
                break;
            }
        }

        if live >= quota || live == prev_live {
            finished = true;
        } else if live + 3 * expandable.len() > quota {
            // One more unprioritized sweep would overshoot the quota:
            // split the fullest nodes one at a time instead, re-checking
            // the stop condition after every single split.
            while !finished {
                let prev = live;
                let mut pending = std::mem::take(&mut expandable);
                pending.sort_by_key(|&(n_keys, _)| n_keys);

                for &(_, idx) in pending.iter().rev() {
                    if !arena[idx].alive {
                        continue;
                    }
                    split_node(&mut arena, idx, &mut live, &mut expandable);
                    if live >= quota {
                        break;
                    }
                }

                if live >= quota || live == prev {
                    finished = true;
                }
            }
        }
    }

    // Retain the best candidate per surviving node; ties keep the first
    // encountered so results are deterministic.
    let mut result: Vec<Keypoint> = Vec::with_capacity(quota);
    for node in arena.iter().filter(|n| n.alive) {
        if let Some(best) = node
            .keys
            .iter()
            .copied()
            .reduce(|a, b| if b.score > a.score { b } else { a })
        {
            result.push(best);
        }
    }

    // The prioritized phase does not guarantee an exact cap.
    if result.len() > quota {
        result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        result.truncate(quota);
    }

    Ok(result)
}

/// Split `idx` into four quadrants at the (ceiled) midpoint, reassign its
/// candidates, keep non-empty quadrants, and kill the parent slot.
/// Points exactly on a midline go to the greater-or-equal side: strictly
/// less than mid picks left/top.
fn split_node(
    arena: &mut Vec<Node>,
    idx: usize,
    live: &mut usize,
    expandable: &mut Vec<(usize, usize)>,
) {
    let region = arena[idx].region;
    let keys = std::mem::take(&mut arena[idx].keys);
    arena[idx].alive = false;
    *live -= 1;

    let half_w = (region.width() as f32 / 2.0).ceil() as i32;
    let half_h = (region.height() as f32 / 2.0).ceil() as i32;
    let mid_x = region.x0 + half_w;
    let mid_y = region.y0 + half_h;

    let quadrants = [
        Region::new(region.x0, mid_x, region.y0, mid_y),
        Region::new(mid_x, region.x1, region.y0, mid_y),
        Region::new(region.x0, mid_x, mid_y, region.y1),
        Region::new(mid_x, region.x1, mid_y, region.y1),
    ];
    let mut children: [Node; 4] = quadrants.map(Node::new);

    for kp in keys {
        let left = kp.x < mid_x as f32;
        let top = kp.y < mid_y as f32;
        let child = match (left, top) {
            (true, true) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (false, false) => 3,
        };
        children[child].keys.push(kp);
    }

    for mut child in children {
        match child.keys.len() {
            0 => continue,
            1 => child.no_more = true,
            n => expandable.push((n, arena.len())),
        }
        *live += 1;
        arena.push(child);
    }
}
