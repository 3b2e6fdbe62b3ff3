//! Non-maximum suppression for placement candidates.

use crate::candidate::{sort_candidates, Candidate};

/// Applies 2D non-maximum suppression using Chebyshev distance.
///
/// Candidates are sorted best first and kept if they are farther than
/// `radius` from every previously kept candidate. At most `limit` are kept.
pub fn nms_2d(candidates: &mut [Candidate], radius: usize, limit: usize) -> Vec<Candidate> {
    sort_candidates(candidates);
    if radius == 0 {
        return candidates.iter().take(limit).copied().collect();
    }

    let mut kept: Vec<Candidate> = Vec::new();
    'outer: for cand in candidates.iter().copied() {
        if kept.len() >= limit {
            break;
        }
        for prev in kept.iter() {
            let dx = cand.x.abs_diff(prev.x);
            let dy = cand.y.abs_diff(prev.y);
            if dx.max(dy) <= radius {
                continue 'outer;
            }
        }
        kept.push(cand);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::nms_2d;
    use crate::candidate::Candidate;

    #[test]
    fn nearby_candidates_collapse_to_best() {
        let mut c = vec![
            Candidate { x: 10, y: 10, sad: 5 },
            Candidate { x: 11, y: 10, sad: 1 },
            Candidate { x: 30, y: 10, sad: 7 },
        ];
        let kept = nms_2d(&mut c, 3, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!((kept[0].x, kept[0].sad), (11, 1));
        assert_eq!(kept[1].x, 30);
    }

    #[test]
    fn zero_radius_keeps_all_up_to_limit() {
        let mut c = vec![
            Candidate { x: 0, y: 0, sad: 2 },
            Candidate { x: 1, y: 0, sad: 1 },
            Candidate { x: 2, y: 0, sad: 3 },
        ];
        let kept = nms_2d(&mut c, 0, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].x, 1);
    }
}
