use align_core::{Correspondences, Keypoint, Match, Point2};

/// Lowe's ratio test.
///
/// Keeps a query's best candidate only when it has a second candidate and
/// `best.distance < ratio * second.distance`. Survivors stay in query order.
pub fn ratio_test(knn: &[Vec<Match>], ratio: f32) -> Vec<Match> {
    knn.iter()
        .filter_map(|candidates| match candidates.as_slice() {
            [best, second, ..] if best.distance < ratio * second.distance => Some(*best),
            _ => None,
        })
        .collect()
}

/// Pair up the keypoints of filtered matches.
///
/// `src[i]` is the query-side keypoint of `matches[i]` and `dst[i]` its
/// train-side keypoint. Panics if a match index is out of range for its
/// keypoint list.
pub fn correspondences(matches: Vec<Match>, query_kps: &[Keypoint], train_kps: &[Keypoint]) -> Correspondences {
    let src = matches
        .iter()
        .map(|m| Point2::from(&query_kps[m.query_idx]))
        .collect();
    let dst = matches
        .iter()
        .map(|m| Point2::from(&train_kps[m.train_idx]))
        .collect();
    Correspondences { matches, src, dst }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidates(query_idx: usize, d1: f32, d2: f32) -> Vec<Match> {
        vec![
            Match { query_idx, train_idx: 2 * query_idx, distance: d1 },
            Match { query_idx, train_idx: 2 * query_idx + 1, distance: d2 },
        ]
    }

    fn keypoint(x: f32, y: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            size: 2.0,
            angle: 0.0,
            response: 0.1,
            octave: 0,
            layer: 1,
            layer_offset: 0.0,
        }
    }

    #[test]
    fn test_ratio_is_strict() {
        let knn = vec![candidates(0, 0.7, 1.0), candidates(1, 0.69, 1.0), candidates(2, 0.1, 1.0)];
        let kept = ratio_test(&knn, 0.7);
        assert_eq!(kept.iter().map(|m| m.query_idx).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_single_candidate_dropped() {
        let knn = vec![vec![Match { query_idx: 0, train_idx: 0, distance: 0.0 }], Vec::new()];
        assert!(ratio_test(&knn, 0.9).is_empty());
    }

    #[test]
    fn test_correspondences_follow_indices() {
        let query_kps = vec![keypoint(1.0, 2.0), keypoint(3.0, 4.0)];
        let train_kps = vec![keypoint(10.0, 20.0), keypoint(30.0, 40.0), keypoint(50.0, 60.0)];
        let matches = vec![
            Match { query_idx: 1, train_idx: 0, distance: 0.1 },
            Match { query_idx: 0, train_idx: 2, distance: 0.2 },
        ];
        let corr = correspondences(matches, &query_kps, &train_kps);
        assert_eq!(corr.len(), 2);
        assert_eq!(corr.src, vec![Point2::new(3.0, 4.0), Point2::new(1.0, 2.0)]);
        assert_eq!(corr.dst, vec![Point2::new(10.0, 20.0), Point2::new(50.0, 60.0)]);
    }

    proptest! {
        #[test]
        fn lower_ratio_never_keeps_more(
            dists in prop::collection::vec((0.0f32..10.0, 0.0f32..10.0), 0..60),
            r1 in 0.0f32..1.0,
            r2 in 0.0f32..1.0,
        ) {
            let knn: Vec<Vec<Match>> = dists
                .iter()
                .enumerate()
                .map(|(i, &(a, b))| candidates(i, a.min(b), a.max(b)))
                .collect();
            let (lo, hi) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
            let strict = ratio_test(&knn, lo);
            let loose = ratio_test(&knn, hi);
            prop_assert!(strict.len() <= loose.len());
            for m in &strict {
                prop_assert!(loose.contains(m));
            }
        }
    }
}
