use ecg_denoise::index_map::IndexMap;
use ecg_denoise::intervals::{self, Interval};
use proptest::prelude::*;

/// Scale raw byte pairs onto `[0, len + 2]` so some spans poke past the end.
fn scaled(len: usize, raw: &[(u8, u8)]) -> Vec<Interval> {
    raw.iter()
        .map(|&(a, b)| {
            let a = a as usize * (len + 3) / 256;
            let b = b as usize * (len + 3) / 256;
            Interval::new(a, b)
        })
        .collect()
}

fn removal_map(len: usize, raw: &[(u8, u8)]) -> IndexMap {
    IndexMap::from_removed_spans(&scaled(len, raw), len)
}

fn raw_spans() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((any::<u8>(), any::<u8>()), 0..6)
}

proptest! {
    #[test]
    fn normalized_sets_are_canonical(len in 0usize..80, raw in raw_spans()) {
        let out = intervals::normalize(&scaled(len, &raw), Some(len));
        for iv in &out {
            prop_assert!(iv.start <= iv.end);
            prop_assert!(iv.end < len);
        }
        for pair in out.windows(2) {
            prop_assert!(pair[0].end + 1 < pair[1].start);
        }
    }

    #[test]
    fn complement_partitions_the_range(len in 0usize..80, raw in raw_spans()) {
        let removed = intervals::normalize(&scaled(len, &raw), Some(len));
        let kept = intervals::complement(&removed, len);
        prop_assert_eq!(intervals::total_len(&kept) + intervals::total_len(&removed), len);
        let mut all = kept.clone();
        all.extend(removed.iter().copied());
        let merged = intervals::normalize(&all, None);
        if len == 0 {
            prop_assert!(merged.is_empty());
        } else {
            prop_assert_eq!(merged, vec![Interval::new(0, len - 1)]);
        }
    }

    #[test]
    fn kept_spans_rebuild_the_same_map(len in 0usize..80, raw in raw_spans()) {
        let map = removal_map(len, &raw);
        let kept: Vec<Interval> = map.kept().iter().map(|k| k.input()).collect();
        let rebuilt = IndexMap::from_kept_spans(&kept, len).unwrap();
        prop_assert_eq!(&rebuilt, &map);
        prop_assert_eq!(map.output_len(), intervals::total_len(&kept));
    }

    #[test]
    fn forward_then_backward_is_identity_on_kept(len in 1usize..80, raw in raw_spans()) {
        let map = removal_map(len, &raw);
        let removed = map.removed();
        for i in 0..len {
            let point = [Interval::new(i, i)];
            let fwd = map.project_forward(&point);
            if removed.iter().any(|r| r.contains(i)) {
                prop_assert!(fwd.is_empty());
            } else {
                prop_assert_eq!(fwd.len(), 1);
                prop_assert_eq!(map.project_backward(&fwd).unwrap(), point.to_vec());
            }
        }
    }

    #[test]
    fn backward_covers_every_kept_sample(len in 1usize..80, raw in raw_spans()) {
        let map = removal_map(len, &raw);
        if map.output_len() > 0 {
            let all = [Interval::new(0, map.output_len() - 1)];
            let back = map.project_backward(&all).unwrap();
            prop_assert_eq!(back, intervals::complement(&map.removed(), len));
        }
        prop_assert!(map.project_backward(&[Interval::new(0, map.output_len())]).is_err());
    }

    #[test]
    fn composition_matches_chained_projection(
        len in 0usize..80,
        raw1 in raw_spans(),
        raw2 in raw_spans(),
    ) {
        let m1 = removal_map(len, &raw1);
        let m2 = removal_map(m1.output_len(), &raw2);
        let m12 = m1.compose(&m2).unwrap();

        prop_assert_eq!(m12.input_len(), len);
        prop_assert_eq!(m12.output_len(), m2.output_len());
        for i in 0..len {
            let point = [Interval::new(i, i)];
            prop_assert_eq!(
                m12.project_forward(&point),
                m2.project_forward(&m1.project_forward(&point))
            );
        }
    }

    #[test]
    fn composition_is_associative(
        len in 0usize..80,
        raw1 in raw_spans(),
        raw2 in raw_spans(),
        raw3 in raw_spans(),
    ) {
        let m1 = removal_map(len, &raw1);
        let m2 = removal_map(m1.output_len(), &raw2);
        let m3 = removal_map(m2.output_len(), &raw3);

        let left = m1.compose(&m2).unwrap().compose(&m3).unwrap();
        let right = m1.compose(&m2.compose(&m3).unwrap()).unwrap();
        prop_assert_eq!(left, right);
    }
}
