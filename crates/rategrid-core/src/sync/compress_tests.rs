//! Property tests for range compression.

#[cfg(test)]
mod tests {
    use super::super::compress::*;
    use crate::model::DailyRecord;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn dense(values: &[u32]) -> Vec<DailyRecord<u32>> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| DailyRecord {
                record_id: 0,
                date: start + Duration::days(i as i64),
                value,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn expansion_reproduces_the_series(values in prop::collection::vec(0u32..4, 0..60)) {
            let cells = dense(&values);
            let expanded = expand(&compress(&cells));
            let original: Vec<(NaiveDate, u32)> = cells.iter().map(|c| (c.date, c.value)).collect();
            prop_assert_eq!(expanded, original);
        }

        #[test]
        fn adjacent_ranges_never_share_a_value(values in prop::collection::vec(0u32..4, 0..60)) {
            let ranges = compress(&dense(&values));
            for pair in ranges.windows(2) {
                prop_assert_ne!(pair[0].value, pair[1].value);
                prop_assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
            }
        }

        #[test]
        fn range_count_matches_value_changes(values in prop::collection::vec(0u32..4, 1..60)) {
            let changes = values.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert_eq!(compress(&dense(&values)).len(), changes + 1);
        }
    }
}
