use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{StatsError, StatsResult};

/// Comparison a selectivity estimate is asked about: `value op v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PredicateOp::Equals => "=",
            PredicateOp::NotEquals => "<>",
            PredicateOp::GreaterThan => ">",
            PredicateOp::GreaterThanOrEq => ">=",
            PredicateOp::LessThan => "<",
            PredicateOp::LessThanOrEq => "<=",
        };
        write!(f, "{}", symbol)
    }
}

/// Largest bucket count a histogram may be asked for
pub const MAX_BUCKETS: usize = 1 << 20;

/// Equal-width histogram over a fixed inclusive integer domain.
///
/// Space is one counter per bucket regardless of how many values are
/// added. When the domain does not divide evenly, one extra bucket holds
/// everything past the equal-width buckets, so the last bucket may be
/// narrower or wider than the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIntHistogram")]
pub struct IntHistogram {
    min: i32,
    max: i32,
    width: i64,
    last_width: i64,
    counts: Vec<u64>,
    total: u64,
}

impl IntHistogram {
    pub fn new(buckets: usize, min: i32, max: i32) -> StatsResult<Self> {
        if buckets == 0 || buckets > MAX_BUCKETS {
            return Err(StatsError::InvalidBuckets(buckets));
        }
        if min > max {
            return Err(StatsError::InvalidRange { min, max });
        }

        let range = i64::from(max) - i64::from(min) + 1;
        let requested = buckets as i64;
        let (width, bucket_count) = match range / requested {
            // Narrow domain: one value per bucket
            0 => (1, range),
            width if range % requested != 0 => (width, requested + 1),
            width => (width, requested),
        };
        let last_width = i64::from(max) - (i64::from(min) + (bucket_count - 1) * width) + 1;

        Ok(Self {
            min,
            max,
            width,
            last_width,
            counts: vec![0; bucket_count as usize],
            total: 0,
        })
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Width of every bucket but the last
    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of values added so far
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn add_value(&mut self, v: i32) -> StatsResult<()> {
        if v < self.min || v > self.max {
            return Err(StatsError::ValueOutOfRange {
                value: v,
                min: self.min,
                max: self.max,
            });
        }
        let pos = self.bucket_of(v);
        self.counts[pos] += 1;
        self.total += 1;
        Ok(())
    }

    /// Estimated fraction of the added values satisfying `value op v`
    pub fn estimate_selectivity(&self, op: PredicateOp, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if let Some(fixed) = self.outside_domain(op, v) {
            return fixed;
        }

        let pos = self.bucket_of(v);
        let width = self.bucket_width(pos);
        let offset = i64::from(v) - self.bucket_left(pos);
        let count = self.counts[pos] as f64;
        let slice = |values: i64| count * values as f64 / width as f64;
        let below = || self.counts[..pos].iter().sum::<u64>() as f64;
        let above = || self.counts[pos + 1..].iter().sum::<u64>() as f64;

        let matching = match op {
            PredicateOp::Equals => slice(1),
            PredicateOp::NotEquals => self.total as f64 - slice(1),
            PredicateOp::GreaterThan => above() + slice(width - offset - 1),
            PredicateOp::GreaterThanOrEq => above() + slice(width - offset),
            PredicateOp::LessThan => below() + slice(offset),
            PredicateOp::LessThanOrEq => below() + slice(offset + 1),
        };
        (matching / self.total as f64).clamp(0.0, 1.0)
    }

    /// Expected selectivity of an equality predicate whose operand is drawn
    /// from the observed distribution
    pub fn avg_selectivity(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let total = self.total as f64;
        self.counts
            .iter()
            .enumerate()
            .map(|(pos, &count)| {
                let p = count as f64 / total;
                p * p / self.bucket_width(pos) as f64
            })
            .sum()
    }

    /// Answers for operands at or past the domain edges, where no bucket
    /// lookup is needed
    fn outside_domain(&self, op: PredicateOp, v: i32) -> Option<f64> {
        let (min, max) = (self.min, self.max);
        match op {
            PredicateOp::Equals if v < min || v > max => Some(0.0),
            PredicateOp::NotEquals if v < min || v > max => Some(1.0),
            PredicateOp::GreaterThan if v >= max => Some(0.0),
            PredicateOp::GreaterThan if v < min => Some(1.0),
            PredicateOp::LessThan if v <= min => Some(0.0),
            PredicateOp::LessThan if v > max => Some(1.0),
            PredicateOp::GreaterThanOrEq if v > max => Some(0.0),
            PredicateOp::GreaterThanOrEq if v <= min => Some(1.0),
            PredicateOp::LessThanOrEq if v < min => Some(0.0),
            PredicateOp::LessThanOrEq if v >= max => Some(1.0),
            _ => None,
        }
    }

    /// Values past the equal-width buckets all land in the last one
    fn bucket_of(&self, v: i32) -> usize {
        let pos = ((i64::from(v) - i64::from(self.min)) / self.width) as usize;
        pos.min(self.counts.len() - 1)
    }

    fn bucket_left(&self, pos: usize) -> i64 {
        i64::from(self.min) + pos as i64 * self.width
    }

    fn bucket_width(&self, pos: usize) -> i64 {
        if pos + 1 == self.counts.len() {
            self.last_width
        } else {
            self.width
        }
    }
}

/// On-disk shape of [`IntHistogram`], checked before it is trusted
#[derive(Deserialize)]
struct RawIntHistogram {
    min: i32,
    max: i32,
    width: i64,
    last_width: i64,
    counts: Vec<u64>,
    total: u64,
}

impl TryFrom<RawIntHistogram> for IntHistogram {
    type Error = StatsError;

    fn try_from(raw: RawIntHistogram) -> StatsResult<Self> {
        if raw.min > raw.max {
            return Err(StatsError::InvalidRange {
                min: raw.min,
                max: raw.max,
            });
        }
        let range = i64::from(raw.max) - i64::from(raw.min) + 1;
        let bucket_count = raw.counts.len() as i64;
        if bucket_count == 0 || raw.counts.len() > MAX_BUCKETS + 1 {
            return Err(StatsError::InvalidBuckets(raw.counts.len()));
        }
        if raw.width < 1 || raw.width > range {
            return Err(StatsError::CorruptHistogram(format!(
                "bucket width {} over a domain of {}",
                raw.width, range
            )));
        }
        let covered = (bucket_count - 1) * raw.width;
        if covered >= range || raw.last_width != range - covered {
            return Err(StatsError::CorruptHistogram(format!(
                "{} buckets of width {} (last {}) do not cover [{}, {}]",
                bucket_count, raw.width, raw.last_width, raw.min, raw.max
            )));
        }
        if raw.counts.iter().sum::<u64>() != raw.total {
            return Err(StatsError::CorruptHistogram(format!(
                "bucket counts do not add up to {}",
                raw.total
            )));
        }
        Ok(Self {
            min: raw.min,
            max: raw.max,
            width: raw.width,
            last_width: raw.last_width,
            counts: raw.counts,
            total: raw.total,
        })
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntHistogram[{}..={}, {} buckets of width {}, {} values]",
            self.min,
            self.max,
            self.counts.len(),
            self.width,
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn filled(buckets: usize, min: i32, max: i32, values: &[i32]) -> IntHistogram {
        let mut hist = IntHistogram::new(buckets, min, max).unwrap();
        for &v in values {
            hist.add_value(v).unwrap();
        }
        hist
    }

    #[test]
    fn test_bucket_layout() {
        let even = IntHistogram::new(10, 1, 10).unwrap();
        assert_eq!(even.bucket_count(), 10);
        assert_eq!(even.width(), 1);

        // 10 values in 3 buckets of width 3 plus a remainder bucket of 1
        let uneven = IntHistogram::new(3, 1, 10).unwrap();
        assert_eq!(uneven.bucket_count(), 4);
        assert_eq!(uneven.width(), 3);
        assert_eq!(uneven.bucket_width(3), 1);

        // More buckets than values
        let narrow = IntHistogram::new(20, 1, 10).unwrap();
        assert_eq!(narrow.bucket_count(), 10);
        assert_eq!(narrow.width(), 1);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            IntHistogram::new(0, 1, 10),
            Err(StatsError::InvalidBuckets(0))
        ));
        assert!(matches!(
            IntHistogram::new(5, 10, 1),
            Err(StatsError::InvalidRange { min: 10, max: 1 })
        ));
        assert!(matches!(
            IntHistogram::new(MAX_BUCKETS + 1, i32::MIN, i32::MAX),
            Err(StatsError::InvalidBuckets(_))
        ));
        // A huge request over a narrow domain still gets one bucket per value
        assert_eq!(IntHistogram::new(MAX_BUCKETS, 1, 10).unwrap().bucket_count(), 10);
    }

    #[test]
    fn test_wide_remainder_bucket() {
        // 7 values over 4 buckets of width 1: the fifth bucket holds 5..=7
        let values: Vec<i32> = (1..=7).collect();
        let hist = filled(4, 1, 7, &values);
        assert_eq!(hist.bucket_count(), 5);
        assert_eq!(hist.bucket_width(4), 3);
        assert_eq!(hist.counts(), &[1, 1, 1, 1, 3]);
        assert!((hist.estimate_selectivity(PredicateOp::Equals, 6) - 1.0 / 7.0).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::LessThan, 6) - 5.0 / 7.0).abs() < EPSILON);
    }

    #[test]
    fn test_complementary_predicates_with_wide_remainder() {
        for (buckets, max) in [(4, 7), (100, 150), (100, 199), (7, 20)] {
            let values: Vec<i32> = (1..=max).collect();
            let hist = filled(buckets, 1, max, &values);
            assert_eq!(hist.total(), max as u64);
            assert_eq!(hist.counts().iter().sum::<u64>(), max as u64);
            for v in 0..=max + 1 {
                let lt_ge = hist.estimate_selectivity(PredicateOp::LessThan, v)
                    + hist.estimate_selectivity(PredicateOp::GreaterThanOrEq, v);
                let le_gt = hist.estimate_selectivity(PredicateOp::LessThanOrEq, v)
                    + hist.estimate_selectivity(PredicateOp::GreaterThan, v);
                assert!((lt_ge - 1.0).abs() < EPSILON, "B={} LT+GE at {} = {}", buckets, v, lt_ge);
                assert!((le_gt - 1.0).abs() < EPSILON, "B={} LE+GT at {} = {}", buckets, v, le_gt);
            }
        }
    }

    #[test]
    fn test_full_integer_domain() {
        let mut hist = IntHistogram::new(10, i32::MIN, i32::MAX).unwrap();
        hist.add_value(i32::MIN).unwrap();
        hist.add_value(i32::MAX).unwrap();
        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[hist.bucket_count() - 1], 1);
        assert!((hist.estimate_selectivity(PredicateOp::LessThan, 0) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_add_value_out_of_range() {
        let mut hist = IntHistogram::new(10, 1, 10).unwrap();
        assert!(matches!(
            hist.add_value(11),
            Err(StatsError::ValueOutOfRange { value: 11, .. })
        ));
        assert!(hist.add_value(0).is_err());
        assert!(hist.is_empty());
    }

    #[test]
    fn test_boundary_shortcuts() {
        let hist = filled(10, 1, 10, &[1]);
        assert_eq!(hist.estimate_selectivity(PredicateOp::Equals, 0), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::NotEquals, 0), 1.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::GreaterThan, 10), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::GreaterThan, 0), 1.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::LessThan, 1), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::LessThan, 11), 1.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::GreaterThanOrEq, 11), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::GreaterThanOrEq, 1), 1.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::LessThanOrEq, 0), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::LessThanOrEq, 1), 1.0);
    }

    #[test]
    fn test_uniform_estimates() {
        let values: Vec<i32> = (1..=100).collect();
        let hist = filled(10, 1, 100, &values);

        assert!((hist.estimate_selectivity(PredicateOp::Equals, 50) - 0.01).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::NotEquals, 50) - 0.99).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::GreaterThan, 50) - 0.50).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::GreaterThanOrEq, 50) - 0.51).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::LessThan, 50) - 0.49).abs() < EPSILON);
        assert!((hist.estimate_selectivity(PredicateOp::LessThanOrEq, 50) - 0.50).abs() < EPSILON);
    }

    #[test]
    fn test_complementary_predicates_sum_to_one() {
        let hist = filled(3, 1, 10, &[1, 2, 2, 3, 5, 7, 7, 7, 9, 10, 10]);
        for v in -2..=13 {
            let lt_ge = hist.estimate_selectivity(PredicateOp::LessThan, v)
                + hist.estimate_selectivity(PredicateOp::GreaterThanOrEq, v);
            let le_gt = hist.estimate_selectivity(PredicateOp::LessThanOrEq, v)
                + hist.estimate_selectivity(PredicateOp::GreaterThan, v);
            let eq_ne = hist.estimate_selectivity(PredicateOp::Equals, v)
                + hist.estimate_selectivity(PredicateOp::NotEquals, v);
            assert!((lt_ge - 1.0).abs() < EPSILON, "LT+GE at {} = {}", v, lt_ge);
            assert!((le_gt - 1.0).abs() < EPSILON, "LE+GT at {} = {}", v, le_gt);
            assert!((eq_ne - 1.0).abs() < EPSILON, "EQ+NE at {} = {}", v, eq_ne);
        }
    }

    #[test]
    fn test_estimates_stay_in_unit_interval() {
        let hist = filled(7, -50, 50, &[-50, -10, 0, 0, 0, 3, 49, 50]);
        let ops = [
            PredicateOp::Equals,
            PredicateOp::NotEquals,
            PredicateOp::GreaterThan,
            PredicateOp::GreaterThanOrEq,
            PredicateOp::LessThan,
            PredicateOp::LessThanOrEq,
        ];
        for op in ops {
            for v in -60..=60 {
                let sel = hist.estimate_selectivity(op, v);
                assert!((0.0..=1.0).contains(&sel), "{} {} gave {}", op, v, sel);
            }
        }
    }

    #[test]
    fn test_empty_histogram() {
        let hist = IntHistogram::new(10, 1, 10).unwrap();
        assert_eq!(hist.estimate_selectivity(PredicateOp::Equals, 5), 0.0);
        assert_eq!(hist.estimate_selectivity(PredicateOp::NotEquals, 0), 0.0);
        assert_eq!(hist.avg_selectivity(), 1.0);
    }

    #[test]
    fn test_avg_selectivity() {
        let values: Vec<i32> = (1..=100).collect();
        let uniform = filled(10, 1, 100, &values);
        assert!((uniform.avg_selectivity() - 0.01).abs() < EPSILON);

        // All values identical: any equality lookup drawn from the data hits
        let skewed = filled(10, 1, 10, &[4; 20]);
        assert!((skewed.avg_selectivity() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_json_keeps_estimates() {
        let hist = filled(3, 1, 10, &[1, 4, 4, 9]);
        let json = serde_json::to_string(&hist).unwrap();
        let restored: IntHistogram = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, hist);
        assert_eq!(
            restored.estimate_selectivity(PredicateOp::LessThan, 5),
            hist.estimate_selectivity(PredicateOp::LessThan, 5)
        );
    }

    #[test]
    fn test_json_rejects_inconsistent_layout() {
        let rejected = [
            // zero width
            r#"{"min":1,"max":10,"width":0,"last_width":1,"counts":[1],"total":1}"#,
            // too few buckets for the domain
            r#"{"min":1,"max":10,"width":3,"last_width":1,"counts":[1,0],"total":1}"#,
            // last width disagrees with the layout
            r#"{"min":1,"max":10,"width":3,"last_width":4,"counts":[0,0,0,1],"total":1}"#,
            // counts do not add up to the total
            r#"{"min":1,"max":10,"width":3,"last_width":1,"counts":[0,2,0,1],"total":1}"#,
            r#"{"min":1,"max":10,"width":3,"last_width":1,"counts":[],"total":0}"#,
            r#"{"min":10,"max":1,"width":1,"last_width":1,"counts":[0],"total":0}"#,
        ];
        for json in rejected {
            let result = serde_json::from_str::<IntHistogram>(json);
            assert!(result.is_err(), "accepted {}", json);
        }

        let accepted = r#"{"min":1,"max":10,"width":3,"last_width":1,"counts":[0,1,0,1],"total":2}"#;
        let hist: IntHistogram = serde_json::from_str(accepted).unwrap();
        assert!((hist.estimate_selectivity(PredicateOp::Equals, 10) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_display() {
        let hist = filled(3, 1, 10, &[2]);
        assert_eq!(
            hist.to_string(),
            "IntHistogram[1..=10, 4 buckets of width 3, 1 values]"
        );
        assert_eq!(PredicateOp::GreaterThanOrEq.to_string(), ">=");
    }
}
