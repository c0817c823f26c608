use super::{Visitor, VisitorCategories};

/// Splits visitors by dwell time. Banned users are only listed under `banned`;
/// visitors with unknown dwell land in neither bucket.
pub fn categorize_visitors(
    visitors: &[Visitor],
    banned: &[String],
    threshold_minutes: i64,
) -> VisitorCategories {
    let threshold_secs = threshold_minutes * 60;
    let mut categories = VisitorCategories {
        banned: banned.to_vec(),
        ..Default::default()
    };

    for visitor in visitors {
        if banned.contains(&visitor.username) {
            continue;
        }
        match visitor.dwell_seconds {
            Some(d) if d >= threshold_secs => categories.stayed.push(visitor.username.clone()),
            Some(_) => categories.quick.push(visitor.username.clone()),
            None => {}
        }
    }

    categories
}

/// Mean dwell in seconds over visitors with a known dwell; 0.0 when none.
pub fn calculate_avg_watch_time(visitors: &[Visitor]) -> f64 {
    let dwells: Vec<i64> = visitors.iter().filter_map(|v| v.dwell_seconds).collect();
    if dwells.is_empty() {
        return 0.0;
    }
    dwells.iter().sum::<i64>() as f64 / dwells.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visitor(name: &str, dwell: Option<i64>) -> Visitor {
        Visitor {
            username: name.to_string(),
            dwell_seconds: dwell,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let visitors = vec![visitor("a", Some(60)), visitor("b", Some(59))];
        let cats = categorize_visitors(&visitors, &[], 1);
        assert_eq!(cats.stayed, vec!["a"]);
        assert_eq!(cats.quick, vec!["b"]);
    }

    #[test]
    fn test_banned_excluded_from_buckets() {
        let visitors = vec![visitor("a", Some(600)), visitor("m", Some(600))];
        let cats = categorize_visitors(&visitors, &["m".to_string()], 1);
        assert_eq!(cats.stayed, vec!["a"]);
        assert_eq!(cats.banned, vec!["m"]);
    }

    #[test]
    fn test_unknown_dwell_in_neither_bucket() {
        let cats = categorize_visitors(&[visitor("a", None)], &[], 1);
        assert!(cats.stayed.is_empty());
        assert!(cats.quick.is_empty());
    }

    #[test]
    fn test_avg_watch_time_ignores_unknown() {
        let visitors = vec![visitor("a", Some(100)), visitor("b", Some(50)), visitor("c", None)];
        assert!((calculate_avg_watch_time(&visitors) - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_avg_watch_time_empty_is_zero() {
        assert_eq!(calculate_avg_watch_time(&[]), 0.0);
    }
}
