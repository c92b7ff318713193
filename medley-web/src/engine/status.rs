//! Item status derivation
//!
//! Pure functions mapping an item's instance date ranges to a tracking
//! status. Total over valid inputs: the empty set resolves to backlog and
//! no input raises an error.
//!
//! `dropped`, `on_hold`, and `next_up` are exclusively user-set; the
//! deriver never produces them and only overwrites a status when an
//! instance write or delete yields a concrete derived value.

use chrono::NaiveDate;
use medley_common::types::ItemStatus;

/// Date range of one instance, the only part of it the deriver looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceDates {
    pub started_at: Option<NaiveDate>,
    /// None means the pass is still in progress
    pub completed_at: Option<NaiveDate>,
}

/// Status after an instance create/update: the edited instance is the
/// current truth, so it alone decides. Returns None when the write carries
/// no dates, which leaves the item status untouched.
pub fn status_after_instance_upsert(dates: &InstanceDates) -> Option<ItemStatus> {
    if dates.completed_at.is_some() {
        return Some(ItemStatus::Completed);
    }
    if dates.started_at.is_some() {
        return Some(ItemStatus::InProgress);
    }
    None
}

/// Status after an instance delete, recomputed from every remaining
/// instance: the deleted instance may have been the one driving the prior
/// status. Priority: an open pass beats a finished one beats none.
pub fn status_after_instance_delete(remaining: &[InstanceDates]) -> ItemStatus {
    if remaining
        .iter()
        .any(|i| i.started_at.is_some() && i.completed_at.is_none())
    {
        return ItemStatus::InProgress;
    }
    if remaining.iter().any(|i| i.completed_at.is_some()) {
        return ItemStatus::Completed;
    }
    ItemStatus::Backlog
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn started() -> InstanceDates {
        InstanceDates {
            started_at: Some(date("2024-01-01")),
            completed_at: None,
        }
    }

    fn completed() -> InstanceDates {
        InstanceDates {
            started_at: Some(date("2024-01-01")),
            completed_at: Some(date("2024-01-10")),
        }
    }

    fn neither() -> InstanceDates {
        InstanceDates::default()
    }

    #[test]
    fn test_upsert_completed_wins() {
        assert_eq!(
            status_after_instance_upsert(&completed()),
            Some(ItemStatus::Completed)
        );
        // completed without started still counts as completed
        let completed_only = InstanceDates {
            started_at: None,
            completed_at: Some(date("2024-01-10")),
        };
        assert_eq!(
            status_after_instance_upsert(&completed_only),
            Some(ItemStatus::Completed)
        );
    }

    #[test]
    fn test_upsert_started_only_is_in_progress() {
        assert_eq!(
            status_after_instance_upsert(&started()),
            Some(ItemStatus::InProgress)
        );
    }

    #[test]
    fn test_upsert_without_dates_forces_nothing() {
        assert_eq!(status_after_instance_upsert(&neither()), None);
    }

    #[test]
    fn test_delete_recompute_priority_exhaustive() {
        // Every subset of {started-only, completed, neither} remaining after
        // a delete must match the priority order exactly.
        let kinds: [(&str, fn() -> InstanceDates); 3] =
            [("started", started), ("completed", completed), ("neither", neither)];

        for mask in 0u8..8 {
            let mut remaining = Vec::new();
            let mut has = [false; 3];
            for (bit, (_, make)) in kinds.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    remaining.push(make());
                    has[bit] = true;
                }
            }

            let expected = if has[0] {
                ItemStatus::InProgress
            } else if has[1] {
                ItemStatus::Completed
            } else {
                ItemStatus::Backlog
            };

            assert_eq!(
                status_after_instance_delete(&remaining),
                expected,
                "mask {:#05b}",
                mask
            );
        }
    }

    #[test]
    fn test_deleting_non_driving_instance_changes_nothing() {
        // An open pass drives in_progress; removing a completed pass from
        // beside it must not change the derived status.
        let before = vec![started(), completed()];
        let after = vec![started()];
        assert_eq!(
            status_after_instance_delete(&before),
            status_after_instance_delete(&after)
        );

        // Two completed passes: dropping one keeps completed.
        let before = vec![completed(), completed()];
        let after = vec![completed()];
        assert_eq!(
            status_after_instance_delete(&before),
            status_after_instance_delete(&after)
        );
    }

    #[test]
    fn test_delete_last_instance_reverts_to_backlog() {
        assert_eq!(status_after_instance_delete(&[]), ItemStatus::Backlog);
    }
}
