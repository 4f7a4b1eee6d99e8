use crate::features::plans::Plan;
use crate::shared::format::format_bytes;

/// Admission rule: a file fits iff the stored total plus its size stays at or
/// under the plan ceiling.
pub fn can_admit(existing_total: i64, incoming: i64, ceiling: i64) -> bool {
    existing_total.saturating_add(incoming) <= ceiling
}

/// User-facing rejection text for a quota failure
pub fn quota_exceeded_message(used: i64, ceiling: i64, plan: Plan) -> String {
    format!(
        "You've used {} of your storage quota ({}) on the {} plan. \
         Please delete some files or upgrade your plan to continue uploading.",
        format_bytes(used),
        format_bytes(ceiling),
        plan
    )
}

/// Running admission accumulator for one batch.
///
/// Admission is applied sequentially: each admitted file raises the working
/// total before the next file is checked, so files that fit individually
/// cannot jointly overflow a snapshot total.
#[derive(Debug)]
pub struct BatchAdmission {
    used: i64,
    ceiling: i64,
}

impl BatchAdmission {
    pub fn new(existing_total: i64, ceiling: i64) -> Self {
        Self {
            used: existing_total,
            ceiling,
        }
    }

    /// Admit a file of `size` bytes, raising the working total on success.
    pub fn admit(&mut self, size: i64) -> bool {
        if can_admit(self.used, size, self.ceiling) {
            self.used = self.used.saturating_add(size);
            true
        } else {
            false
        }
    }

    /// Working total: stored bytes plus everything admitted so far
    pub fn used(&self) -> i64 {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: i64 = 1024 * 1024;

    #[test]
    fn admission_boundary_is_inclusive() {
        assert!(can_admit(0, 100, 100));
        assert!(!can_admit(0, 101, 100));
        assert!(can_admit(480 * MB, 15 * MB, 500 * MB));
        assert!(!can_admit(480 * MB, 25 * MB, 500 * MB));
    }

    #[test]
    fn admission_never_overflows() {
        assert!(!can_admit(i64::MAX, 1, i64::MAX - 1));
    }

    #[test]
    fn batch_admission_tracks_running_total() {
        let mut admission = BatchAdmission::new(400 * MB, 500 * MB);

        // Each file fits against the snapshot total, but not jointly.
        assert!(admission.admit(60 * MB));
        assert!(!admission.admit(60 * MB));
        assert_eq!(admission.used(), 460 * MB);

        // A smaller file still fits after the rejection.
        assert!(admission.admit(40 * MB));
        assert_eq!(admission.used(), 500 * MB);
    }

    #[test]
    fn rejection_message_names_usage_and_plan() {
        let message = quota_exceeded_message(480 * MB, 500 * MB, Plan::Free);
        assert!(message.contains("480.00 MB"));
        assert!(message.contains("500.00 MB"));
        assert!(message.contains("free plan"));
    }
}
