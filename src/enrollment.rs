//! The consumed course/enrollment collaborator surface.
//!
//! The catalog itself lives outside this core; what the core needs from it
//! is the shared-classmates lookup (feeding the suggestion engine), the
//! membership check, and the auto-enroll side channel used the first time
//! a user interacts with a course's discussion features.

use std::sync::Arc;

use crate::error::CoreError;
use crate::logging;
use crate::retry_read;
use crate::store::{validate_id, GraphStore, UserRecord};

#[derive(Clone)]
pub struct EnrollmentDirectory {
    store: Arc<dyn GraphStore>,
}

impl EnrollmentDirectory {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Users sharing at least one course enrollment with `user`.
    pub async fn shared_classmates(&self, user: &str) -> Result<Vec<UserRecord>, CoreError> {
        validate_id(user, "user id")?;
        retry_read!(self.store.shared_enrollment_peers(user).await)
    }

    pub async fn is_enrolled(&self, user: &str, course: &str) -> Result<bool, CoreError> {
        validate_id(user, "user id")?;
        validate_id(course, "course code")?;
        retry_read!(self.store.is_enrolled(user, course).await)
    }

    /// Enroll `user` in `course` unless already enrolled. Idempotent.
    pub async fn ensure_enrolled(&self, user: &str, course: &str) -> Result<(), CoreError> {
        validate_id(user, "user id")?;
        validate_id(course, "course code")?;

        if self.store.is_enrolled(user, course).await? {
            return Ok(());
        }
        self.store.enroll(user, course).await?;
        crate::qlog!(
            "enrollment: {} auto-enrolled in {}",
            logging::user_id(user),
            course
        );
        Ok(())
    }
}
