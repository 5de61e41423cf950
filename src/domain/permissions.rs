//! Access rules for catalog resources
//!
//! Reads are public everywhere. The rules below decide what an identity
//! may do with a resource once the handler knows who is calling.

use super::DomainError;
use super::repositories::CurrentUser;

/// What a request intends to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Writes need any authenticated user.
pub fn authenticated_or_read_only(
    user: Option<&CurrentUser>,
    access: Access,
) -> Result<(), DomainError> {
    match (access, user) {
        (Access::Read, _) => Ok(()),
        (Access::Write, Some(_)) => Ok(()),
        (Access::Write, None) => Err(DomainError::NotAuthenticated),
    }
}

/// Writes need the user who created the object.
pub fn owner_or_read_only(
    user: Option<&CurrentUser>,
    owner_id: i32,
    access: Access,
) -> Result<(), DomainError> {
    authenticated_or_read_only(user, access)?;
    match (access, user) {
        (Access::Write, Some(user)) if user.id != owner_id => Err(DomainError::Forbidden),
        _ => Ok(()),
    }
}

/// Books may be changed by their owner or by staff. Books without an
/// owner (seeded or legacy data) are staff-only.
pub fn book_owner_or_staff(
    user: Option<&CurrentUser>,
    owner_id: Option<i32>,
    access: Access,
) -> Result<(), DomainError> {
    authenticated_or_read_only(user, access)?;
    match (access, user) {
        (Access::Write, Some(user)) => {
            if user.is_staff || owner_id == Some(user.id) {
                Ok(())
            } else {
                Err(DomainError::Forbidden)
            }
        }
        _ => Ok(()),
    }
}

/// Staff-only, for reads as well as writes
pub fn admin_only(user: Option<&CurrentUser>) -> Result<(), DomainError> {
    match user {
        None => Err(DomainError::NotAuthenticated),
        Some(user) if user.is_staff => Ok(()),
        Some(_) => Err(DomainError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32, is_staff: bool) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            is_staff,
            is_active: true,
        }
    }

    #[test]
    fn anonymous_reads_are_allowed() {
        assert!(authenticated_or_read_only(None, Access::Read).is_ok());
        assert!(owner_or_read_only(None, 1, Access::Read).is_ok());
        assert!(book_owner_or_staff(None, Some(1), Access::Read).is_ok());
    }

    #[test]
    fn anonymous_writes_are_unauthenticated() {
        assert!(matches!(
            authenticated_or_read_only(None, Access::Write),
            Err(DomainError::NotAuthenticated)
        ));
        assert!(matches!(
            owner_or_read_only(None, 1, Access::Write),
            Err(DomainError::NotAuthenticated)
        ));
    }

    #[test]
    fn reviews_are_owner_only() {
        let alice = user(1, false);
        let staff = user(2, true);
        assert!(owner_or_read_only(Some(&alice), 1, Access::Write).is_ok());
        assert!(matches!(
            owner_or_read_only(Some(&staff), 1, Access::Write),
            Err(DomainError::Forbidden)
        ));
    }

    #[test]
    fn books_allow_owner_and_staff() {
        let owner = user(1, false);
        let other = user(2, false);
        let staff = user(3, true);

        assert!(book_owner_or_staff(Some(&owner), Some(1), Access::Write).is_ok());
        assert!(book_owner_or_staff(Some(&staff), Some(1), Access::Write).is_ok());
        assert!(matches!(
            book_owner_or_staff(Some(&other), Some(1), Access::Write),
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            book_owner_or_staff(Some(&owner), None, Access::Write),
            Err(DomainError::Forbidden)
        ));
        assert!(book_owner_or_staff(Some(&staff), None, Access::Write).is_ok());
    }

    #[test]
    fn admin_requires_staff() {
        assert!(matches!(admin_only(None), Err(DomainError::NotAuthenticated)));
        assert!(matches!(
            admin_only(Some(&user(1, false))),
            Err(DomainError::Forbidden)
        ));
        assert!(admin_only(Some(&user(1, true))).is_ok());
    }
}
