use chrono::{DateTime, Utc};

use clubhouse_core::UserId;

use crate::{Claims, TokenValidationError, User, validate_claims};

/// The authenticated caller of a core operation.
///
/// Only obtainable through [`CurrentUser::from_claims`], so holding one means
/// the token was unexpired and its subject exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrentUser {
    id: UserId,
}

impl CurrentUser {
    /// Resolve verified claims against the user looked up for `claims.sub`.
    pub fn from_claims(
        claims: &Claims,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenValidationError> {
        validate_claims(claims, now)?;
        match user {
            Some(user) if user.id == claims.sub => Ok(Self { id: user.id }),
            _ => Err(TokenValidationError::UnknownSubject),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::RegisterUser;

    fn user() -> User {
        User::register(
            UserId::new(),
            RegisterUser {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                credential_hash: "hash".into(),
                college: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn resolves_existing_subject() {
        let u = user();
        let now = Utc::now();
        let claims = Claims {
            sub: u.id,
            email: u.email.clone(),
            issued_at: now,
            expires_at: now + Duration::days(1),
        };
        let current = CurrentUser::from_claims(&claims, Some(&u), now).unwrap();
        assert_eq!(current.id(), u.id);
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: UserId::new(),
            email: "ghost@example.com".into(),
            issued_at: now,
            expires_at: now + Duration::days(1),
        };
        assert_eq!(
            CurrentUser::from_claims(&claims, None, now),
            Err(TokenValidationError::UnknownSubject)
        );
    }
}
