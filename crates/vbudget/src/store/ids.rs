use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Registered employee or administrator.
    UserId
);
entity_id!(OtpId);
entity_id!(VendorId);
entity_id!(BudgetId);
entity_id!(BudgetItemId);
entity_id!(ApprovalId);
entity_id!(DocumentId);

/// Monotonic identifier source shared by every aggregate in a ledger.
///
/// Lives inside the ledger so an aborted transaction also discards the ids it handed out.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    last: u64,
}

impl IdSequence {
    pub fn next<T: From<u64>>(&mut self) -> T {
        self.last += 1;
        T::from(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_shared_across_id_types() {
        let mut ids = IdSequence::default();
        let user: UserId = ids.next();
        let budget: BudgetId = ids.next();
        assert_eq!(user, UserId(1));
        assert_eq!(budget, BudgetId(2));
        assert_eq!(budget.to_string(), "2");
    }
}
