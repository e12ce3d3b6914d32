//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum, `None` for unknown IDs.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Processing batch lifecycle status.
    ///
    /// Derived by the progression engine; only `Cancelled` is ever requested
    /// directly by a client.
    BatchStatus {
        NotStarted = 1,
        InProgress = 2,
        AwaitingEvaluation = 3,
        Completed = 4,
        Cancelled = 5,
    }
}

impl BatchStatus {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::AwaitingEvaluation => "Awaiting Evaluation",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the batch can no longer change status (other than by cancel).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_status_ids_match_seed_data() {
        assert_eq!(BatchStatus::NotStarted.id(), 1);
        assert_eq!(BatchStatus::InProgress.id(), 2);
        assert_eq!(BatchStatus::AwaitingEvaluation.id(), 3);
        assert_eq!(BatchStatus::Completed.id(), 4);
        assert_eq!(BatchStatus::Cancelled.id(), 5);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = BatchStatus::AwaitingEvaluation.into();
        assert_eq!(id, 3);
    }

    #[test]
    fn from_id_round_trips_known_ids() {
        for id in 1..=5 {
            let status = BatchStatus::from_id(id).expect("seeded id");
            assert_eq!(status.id(), id);
        }
    }

    #[test]
    fn from_id_rejects_unknown_ids() {
        assert_eq!(BatchStatus::from_id(0), None);
        assert_eq!(BatchStatus::from_id(6), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Cancelled.is_terminal());
        assert!(!BatchStatus::AwaitingEvaluation.is_terminal());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&BatchStatus::AwaitingEvaluation).unwrap();
        assert_eq!(json, "\"awaiting_evaluation\"");
    }
}
