//! The shipment-note state machine.
//!
//! Every status change a note can undergo is listed here once. Services never
//! write `status` directly; they ask this table for the target status and then
//! apply it with a compare-and-set on the source status.

use crate::errors::ServiceError;
use crate::models::{NoteEventKind, NoteStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum NoteTransition {
    /// `PENDING → MUAT`
    AssignToBatch,
    /// `MUAT → TRANSIT`
    Depart,
    /// `MUAT | TRANSIT → LANSIR`
    AssignToRun,
    /// `LANSIR → TERKIRIM`
    Deliver,
    /// `LANSIR → RETURN`
    Fail,
    /// `MUAT | TRANSIT → RETURN`, sent back before reaching a delivery run
    ReturnToSender,
}

impl NoteTransition {
    pub const ALL: [NoteTransition; 6] = [
        NoteTransition::AssignToBatch,
        NoteTransition::Depart,
        NoteTransition::AssignToRun,
        NoteTransition::Deliver,
        NoteTransition::Fail,
        NoteTransition::ReturnToSender,
    ];

    pub fn sources(self) -> &'static [NoteStatus] {
        match self {
            NoteTransition::AssignToBatch => &[NoteStatus::Pending],
            NoteTransition::Depart => &[NoteStatus::Muat],
            NoteTransition::AssignToRun => &[NoteStatus::Muat, NoteStatus::Transit],
            NoteTransition::Deliver | NoteTransition::Fail => &[NoteStatus::Lansir],
            NoteTransition::ReturnToSender => &[NoteStatus::Muat, NoteStatus::Transit],
        }
    }

    pub fn target(self) -> NoteStatus {
        match self {
            NoteTransition::AssignToBatch => NoteStatus::Muat,
            NoteTransition::Depart => NoteStatus::Transit,
            NoteTransition::AssignToRun => NoteStatus::Lansir,
            NoteTransition::Deliver => NoteStatus::Terkirim,
            NoteTransition::Fail | NoteTransition::ReturnToSender => NoteStatus::Return,
        }
    }

    pub fn event_kind(self) -> NoteEventKind {
        match self {
            NoteTransition::AssignToBatch => NoteEventKind::Loaded,
            NoteTransition::Depart => NoteEventKind::Departed,
            NoteTransition::AssignToRun => NoteEventKind::OutForDelivery,
            NoteTransition::Deliver => NoteEventKind::Delivered,
            NoteTransition::Fail | NoteTransition::ReturnToSender => NoteEventKind::Returned,
        }
    }

    pub fn allows(self, from: NoteStatus) -> bool {
        self.sources().contains(&from)
    }

    /// Target status for a note currently in `from`.
    ///
    /// Terminal notes are rejected with `AlreadyTerminal`; any other unmet
    /// precondition is `InvalidTransition`.
    pub fn apply(self, from: NoteStatus) -> Result<NoteStatus, ServiceError> {
        if from.is_terminal() {
            return Err(ServiceError::AlreadyTerminal(format!(
                "note is {} and cannot {}",
                from, self
            )));
        }
        if !self.allows(from) {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot {} a note in status {}",
                self, from
            )));
        }
        Ok(self.target())
    }
}

/// Rank along the forward path; `RETURN` sits past every non-terminal status.
pub fn progress_rank(status: NoteStatus) -> u8 {
    match status {
        NoteStatus::Pending => 0,
        NoteStatus::Muat => 1,
        NoteStatus::Transit => 2,
        NoteStatus::Lansir => 3,
        NoteStatus::Terkirim | NoteStatus::Return => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use sea_orm::Iterable;

    #[test]
    fn happy_path_walks_forward() {
        let mut status = NoteStatus::Pending;
        for step in [
            NoteTransition::AssignToBatch,
            NoteTransition::Depart,
            NoteTransition::AssignToRun,
            NoteTransition::Deliver,
        ] {
            status = step.apply(status).unwrap();
        }
        assert_eq!(status, NoteStatus::Terkirim);
    }

    #[test]
    fn delivery_run_accepts_loaded_and_transit_notes() {
        assert_eq!(
            NoteTransition::AssignToRun.apply(NoteStatus::Muat).unwrap(),
            NoteStatus::Lansir
        );
        assert_eq!(
            NoteTransition::AssignToRun.apply(NoteStatus::Transit).unwrap(),
            NoteStatus::Lansir
        );
        assert_matches!(
            NoteTransition::AssignToRun.apply(NoteStatus::Pending),
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[test]
    fn return_is_reachable_from_muat_transit_and_lansir() {
        for from in [NoteStatus::Muat, NoteStatus::Transit] {
            assert_eq!(
                NoteTransition::ReturnToSender.apply(from).unwrap(),
                NoteStatus::Return
            );
        }
        assert_eq!(
            NoteTransition::Fail.apply(NoteStatus::Lansir).unwrap(),
            NoteStatus::Return
        );
        assert_matches!(
            NoteTransition::ReturnToSender.apply(NoteStatus::Pending),
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[test]
    fn terminal_notes_report_already_terminal() {
        for transition in NoteTransition::ALL {
            assert_matches!(
                transition.apply(NoteStatus::Terkirim),
                Err(ServiceError::AlreadyTerminal(_))
            );
            assert_matches!(
                transition.apply(NoteStatus::Return),
                Err(ServiceError::AlreadyTerminal(_))
            );
        }
    }

    fn any_status() -> impl Strategy<Value = NoteStatus> {
        prop::sample::select(NoteStatus::iter().collect::<Vec<_>>())
    }

    fn any_transition() -> impl Strategy<Value = NoteTransition> {
        prop::sample::select(NoteTransition::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn accepted_transitions_never_move_backwards(
            from in any_status(),
            transition in any_transition(),
        ) {
            if let Ok(to) = transition.apply(from) {
                prop_assert!(progress_rank(to) > progress_rank(from));
            }
        }

        #[test]
        fn terminal_status_is_absorbing(
            steps in prop::collection::vec(any_transition(), 1..12),
        ) {
            let mut status = NoteStatus::Pending;
            let mut reached_terminal = false;
            for step in steps {
                match step.apply(status) {
                    Ok(next) => {
                        prop_assert!(!reached_terminal);
                        status = next;
                        reached_terminal = status.is_terminal();
                    }
                    Err(e) => prop_assert!(
                        !reached_terminal || matches!(e, ServiceError::AlreadyTerminal(_))
                    ),
                }
            }
        }
    }
}
