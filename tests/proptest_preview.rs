use proptest::prelude::*;
use smearscope::preview::{FrameOutcome, PollStep, PollerState, PreviewSession};

mod proptest_helpers;

const THRESHOLD: u32 = 3;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn trips_exactly_at_the_first_run_of_three_failures(
        outcomes in prop::collection::vec(proptest_helpers::arb_frame_outcome(), 0..60)
    ) {
        let mut session = PreviewSession::new(THRESHOLD);
        session.start();

        let mut run = 0u32;
        let mut tripped = false;
        for outcome in outcomes {
            let failed = matches!(outcome, FrameOutcome::Failed(_));
            let step = session.record(outcome);

            if tripped {
                prop_assert_eq!(step, PollStep::Ignored);
                continue;
            }
            run = if failed { run + 1 } else { 0 };
            if run == THRESHOLD {
                prop_assert!(matches!(step, PollStep::Tripped(_)), "{:?}", step);
                prop_assert!(matches!(session.state(), PollerState::Tripped { .. }), "{:?}", session.state());
                tripped = true;
            } else {
                prop_assert!(session.is_active());
                prop_assert_eq!(session.consecutive_failures(), run);
            }
        }
    }

    #[test]
    fn trip_message_names_the_last_failure(
        failures in prop::collection::vec(proptest_helpers::arb_failure(), 3)
    ) {
        let mut session = PreviewSession::new(THRESHOLD);
        session.start();
        let mut last = None;
        for cause in failures {
            last = Some(session.record(FrameOutcome::Failed(cause)));
        }
        match last {
            Some(PollStep::Tripped(notice)) => {
                prop_assert_eq!(notice.message, notice.cause.message());
            }
            other => prop_assert!(false, "expected a trip, got {:?}", other),
        }
    }
}
