//! Property tests for the state store merge and derived views

use laserdeck_core::{
    ComponentStatus, DiodeTest, MachineState, PrintJob, StateUpdate, UiStateStore, WifiStatus,
};
use proptest::prelude::*;

fn diode_test() -> impl Strategy<Value = DiodeTest> {
    prop_oneof![
        Just(DiodeTest::NotRun),
        Just(DiodeTest::Passed),
        Just(DiodeTest::Failed),
    ]
}

fn print_job() -> impl Strategy<Value = PrintJob> {
    (
        "[a-z]{0,8}\\.bin",
        0u32..10_000,
        0u32..10_000,
        any::<u32>(),
        0u32..10,
        0u32..256,
        any::<bool>(),
    )
        .prop_map(
            |(filename, a, b, elapsed, exposure, power, single_facet)| PrintJob {
                filename,
                current_line: a.min(b),
                total_lines: a.max(b),
                elapsed_seconds: u64::from(elapsed),
                exposure_per_line: exposure,
                laser_power: power,
                single_facet,
            },
        )
}

fn components() -> impl Strategy<Value = ComponentStatus> {
    (any::<bool>(), any::<bool>(), diode_test()).prop_map(|(rotating, laser, diode_test)| {
        ComponentStatus {
            rotating,
            laser,
            diode_test,
        }
    })
}

fn wifi() -> impl Strategy<Value = WifiStatus> {
    (
        any::<bool>(),
        prop::collection::vec("[a-z]{1,6}", 0..3),
        "[a-z]{0,6}",
    )
        .prop_map(|(connected, available, ssid)| WifiStatus {
            connected,
            available,
            ssid,
        })
}

fn state_update() -> impl Strategy<Value = StateUpdate> {
    (
        prop::option::of(any::<bool>()),
        prop::option::of(any::<bool>()),
        prop::option::of(print_job()),
        prop::option::of(components()),
        prop::option::of(prop::collection::vec("[a-z]{1,6}\\.bin", 0..4)),
        prop::option::of(wifi()),
    )
        .prop_map(
            |(printing, paused, job, components, files, wifi)| StateUpdate {
                printing,
                paused,
                job,
                components,
                files,
                wifi,
            },
        )
}

fn machine_state() -> impl Strategy<Value = MachineState> {
    (
        any::<bool>(),
        any::<bool>(),
        print_job(),
        components(),
        prop::collection::vec("[a-z]{1,6}\\.bin", 0..4),
        wifi(),
    )
        .prop_map(
            |(printing, paused, job, components, files, wifi)| MachineState {
                printing,
                paused,
                job,
                components,
                files,
                wifi,
            },
        )
}

proptest! {
    #[test]
    fn absent_fields_keep_previous_value(before in machine_state(), update in state_update()) {
        let store = UiStateStore::with_state(before.clone());
        store.update(update.clone());
        let after = store.snapshot();

        prop_assert_eq!(after.printing, update.printing.unwrap_or(before.printing));
        prop_assert_eq!(after.paused, update.paused.unwrap_or(before.paused));
        prop_assert_eq!(&after.job, update.job.as_ref().unwrap_or(&before.job));
        prop_assert_eq!(after.components, update.components.unwrap_or(before.components));
        prop_assert_eq!(&after.files, update.files.as_ref().unwrap_or(&before.files));
        prop_assert_eq!(&after.wifi, update.wifi.as_ref().unwrap_or(&before.wifi));
    }

    #[test]
    fn progress_matches_rounded_fraction(job in print_job()) {
        let store = UiStateStore::new();
        store.update(StateUpdate { job: Some(job.clone()), ..Default::default() });

        let expected = if job.total_lines == 0 {
            0
        } else {
            (f64::from(job.current_line) / f64::from(job.total_lines) * 100.0).round() as u32
        };
        prop_assert_eq!(store.progress_percent(), expected);
        prop_assert!(store.progress_percent() <= 100);
    }
}

#[test]
fn finished_job_is_one_hundred_percent() {
    let store = UiStateStore::new();
    store.update(
        StateUpdate::from_json(r#"{"job":{"currentline":200,"totallines":200}}"#).unwrap(),
    );
    assert_eq!(store.progress_percent(), 100);
}
