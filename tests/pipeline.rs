//! End-to-end runs of the listener against real and in-memory stores

use crossbeam_channel::{unbounded, Receiver};
use inputscope_lib::capture::types::now_stamp;
use inputscope_lib::capture::{Category, CaptureTarget, MouseButton, RawInput, RawInputEvent, RawKey};
use inputscope_lib::config::ListenerConfig;
use inputscope_lib::display::ScreenRect;
use inputscope_lib::keyboard::Platform;
use inputscope_lib::listener::{Command, CommandOutcome, CounterSnapshot, Listener};
use inputscope_lib::storage::{EventStore, MemoryStore, RecordFields, SqliteStore};
use std::collections::HashMap;
use std::time::{Duration, Instant};

fn test_config() -> ListenerConfig {
    ListenerConfig {
        events_write_interval: 0.0,
        // Keep pending moves until stop, independent of test speed
        mouse_move_join_interval: 60.0,
        ..Default::default()
    }
}

fn key(key: RawKey, pressed: bool, stamp: f64) -> RawInputEvent {
    RawInputEvent::at(RawInput::Key { key, pressed }, stamp)
}

fn click(x: f64, y: f64, stamp: f64) -> RawInputEvent {
    RawInputEvent::at(
        RawInput::MouseClick {
            x,
            y,
            button: MouseButton::Right,
            pressed: true,
        },
        stamp,
    )
}

fn wait_for(rx: &Receiver<CounterSnapshot>, what: impl Fn(&CounterSnapshot) -> bool) -> CounterSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = rx
            .recv_deadline(deadline)
            .expect("no matching counter snapshot");
        if what(&snapshot) {
            return snapshot;
        }
    }
}

fn key_labels(store: &impl EventStore, category: Category) -> Vec<String> {
    store
        .records(category, None)
        .unwrap()
        .into_iter()
        .map(|r| match r.fields {
            RecordFields::Key { key, .. } => key,
            other => panic!("unexpected fields {:?}", other),
        })
        .collect()
}

#[test]
fn test_session_persists_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inputscope.db");
    let (now, today) = now_stamp();

    let listener = Listener::builder(test_config())
        .platform(Platform::Linux)
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();

    assert_eq!(
        listener
            .handle_line("screen_size [0, 0, 1920, 1080]")
            .unwrap(),
        CommandOutcome::ScreenSizes(1)
    );

    let producer = listener.producer();
    let events = vec![
        key(RawKey::named("ctrl_l"), true, now),
        key(RawKey::code(Some('c'), Some(99)), true, now + 0.1),
        key(RawKey::code(Some('c'), Some(99)), false, now + 0.2),
        key(RawKey::named("ctrl_l"), false, now + 0.3),
        RawInputEvent::at(RawInput::MouseMove { x: 10.0, y: 10.0 }, now + 0.4),
        RawInputEvent::at(RawInput::MouseMove { x: 20.0, y: 20.0 }, now + 0.5),
        RawInputEvent::at(RawInput::MouseMove { x: 30.0, y: 30.0 }, now + 0.6),
        click(700.0, 300.0, now + 0.7),
    ];
    for event in events {
        assert!(producer.push_event(event));
    }
    listener.stop().unwrap();

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(key_labels(&store, Category::Keys), vec!["Lcontrol", "C"]);
    assert_eq!(key_labels(&store, Category::Combos), vec!["Ctrl-C"]);
    // Collinear moves keep only their endpoints
    assert_eq!(store.records(Category::Moves, None).unwrap().len(), 2);

    let clicks = store.records(Category::Clicks, None).unwrap();
    assert_eq!(clicks.len(), 1);
    assert!(matches!(
        clicks[0].fields,
        RecordFields::Mouse {
            button: Some(2),
            display: 0,
            ..
        }
    ));

    assert_eq!(store.day_counts(Category::Keys).unwrap().get(&today), Some(&2));
    assert_eq!(store.screen_sizes().unwrap().len(), 1);
}

#[test]
fn test_restart_restores_display_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inputscope.db");

    let listener = Listener::builder(test_config())
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();
    listener
        .execute(Command::ScreenSize(vec![
            ScreenRect::new(0, 0, 1920, 1080),
            ScreenRect::new(1920, 0, 2560, 1440),
        ]))
        .unwrap();
    listener.stop().unwrap();

    let listener = Listener::builder(test_config())
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();
    // Same layout again is not a change
    assert_eq!(
        listener
            .handle_line("screen_size [[0,0,1920,1080],[1920,0,2560,1440]]")
            .unwrap(),
        CommandOutcome::ScreenSizes(0)
    );
    listener.stop().unwrap();
}

#[test]
fn test_writes_retry_after_storage_failure() {
    let store = MemoryStore::new();
    let (tx, rx) = unbounded();
    let listener = Listener::builder(test_config())
        .on_counts(move |snapshot| {
            let _ = tx.send(snapshot.clone());
        })
        .spawn(store.clone())
        .unwrap();

    store.set_unavailable(true);
    let (now, _) = now_stamp();
    listener.producer().push_event(click(10.0, 10.0, now));

    let failed = wait_for(&rx, |s| s.pending_writes == 1);
    assert!(failed.last_error.is_some());
    assert_eq!(store.len(Category::Clicks), 0);

    store.set_unavailable(false);
    let recovered = wait_for(&rx, |s| s.pending_writes == 0);
    assert_eq!(recovered.written, 1);
    assert_eq!(store.len(Category::Clicks), 1);

    listener.stop().unwrap();
    assert_eq!(store.len(Category::Clicks), 1);
}

#[test]
fn test_stopped_category_and_regions_filter_events() {
    let store = MemoryStore::new();
    let listener = Listener::builder(test_config()).spawn(store.clone()).unwrap();

    listener
        .execute(Command::Stop(CaptureTarget::Category(Category::Moves)))
        .unwrap();
    listener
        .handle_line("configure MouseRegionsOfDisinterest [[0, 0, 100, 100]]")
        .unwrap();

    let (now, _) = now_stamp();
    let producer = listener.producer();
    producer.push_event(RawInputEvent::at(RawInput::MouseMove { x: 500.0, y: 500.0 }, now));
    producer.push_event(click(50.0, 50.0, now + 0.1));
    producer.push_event(click(500.0, 50.0, now + 0.2));
    listener.stop().unwrap();

    assert_eq!(store.len(Category::Moves), 0);
    assert_eq!(store.len(Category::Clicks), 1);
    assert_eq!(listener.snapshot().counts.get(&Category::Clicks), Some(&1));
}

#[test]
fn test_clear_by_input_and_day_range() {
    let store = MemoryStore::new();
    let listener = Listener::builder(test_config())
        .platform(Platform::Windows)
        .spawn(store.clone())
        .unwrap();

    let (now, today) = now_stamp();
    let producer = listener.producer();
    producer.push_event(click(10.0, 10.0, now));
    producer.push_event(key(RawKey::named("space"), true, now + 0.1));
    listener.stop().unwrap();
    assert_eq!(store.len(Category::Keys), 1);

    let listener = Listener::builder(test_config()).spawn(store.clone()).unwrap();
    let line = format!("clear keyboard {} {}", today, today);
    assert_eq!(listener.handle_line(&line).unwrap(), CommandOutcome::Cleared(1));
    assert_eq!(store.len(Category::Keys), 0);
    assert_eq!(store.len(Category::Clicks), 1);
    listener.stop().unwrap();
}

#[test]
fn test_named_session_clear_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inputscope.db");

    let listener = Listener::builder(test_config())
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();
    let CommandOutcome::SessionStarted(id) = listener.handle_line("session start Review").unwrap() else {
        panic!("session not started");
    };
    let (now, today) = now_stamp();
    let producer = listener.producer();
    producer.push_event(click(10.0, 10.0, now));
    producer.push_event(key(RawKey::named("space"), true, now));
    assert_eq!(
        listener.handle_line("session stop").unwrap(),
        CommandOutcome::SessionStopped(Some(id))
    );
    listener.stop().unwrap();

    let listener = Listener::builder(test_config())
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();
    let line = format!("session clear mouse {}", id);
    assert_eq!(listener.handle_line(&line).unwrap(), CommandOutcome::Cleared(1));
    listener.stop().unwrap();

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.records(Category::Clicks, None).unwrap().len(), 0);
    assert_eq!(key_labels(&store, Category::Keys), vec!["Space"]);
    assert_eq!(store.day_counts(Category::Clicks).unwrap().get(&today), Some(&0));
    let sessions = store.sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name, "Review");
    assert!(!sessions[0].is_open());
}

#[test]
fn test_events_tagged_with_program_and_blacklisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inputscope.db");
    let programs = HashMap::from([
        (100u32, "/usr/bin/gimp".to_string()),
        (200u32, r"C:\Tools\KeePass.exe".to_string()),
    ]);

    let listener = Listener::builder(test_config())
        .platform(Platform::Linux)
        .programs(|| None::<u32>, programs)
        .spawn(SqliteStore::open(&path).unwrap())
        .unwrap();
    listener
        .handle_line(r#"configure ProgramBlacklist {"keepass.exe": ["keyboard"]}"#)
        .unwrap();

    let (now, _) = now_stamp();
    let producer = listener.producer();
    producer.push_event(click(10.0, 10.0, now).with_pid(Some(100)));
    producer.push_event(click(20.0, 20.0, now + 0.1).with_pid(Some(200)));
    producer.push_event(key(RawKey::named("space"), true, now + 0.2).with_pid(Some(200)));
    producer.push_event(key(RawKey::named("tab"), true, now + 0.3).with_pid(Some(100)));
    listener.stop().unwrap();

    let store = SqliteStore::open(&path).unwrap();
    let clicks: Vec<_> = store
        .records(Category::Clicks, None)
        .unwrap()
        .into_iter()
        .map(|r| r.program)
        .collect();
    assert_eq!(
        clicks,
        vec![
            Some("/usr/bin/gimp".to_string()),
            Some(r"C:\Tools\KeePass.exe".to_string()),
        ]
    );
    let keys = store.records(Category::Keys, None).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].program.as_deref(), Some("/usr/bin/gimp"));
    assert_eq!(store.programs().unwrap().len(), 2);
}
