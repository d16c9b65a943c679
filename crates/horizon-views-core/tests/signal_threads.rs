use std::sync::Arc;
use std::thread::ThreadId;

use horizon_views_core::{Signal, ThreadAffinity};
use parking_lot::Mutex;

#[test]
fn test_slots_run_on_emitting_thread() {
    let signal = Arc::new(Signal::<u32>::new());
    let seen: Arc<Mutex<Vec<(u32, ThreadId)>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = seen.clone();
    signal.connect(move |&n| {
        seen_clone.lock().push((n, std::thread::current().id()));
    });

    let emitter = signal.clone();
    let worker_id = std::thread::spawn(move || {
        emitter.emit(7);
        std::thread::current().id()
    })
    .join()
    .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (7, worker_id));
}

#[test]
fn test_affinity_check_inside_slot_detects_foreign_emit() {
    let affinity = ThreadAffinity::current();
    let signal = Arc::new(Signal::<()>::new());
    let violations = Arc::new(Mutex::new(0usize));

    let violations_clone = violations.clone();
    signal.connect(move |_| {
        if affinity.check().is_err() {
            *violations_clone.lock() += 1;
        }
    });

    signal.emit(());
    let emitter = signal.clone();
    std::thread::spawn(move || emitter.emit(())).join().unwrap();

    assert_eq!(*violations.lock(), 1);
}
