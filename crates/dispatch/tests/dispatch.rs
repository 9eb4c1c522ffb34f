use std::sync::{Arc, Mutex};

use codec::{Bundle, Message};
use dispatch::{Dispatcher, HandlerError};

type Log = Arc<Mutex<Vec<String>>>;

fn record(
    log: &Log,
    name: &'static str,
) -> impl Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |msg: &Message| {
        log.lock().unwrap().push(format!("{name} {}", msg.address()));
        Ok(())
    }
}

#[test]
fn overlapping_patterns_fire_in_registration_order() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register("/foo/*", record(&log, "star"));
    dispatcher.register("/foo/bar", record(&log, "exact"));
    dispatcher.register("/foo/{bar,baz}", record(&log, "alternatives"));
    dispatcher.register("/other", record(&log, "other"));

    assert_eq!(dispatcher.dispatch(&Message::new("/foo/bar")), 3);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["star /foo/bar", "exact /foo/bar", "alternatives /foo/bar"]
    );
}

#[test]
fn wildcard_address_reaches_literal_patterns() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register("/synth/1/freq", record(&log, "one"));
    dispatcher.register("/synth/2/freq", record(&log, "two"));
    dispatcher.register("/synth/1/gain", record(&log, "gain"));

    assert_eq!(dispatcher.dispatch(&Message::new("/synth/*/freq")), 2);
}

#[test]
fn failing_and_panicking_handlers_do_not_stop_later_ones() {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register("/x", |_: &Message| Err("refused".into()));
    dispatcher.register("/?", |_: &Message| panic!("handler blew up"));
    dispatcher.register("/*", record(&log, "last"));

    assert_eq!(dispatcher.dispatch(&Message::new("/x")), 3);
    assert_eq!(*log.lock().unwrap(), vec!["last /x"]);

    // the table is still usable afterwards
    assert_eq!(dispatcher.dispatch(&Message::new("/y")), 2);
}

#[test]
fn handlers_may_change_the_table() {
    let dispatcher = Arc::new(Dispatcher::new());
    let log = Log::default();

    let inner = Arc::clone(&dispatcher);
    let inner_log = Arc::clone(&log);
    dispatcher.register("/register", move |_: &Message| {
        inner.register("/late", record(&inner_log, "late"));
        inner.remove("/register");
        Ok(())
    });

    assert_eq!(dispatcher.dispatch(&Message::new("/register")), 1);
    assert_eq!(dispatcher.patterns(), vec!["/late"]);
    assert_eq!(dispatcher.dispatch(&Message::new("/late")), 1);
    assert_eq!(*log.lock().unwrap(), vec!["late /late"]);
}

#[test]
fn handlers_see_decoded_arguments() -> eyre::Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new();
    let sink = Arc::clone(&seen);
    dispatcher.register("/fader/*", move |msg: &Message| {
        sink.lock().unwrap().push(msg.arg(0)?.float32()?);
        Ok(())
    });

    let bundle = Bundle::new()
        .with(&Message::new("/fader/1").with(0.25f32))
        .with(&Bundle::new().with(&Message::new("/fader/2").with(0.5f32)));
    assert_eq!(dispatcher.dispatch_packet(&bundle.to_bytes())?, 2);
    assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5]);
    Ok(())
}

#[test]
fn one_bad_packet_does_not_affect_the_next() -> eyre::Result<()> {
    let log = Log::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register("/ok", record(&log, "ok"));

    assert!(dispatcher.dispatch_packet(b"/ok\0,i\0\0").is_err());
    assert_eq!(dispatcher.dispatch_packet(&Message::new("/ok").to_bytes())?, 1);
    assert_eq!(*log.lock().unwrap(), vec!["ok /ok"]);
    Ok(())
}

#[test]
fn shared_across_threads() {
    let log = Log::default();
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register("/t/*", record(&log, "t"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    dispatcher.dispatch(&Message::new(format!("/t/{i}")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(log.lock().unwrap().len(), 100);
}
