use std::sync::Arc;

use relaychat::relay::connection::Outbound;
use relaychat::relay::{Connection, Inbound, Outcome, ProtocolHandler, SessionRegistry};
use tokio::sync::mpsc::{self, Receiver};

fn setup() -> (Arc<SessionRegistry>, ProtocolHandler) {
    let registry = Arc::new(SessionRegistry::new());
    let handler = ProtocolHandler::new(registry.clone());
    (registry, handler)
}

fn attach(registry: &SessionRegistry) -> (Arc<Connection>, Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(64);
    let conn = Arc::new(Connection::new(registry.next_connection_id(), None, tx));
    registry.attach(conn.clone());
    (conn, rx)
}

fn drain(rx: &mut Receiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

fn line(s: &str) -> Outbound {
    Outbound::Line(s.to_string())
}

fn text(s: &str) -> Inbound {
    Inbound::Text(s.to_string())
}

#[test]
fn login_then_chat_reaches_everyone() {
    let (registry, handler) = setup();
    let (alice, mut alice_rx) = attach(&registry);
    let (_other, mut other_rx) = attach(&registry);

    assert_eq!(handler.handle(&alice, text("#login alice")), Outcome::Continue);
    assert_eq!(registry.lookup(alice.id()).as_deref(), Some("alice"));
    assert_eq!(drain(&mut alice_rx), vec![line("alice has logged on.")]);
    // Unauthenticated connections are still broadcast targets
    assert_eq!(drain(&mut other_rx), vec![line("alice has logged on.")]);

    assert_eq!(handler.handle(&alice, text("hello")), Outcome::Continue);
    assert_eq!(drain(&mut alice_rx), vec![line("alice> hello")]);
    assert_eq!(drain(&mut other_rx), vec![line("alice> hello")]);
}

#[test]
fn first_line_must_be_login() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    let (_other, mut other_rx) = attach(&registry);

    assert_eq!(handler.handle(&conn, text("hello")), Outcome::Close);
    assert_eq!(
        drain(&mut rx),
        vec![line("ERROR: first message must be #login <id>; disconnecting."), Outbound::Close]
    );
    assert!(conn.is_closed());
    assert_eq!(registry.lookup(conn.id()), None);
    assert!(drain(&mut other_rx).is_empty(), "unauthenticated chat must never be relayed");
}

#[test]
fn empty_login_id_is_rejected() {
    let (registry, handler) = setup();
    for attempt in ["#login ", "#login", "#login    ", "#login\t", "#login\t \t"] {
        let (conn, mut rx) = attach(&registry);
        assert_eq!(handler.handle(&conn, text(attempt)), Outcome::Close);
        assert_eq!(
            drain(&mut rx),
            vec![line("ERROR: missing login id; disconnecting."), Outbound::Close],
            "attempt {:?}",
            attempt
        );
        assert_eq!(registry.lookup(conn.id()), None);
    }
}

#[test]
fn tab_separates_login_id() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    assert_eq!(handler.handle(&conn, text("#login\tzoe")), Outcome::Continue);
    assert_eq!(registry.lookup(conn.id()).as_deref(), Some("zoe"));
    assert_eq!(drain(&mut rx), vec![line("zoe has logged on.")]);
}

#[test]
fn oversized_line_is_rejected_before_login_checks() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    handler.handle(&conn, text("#login gil"));
    drain(&mut rx);

    assert_eq!(handler.reject_oversized(&conn, 10_000), Outcome::Close);
    assert_eq!(
        drain(&mut rx),
        vec![line("ERROR: line too long; disconnecting."), Outbound::Close]
    );
    assert!(conn.is_closed());
}

#[test]
fn second_login_closes_connection() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    let (_other, mut other_rx) = attach(&registry);
    handler.handle(&conn, text("#login alice"));
    drain(&mut rx);
    drain(&mut other_rx);

    assert_eq!(handler.handle(&conn, text("#login bob")), Outcome::Close);
    assert_eq!(
        drain(&mut rx),
        vec![line("ERROR: already logged in; connection will close."), Outbound::Close]
    );
    assert!(drain(&mut other_rx).is_empty());
    // The identifier never changes
    assert_eq!(registry.lookup(conn.id()).as_deref(), Some("alice"));
}

#[test]
fn bare_login_after_authentication_is_also_a_violation() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    handler.handle(&conn, text("#login alice"));
    drain(&mut rx);
    assert_eq!(handler.handle(&conn, text("#login")), Outcome::Close);
    assert_eq!(drain(&mut rx)[0], line("ERROR: already logged in; connection will close."));
}

#[test]
fn non_text_frames_are_ignored() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);

    assert_eq!(handler.handle(&conn, Inbound::Binary(vec![0xff, 0x00])), Outcome::Continue);
    assert!(drain(&mut rx).is_empty());
    assert!(!conn.is_closed());

    // Still unauthenticated; login works afterwards
    assert_eq!(handler.handle(&conn, text("#login carol")), Outcome::Continue);
    assert_eq!(drain(&mut rx), vec![line("carol has logged on.")]);
}

#[test]
fn login_ids_need_not_be_unique() {
    let (registry, handler) = setup();
    let (a, _a_rx) = attach(&registry);
    let (b, _b_rx) = attach(&registry);
    assert_eq!(handler.handle(&a, text("#login twin")), Outcome::Continue);
    assert_eq!(handler.handle(&b, text("#login twin")), Outcome::Continue);
    assert_eq!(registry.logged_in_count(), 2);
}

#[test]
fn chat_line_keeps_original_message_verbatim() {
    let (registry, handler) = setup();
    let (conn, mut rx) = attach(&registry);
    handler.handle(&conn, text("#login dan"));
    drain(&mut rx);
    handler.handle(&conn, text("  #notacommand  spaced "));
    assert_eq!(drain(&mut rx), vec![line("dan>   #notacommand  spaced ")]);
}

#[test]
fn unregister_is_idempotent() {
    let (registry, handler) = setup();
    let (conn, _rx) = attach(&registry);
    handler.handle(&conn, text("#login erin"));

    let removed = registry.unregister(conn.id()).expect("registered");
    assert_eq!(removed.login_id.as_deref(), Some("erin"));
    assert!(registry.unregister(conn.id()).is_none());
    assert_eq!(registry.lookup(conn.id()), None);
    assert_eq!(registry.connection_count(), 0);
}

#[test]
fn concurrent_logins_each_end_authenticated() {
    let (registry, handler) = setup();
    let conns: Vec<_> = (0..16).map(|_| attach(&registry)).collect();

    std::thread::scope(|scope| {
        for (i, (conn, _)) in conns.iter().enumerate() {
            let handler = &handler;
            scope.spawn(move || {
                assert_eq!(handler.handle(conn, text(&format!("#login user{}", i))), Outcome::Continue);
            });
        }
    });

    assert_eq!(registry.logged_in_count(), 16);
    for (i, (conn, _)) in conns.iter().enumerate() {
        assert_eq!(registry.lookup(conn.id()), Some(format!("user{}", i)));
        assert!(!conn.is_closed());
    }
}

#[test]
fn racing_logins_on_one_connection_admit_exactly_one() {
    let (registry, handler) = setup();
    let (conn, _rx) = attach(&registry);

    let outcomes: Vec<Outcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = ["#login left", "#login right"]
            .into_iter()
            .map(|attempt| {
                let handler = &handler;
                let conn = &conn;
                scope.spawn(move || handler.handle(conn, text(attempt)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(outcomes.contains(&Outcome::Continue));
    assert!(outcomes.contains(&Outcome::Close));
    let id = registry.lookup(conn.id()).expect("one login won");
    assert!(id == "left" || id == "right");
}

#[test]
fn relay_counters_advance() {
    let before = relaychat::metrics::snapshot();
    let (registry, handler) = setup();
    let (good, _good_rx) = attach(&registry);
    let (bad, _bad_rx) = attach(&registry);
    handler.handle(&good, text("#login frank"));
    handler.handle(&good, text("hi"));
    handler.handle(&bad, text("no login"));

    let after = relaychat::metrics::snapshot();
    assert!(after.logins > before.logins);
    assert!(after.messages_relayed > before.messages_relayed);
    assert!(after.protocol_violations > before.protocol_violations);
}
