//! Integration tests for the persistence gateway over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use skirmish_persistence::{
    MemoryCache, MemoryDatabase, PRESENCE_KEY, PersistenceConfig, PersistenceGateway,
    PersistenceRequest, PersistenceSink, chat_key,
};
use skirmish_protocol::{RoomId, SessionId};

/// Records every registration result.
#[derive(Default)]
struct RecordingSink {
    results: Mutex<Vec<(SessionId, bool)>>,
}

impl PersistenceSink for RecordingSink {
    fn register_completed(&self, session_id: SessionId, success: bool) {
        self.results.lock().push((session_id, success));
    }
}

struct Fixture {
    db: MemoryDatabase,
    cache: MemoryCache,
    sink: Arc<RecordingSink>,
    gateway: PersistenceGateway,
}

fn start(config: PersistenceConfig) -> Fixture {
    let db = MemoryDatabase::new();
    let cache = MemoryCache::new();
    let sink = Arc::new(RecordingSink::default());
    let gateway = PersistenceGateway::start(
        Arc::new(db.clone()),
        Arc::new(cache.clone()),
        config,
        Arc::clone(&sink) as Arc<dyn PersistenceSink>,
    )
    .expect("gateway should start");
    Fixture {
        db,
        cache,
        sink,
        gateway,
    }
}

fn register(session: u32, name: &str) -> PersistenceRequest {
    PersistenceRequest::Register {
        session_id: SessionId(session),
        username: name.into(),
        password: "pw".into(),
    }
}

/// Polls until `f` holds or a second passes.
fn eventually(f: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_start_opens_one_connection_per_worker_plus_auth() {
    let fx = start(PersistenceConfig {
        workers: 3,
        ..PersistenceConfig::default()
    });
    assert_eq!(fx.db.connections_opened(), 4);
    fx.gateway.stop();
}

#[test]
fn test_start_fails_when_database_is_down() {
    let db = MemoryDatabase::new();
    db.refuse_connections();
    let result = PersistenceGateway::start(
        Arc::new(db),
        Arc::new(MemoryCache::new()),
        PersistenceConfig::default(),
        Arc::new(RecordingSink::default()),
    );
    assert!(result.is_err());
}

#[test]
fn test_register_reports_success_then_duplicate() {
    let fx = start(PersistenceConfig {
        workers: 1,
        ..PersistenceConfig::default()
    });
    assert!(fx.gateway.post_async(register(1, "bob")));
    assert!(fx.gateway.post_async(register(2, "bob")));

    assert!(eventually(|| fx.sink.results.lock().len() == 2));
    assert_eq!(
        *fx.sink.results.lock(),
        vec![(SessionId(1), true), (SessionId(2), false)]
    );
    assert!(fx.db.user("bob").is_some());
}

#[test]
fn test_register_db_failure_reports_false() {
    let fx = start(PersistenceConfig::default());
    fx.db.fail_next_execute(1);
    fx.gateway.post_async(register(5, "amy"));
    assert!(eventually(|| !fx.sink.results.lock().is_empty()));
    assert_eq!(fx.sink.results.lock()[0], (SessionId(5), false));
}

#[test]
fn test_stop_drains_queue_before_joining() {
    let fx = start(PersistenceConfig {
        workers: 2,
        ..PersistenceConfig::default()
    });
    for i in 0..100 {
        fx.gateway.post_async(PersistenceRequest::SaveChat {
            session_id: SessionId(1),
            username: "bob".into(),
            message: format!("line {i}"),
            room_id: RoomId(42),
        });
    }
    fx.gateway.stop();

    assert_eq!(fx.db.chat_log().len(), 100);
    assert_eq!(fx.gateway.pending(), 0);
    assert!(!fx.gateway.post_async(register(1, "late")));
    fx.gateway.stop();
}

#[test]
fn test_save_chat_failure_is_swallowed() {
    let fx = start(PersistenceConfig {
        workers: 1,
        ..PersistenceConfig::default()
    });
    fx.db.fail_next_execute(1);
    for message in ["lost", "kept"] {
        fx.gateway.post_async(PersistenceRequest::SaveChat {
            session_id: SessionId(1),
            username: "bob".into(),
            message: message.into(),
            room_id: RoomId(1),
        });
    }
    fx.gateway.stop();
    let log = fx.db.chat_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].message, "kept");
    assert_eq!(log[0].session_id, SessionId(1));
}

#[test]
fn test_authenticate() {
    let fx = start(PersistenceConfig::default());
    fx.db.seed_user(42, "bob", "secret");

    assert_eq!(fx.gateway.authenticate("bob", "secret"), Some(42));
    assert_eq!(fx.gateway.authenticate("bob", "wrong"), None);
    assert_eq!(fx.gateway.authenticate("nobody", "secret"), None);
}

#[test]
fn test_presence_is_add_if_absent() {
    let fx = start(PersistenceConfig::default());
    assert!(fx.gateway.check_and_register_presence("bob"));
    assert!(!fx.gateway.check_and_register_presence("bob"));
    assert_eq!(fx.cache.set_members(PRESENCE_KEY), vec!["bob"]);

    fx.gateway.remove_presence("bob");
    assert!(fx.cache.set_members(PRESENCE_KEY).is_empty());
    assert!(fx.gateway.check_and_register_presence("bob"));
}

#[test]
fn test_chat_history_is_bounded_and_newest_first() {
    let fx = start(PersistenceConfig::default());
    for i in 0..60 {
        fx.gateway.cache_chat(RoomId(7), "bob", &format!("m{i}"));
    }
    let recent = fx.gateway.recent_chat(RoomId(7));
    assert_eq!(recent.len(), 50);
    assert_eq!(recent[0], "bob: m59");
    assert_eq!(recent[49], "bob: m10");
    assert_eq!(fx.cache.list_len(&chat_key(RoomId(7))), 50);
    assert!(fx.gateway.recent_chat(RoomId(8)).is_empty());
}

#[test]
fn test_zero_history_len_disables_chat_cache() {
    let fx = start(PersistenceConfig {
        chat_history_len: 0,
        ..PersistenceConfig::default()
    });
    fx.gateway.cache_chat(RoomId(7), "bob", "hello");
    assert_eq!(fx.cache.list_len(&chat_key(RoomId(7))), 0);
    assert!(fx.gateway.recent_chat(RoomId(7)).is_empty());
}
