use std::{collections::BTreeSet, sync::Arc};

use mailcache::{
    cache::CacheStore, config::CacheConfig, header::ConversationId, slot::FolderSlot,
    sync::{self, SyncEngine},
};
use mailcache_testing::{raw_message, MemoryServer, Op};
use tempfile::tempdir;

fn ids(ids: &[&str]) -> BTreeSet<ConversationId> {
    ids.iter().map(|id| ConversationId::new(id)).collect()
}

#[test_log::test(tokio::test)]
async fn test_update_removes_stale_and_fetches_new_slots_only() {
    let server = MemoryServer::new("imap.localhost");
    server.append_with_id("F", 3, raw_message("a@localhost", &[], "A"));
    server.append_with_id("F", 5, raw_message("b@localhost", &[], "B"));
    server.append_with_id("F", 7, raw_message("c@localhost", &[], "C"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());

    let report = engine.update(None).await.unwrap();
    assert_eq!(report.added(), 3);
    assert_eq!(report.attempts, 1);

    server.remove("F", 5);
    server.append_with_id("F", 9, raw_message("d@localhost", &[], "D"));
    server.reset_counts();

    let report = engine.update(None).await.unwrap();
    let folder = &report.folders["F"];
    assert_eq!(folder.removed, 1);
    assert_eq!(folder.added, 1);
    assert_eq!(folder.aliased, 0);

    assert_eq!(server.count(Op::FetchHeader), 1);
    assert_eq!(server.count(Op::FetchSize), 1);

    let cache = engine.cache();
    let cached_ids: Vec<u32> = cache.slots_in("F").map(|slot| slot.id).collect();
    assert_eq!(cached_ids, vec![3, 7, 9]);
    assert!(!cache.contains_slot(&FolderSlot::new("F", 5)));
    assert!(cache.check_invariants().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_update_aliases_same_content_across_folders() {
    let server = MemoryServer::new("imap.localhost");
    let a = raw_message("a@localhost", &[], "A");
    server.append("INBOX", &a);
    server.append("[Gmail]/All Mail", &a);
    server.append("[Gmail]/All Mail", raw_message("b@localhost", &[], "B"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());

    let report = engine.update(None).await.unwrap();
    assert_eq!(report.added(), 2);
    assert_eq!(report.aliased(), 1);

    let cache = engine.cache();
    assert_eq!(cache.len(), 2);
    assert_eq!(
        cache.labels_of(&FolderSlot::new("[Gmail]/All Mail", 1)).unwrap(),
        BTreeSet::from_iter(["INBOX".to_owned(), "[Gmail]/All Mail".to_owned()])
    );
    assert_eq!(
        cache.labels_of(&FolderSlot::new("[Gmail]/All Mail", 2)).unwrap(),
        BTreeSet::from_iter(["[Gmail]/All Mail".to_owned()])
    );
}

#[test_log::test(tokio::test)]
async fn test_update_retries_with_fresh_session() {
    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.append("INBOX", raw_message("b@localhost", &[], "B"));
    server.fail_on(Op::FetchHeader, 2, 1);

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());

    let report = engine.update(None).await.unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(server.count(Op::CloneSession), 2);
    // the first slot was cached by the failed attempt, so it is not
    // fetched again
    assert_eq!(server.count(Op::FetchHeader), 3);
    assert_eq!(report.added(), 1);
    assert_eq!(engine.cache().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_update_gives_up_after_max_attempts() {
    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.fail(Op::ListFolders, 3);

    let config = CacheConfig {
        max_attempts: Some(2),
        ..CacheConfig::new("test")
    };
    let mut engine = SyncEngine::new(Arc::new(config), server.boxed_session());

    let err = engine.update(None).await.unwrap_err();
    assert!(matches!(err, sync::Error::ListFoldersError(_)));
    assert_eq!(server.count(Op::CloneSession), 3);
    assert!(engine.cache().is_empty());

    // the retry counter is reset for the next update
    let report = engine.update(None).await.unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(engine.cache().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_update_removes_vanished_folders() {
    let server = MemoryServer::new("imap.localhost");
    server.append("A", raw_message("a@localhost", &[], "A"));
    server.append("B", raw_message("b@localhost", &[], "B"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());
    engine.update(None).await.unwrap();

    server.delete_folder("B");
    let report = engine.update(None).await.unwrap();

    assert_eq!(report.folders["B"].removed, 1);
    assert_eq!(engine.cache().folders(), BTreeSet::from_iter(["A"]));
    assert_eq!(engine.cache().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_update_skips_excluded_folders() {
    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.append("[Gmail]/Trash", raw_message("b@localhost", &[], "B"));
    server.append("[Gmail]/Spam", raw_message("c@localhost", &[], "C"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());

    engine.update(None).await.unwrap();
    assert_eq!(engine.cache().folders(), BTreeSet::from_iter(["INBOX"]));
    assert_eq!(server.count(Op::FetchHeader), 1);

    engine.update(Some(&[])).await.unwrap();
    assert_eq!(
        engine.cache().folders(),
        BTreeSet::from_iter(["INBOX", "[Gmail]/Spam", "[Gmail]/Trash"])
    );

    // excluded folders are left untouched, even if they vanish
    server.delete_folder("[Gmail]/Spam");
    engine.update(Some(&["[Gmail]/Spam".to_owned()])).await.unwrap();
    assert!(engine.cache().folders().contains("[Gmail]/Spam"));
}

#[test_log::test(tokio::test)]
async fn test_update_saves_checkpoints() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");

    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.append("Sent", raw_message("b@localhost", &["a@localhost"], "B"));

    let config = Arc::new(CacheConfig::new("test").with_snapshot_path(&path));
    let mut engine = SyncEngine::new(config.clone(), server.boxed_session());
    engine.update(None).await.unwrap();

    assert_eq!(&CacheStore::try_load(&path).unwrap(), engine.cache());

    // a restarted engine does not fetch anything again
    server.reset_counts();
    let mut engine = SyncEngine::load(config, server.boxed_session());
    let report = engine.update(None).await.unwrap();

    assert_eq!(engine.cache().len(), 2);
    assert_eq!(report.added(), 0);
    assert_eq!(server.count(Op::FetchHeader), 0);
}

#[test_log::test(tokio::test)]
async fn test_update_saves_checkpoint_on_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");

    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.append("INBOX", raw_message("b@localhost", &[], "B"));
    server.append("INBOX", raw_message("c@localhost", &[], "C"));
    server.fail_on(Op::FetchHeader, 3, 1);

    let config = CacheConfig {
        checkpoint_batch_size: Some(1),
        max_attempts: Some(0),
        ..CacheConfig::new("test").with_snapshot_path(&path)
    };
    let mut engine = SyncEngine::new(Arc::new(config), server.boxed_session());

    let err = engine.update(None).await.unwrap_err();
    assert!(matches!(err, sync::Error::FetchHeaderError(_, _)));

    let cache = CacheStore::try_load(&path).unwrap();
    assert!(cache.contains_slot(&FolderSlot::new("INBOX", 1)));
    assert!(cache.contains_slot(&FolderSlot::new("INBOX", 2)));
    assert!(!cache.contains_slot(&FolderSlot::new("INBOX", 3)));
}

#[test_log::test(tokio::test)]
async fn test_update_builds_threads_across_folders() {
    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("c@localhost", &["b@localhost"], "C"));
    server.append("INBOX", raw_message("a@localhost", &[], "A"));
    server.append("Sent", raw_message("b@localhost", &["a@localhost"], "B"));
    server.append("INBOX", raw_message("z@localhost", &[], "Z"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());
    engine.update(None).await.unwrap();

    let cache = engine.cache();
    let expected = ids(&["a@localhost", "b@localhost", "c@localhost"]);

    for slot in [
        FolderSlot::new("INBOX", 1),
        FolderSlot::new("INBOX", 2),
        FolderSlot::new("Sent", 1),
    ] {
        assert_eq!(cache.record_of(&slot).unwrap().thread, expected, "{slot}");
    }

    assert_eq!(
        cache.thread_slots(&FolderSlot::new("INBOX", 2), None),
        vec![FolderSlot::new("INBOX", 1), FolderSlot::new("INBOX", 2)]
    );
    assert_eq!(
        cache.record_of(&FolderSlot::new("INBOX", 3)).unwrap().thread,
        ids(&["z@localhost"])
    );
}

#[test_log::test(tokio::test)]
async fn test_clear_then_update_rebuilds_cache() {
    let server = MemoryServer::new("imap.localhost");
    server.append("INBOX", raw_message("a@localhost", &[], "A"));

    let config = Arc::new(CacheConfig::new("test"));
    let mut engine = SyncEngine::new(config, server.boxed_session());
    engine.update(None).await.unwrap();

    engine.clear();
    assert!(engine.cache().is_empty());

    let report = engine.update(None).await.unwrap();
    assert_eq!(report.added(), 1);
}
