use mailcache::{
    slot::FolderSlot,
    thread::{self, find_thread},
};
use mailcache_testing::{raw_message, MemoryServer, Op};

const ALL_MAIL: &str = "[Gmail]/All Mail";

fn setup() -> MemoryServer {
    let server = MemoryServer::new("imap.localhost");

    // X refers to Y, Z refers to X, W is unrelated
    let x = raw_message("x@localhost", &["y@localhost"], "X");
    server.append(ALL_MAIL, &x);
    server.append(ALL_MAIL, raw_message("y@localhost", &[], "Y"));
    server.append(ALL_MAIL, raw_message("z@localhost", &["x@localhost"], "Z"));
    server.append(ALL_MAIL, raw_message("w@localhost", &[], "W"));

    // copies living in other folders are not part of the result
    server.append("INBOX", raw_message("w@localhost", &[], "W"));
    server.append("INBOX", &x);

    server
}

fn slots(ids: &[u32]) -> Vec<FolderSlot> {
    ids.iter().map(|id| FolderSlot::new(ALL_MAIL, *id)).collect()
}

#[test_log::test(tokio::test)]
async fn test_find_thread_from_any_member() {
    let server = setup();
    let mut session = server.session();

    for id in [1, 2, 3] {
        let thread = find_thread(&mut session, ALL_MAIL, id).await.unwrap();
        assert_eq!(thread, slots(&[1, 2, 3]), "from message {id}");
    }

    let thread = find_thread(&mut session, ALL_MAIL, 4).await.unwrap();
    assert_eq!(thread, slots(&[4]));
}

#[test_log::test(tokio::test)]
async fn test_find_thread_is_restricted_to_one_folder() {
    let server = setup();
    let mut session = server.session();

    let thread = find_thread(&mut session, "INBOX", 2).await.unwrap();

    assert_eq!(thread, vec![FolderSlot::new("INBOX", 2)]);
}

#[test_log::test(tokio::test)]
async fn test_find_thread_expands_every_id_once() {
    let server = setup();
    let mut session = server.session();

    find_thread(&mut session, ALL_MAIL, 1).await.unwrap();

    // x, y and z are each searched by message id (except the target)
    // and by reference
    assert_eq!(server.count(Op::Search), 5);
}

#[test_log::test(tokio::test)]
async fn test_find_thread_fails_on_search_error() {
    let server = setup();
    let mut session = server.session();
    server.fail(Op::Search, 1);

    let err = find_thread(&mut session, ALL_MAIL, 1).await.unwrap_err();
    assert!(matches!(err, thread::Error::SearchError(..)));

    let err = find_thread(&mut session, "Unknown", 1).await.unwrap_err();
    assert!(matches!(err, thread::Error::SelectFolderError(..)));
}
