use std::{fs, path::Path, sync::Arc};

use mail_builder::MessageBuilder;
use mailstore::{
    mh::config::MhConfig, ErrorKind, Flag, Flags, Message, OpenMode, Store, StoreConfig, Uid,
};
use tempfile::tempdir;

fn email(subject: &str) -> Vec<u8> {
    MessageBuilder::new()
        .from("alice@localhost")
        .to("bob@localhost")
        .subject(subject)
        .text_body(subject)
        .write_to_vec()
        .unwrap()
}

fn mh_store(root_dir: &Path) -> Arc<Store> {
    Store::new(StoreConfig::new(MhConfig::new(root_dir))).unwrap()
}

#[test_log::test(tokio::test)]
async fn create_and_delete_empty_folder() {
    let tmp = tempdir().unwrap();
    let root_dir = tmp.path().join("store");
    let store = mh_store(&root_dir);

    assert_eq!(store.get_separator(), '/');
    assert_eq!(store.root_dir(), Some(root_dir.as_path()));

    let inbox = store.get_folder("inbox").await.unwrap();
    assert_eq!(inbox.name(), "inbox");
    assert_eq!(inbox.full_name(), "inbox");
    assert_eq!(inbox.location(), Some(root_dir.join("inbox")));
    assert!(!inbox.exists().await.unwrap());

    // the store root is created along with its first folder
    inbox.create().await.unwrap();
    assert!(root_dir.join("inbox").is_dir());
    assert!(inbox.exists().await.unwrap());

    inbox.delete(false).await.unwrap();
    assert!(!root_dir.join("inbox").exists());
    assert!(!inbox.exists().await.unwrap());
}

#[test_log::test(tokio::test)]
async fn create_is_idempotent_and_recursive() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let c = store.get_folder("a/b/c").await.unwrap();
    assert_eq!(c.name(), "a/b/c");
    assert!(c.get_parent_folder().is_none());

    c.create().await.unwrap();
    c.create().await.unwrap();

    assert!(tmp.path().join("a").is_dir());
    assert!(tmp.path().join("a/b").is_dir());
    assert!(tmp.path().join("a/b/c").is_dir());

    let entries = fs::read_dir(tmp.path().join("a/b")).unwrap().count();
    assert_eq!(entries, 1);
}

#[test_log::test(tokio::test)]
async fn resolve_children() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let a = store.get_folder("a").await.unwrap();
    let b = a.get_folder("b").await.unwrap();
    assert_eq!(b.name(), "b");
    assert_eq!(b.full_name(), "a/b");
    assert!(Arc::ptr_eq(&b.get_parent_folder().unwrap(), &a));
    assert!(Arc::ptr_eq(b.get_parent_store(), &store));

    // the same child resolves to the same folder while it is alive
    let b2 = a.get_folder("b").await.unwrap();
    assert!(Arc::ptr_eq(&b, &b2));

    // creating the child creates its parent first
    b.create().await.unwrap();
    assert!(a.exists().await.unwrap());

    let subfolders = a.list_subfolders().await.unwrap();
    assert_eq!(subfolders.len(), 1);
    assert!(Arc::ptr_eq(&subfolders[0], &b));

    let roots = store.list_root_folders().await.unwrap();
    let names: Vec<_> = roots.iter().map(|folder| folder.full_name()).collect();
    assert_eq!(names, vec!["a"]);

    let err = a.get_folder("x/y").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = store.get_folder("a//b").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test_log::test(tokio::test)]
async fn custom_separator() {
    let tmp = tempdir().unwrap();
    let config = StoreConfig::new(MhConfig::new(tmp.path())).with_separator('.');
    let store = Store::new(config).unwrap();

    let a = store.get_folder("a").await.unwrap();
    let b = a.get_folder("b").await.unwrap();
    assert_eq!(b.full_name(), "a.b");

    b.create().await.unwrap();
    assert!(tmp.path().join("a").join("b").is_dir());

    let root_dir = tmp.path().canonicalize().unwrap();
    assert_eq!(b.location(), Some(root_dir.join("a").join("b")));
}

#[test_log::test(tokio::test)]
async fn non_directory_cannot_host_folder() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("file"), "not a folder").unwrap();
    let store = mh_store(tmp.path());

    let err = store.get_folder("file").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store.get_folder("file/sub").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test_log::test(tokio::test)]
async fn open_missing_folder() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let folder = store.get_folder("missing").await.unwrap();
    let err = folder.open(OpenMode::Read).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!folder.is_open());
}

#[test_log::test(tokio::test)]
async fn open_close_state_machine() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let folder = store.get_folder("inbox").await.unwrap();
    folder.create().await.unwrap();

    let err = folder.get_message(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);
    let err = folder.close(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);
    let err = folder.open(OpenMode::Unknown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    folder.open(OpenMode::Read).await.unwrap();
    assert!(folder.is_open());
    assert_eq!(folder.get_mode(), OpenMode::Read);

    let err = folder.open(OpenMode::Read).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);

    let msg = Message::from_content(email("Read only"));
    let err = folder.append_message(&msg).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);

    let err = folder.get_message(0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = folder.get_message(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    folder.close(false).await.unwrap();
    assert!(!folder.is_open());
    assert_eq!(folder.get_mode(), OpenMode::Unknown);
}

#[test_log::test(tokio::test)]
async fn delete_open_folder() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let folder = store.get_folder("inbox").await.unwrap();
    folder.create().await.unwrap();
    folder.open(OpenMode::ReadWrite).await.unwrap();

    let err = folder.delete(true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);
    assert!(tmp.path().join("inbox").is_dir());

    folder.close(false).await.unwrap();
    folder.delete(true).await.unwrap();
    assert!(!tmp.path().join("inbox").exists());
}

#[test_log::test(tokio::test)]
async fn delete_folder_with_subfolders() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let a = store.get_folder("a").await.unwrap();
    let b = a.get_folder("b").await.unwrap();
    b.create().await.unwrap();

    a.open(OpenMode::ReadWrite).await.unwrap();
    a.append_message(&Message::from_content(email("First")))
        .await
        .unwrap();
    a.append_message(&Message::from_content(email("Second")))
        .await
        .unwrap();
    a.close(false).await.unwrap();

    // messages are deleted before the subfolders check fails
    let err = a.delete(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolated);
    assert!(!tmp.path().join("a/1").exists());
    assert!(!tmp.path().join("a/2").exists());
    assert!(tmp.path().join("a/b").is_dir());

    a.delete(true).await.unwrap();
    assert!(!tmp.path().join("a").exists());
}

#[cfg(unix)]
#[test_log::test(tokio::test)]
async fn delete_reports_removal_failure() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let folder = store.get_folder("inbox").await.unwrap();
    folder.create().await.unwrap();

    // neither a message nor a subfolder, so it survives the message
    // deletion and prevents the directory removal
    std::os::unix::fs::symlink("nowhere", tmp.path().join("inbox/link")).unwrap();

    let err = folder.delete(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendIo);
    assert!(folder.exists().await.unwrap());
}

#[test_log::test(tokio::test)]
async fn expunge_renumbers_cached_messages() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    inbox.create().await.unwrap();
    inbox.open(OpenMode::ReadWrite).await.unwrap();

    for n in 1..=5 {
        let msg = Message::from_content(email(&format!("Message {n}")));
        assert_eq!(inbox.append_message(&msg).await.unwrap(), n);
    }
    assert_eq!(inbox.get_message_count().await.unwrap(), Some(5));

    let mut msgs = Vec::new();
    for n in 1..=5 {
        msgs.push(inbox.get_message(n).await.unwrap());
    }
    assert_eq!(inbox.cached_message_count().await, 5);

    let deleted = Flags::from(Flag::Deleted);
    inbox.add_message_flags(&msgs[1], &deleted).await.unwrap();
    inbox.add_message_flags(&msgs[3], &deleted).await.unwrap();

    let expunged = inbox.expunge(true).await.unwrap();
    assert_eq!(expunged.len(), 2);
    assert!(Arc::ptr_eq(&expunged[0], &msgs[1]));
    assert!(Arc::ptr_eq(&expunged[1], &msgs[3]));
    assert!(expunged.iter().all(|msg| msg.is_expunged()));

    assert_eq!(msgs[0].number(), 1);
    assert_eq!(msgs[2].number(), 2);
    assert_eq!(msgs[4].number(), 3);
    assert_eq!(inbox.cached_message_count().await, 3);
    assert_eq!(inbox.get_message_count().await.unwrap(), Some(3));

    let msg = inbox.get_message(2).await.unwrap();
    assert!(Arc::ptr_eq(&msg, &msgs[2]));
    assert!(String::from_utf8_lossy(msg.content()).contains("Message 3"));

    // uids are stable across the expunge
    let uids = inbox.get_uid_list().await.unwrap();
    assert_eq!(uids, vec![Uid::from(1u32), Uid::from(3u32), Uid::from(5u32)]);
    let msg = inbox.get_message_by_uid(&Uid::from(5u32)).await.unwrap();
    assert!(Arc::ptr_eq(&msg, &msgs[4]));
    assert_eq!(
        inbox.get_message_uid(&msgs[4]).await.unwrap(),
        Some(Uid::from(5u32))
    );
    let uid = inbox.get_message_uid_by_number(2).await.unwrap();
    assert_eq!(uid, Uid::from(3u32));
    let err = inbox.get_message_uid_by_number(4).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // a second expunge has nothing to remove
    let expunged = inbox.expunge(true).await.unwrap();
    assert!(expunged.is_empty());
    let numbers: Vec<_> = [&msgs[0], &msgs[2], &msgs[4]]
        .iter()
        .map(|msg| msg.number())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test_log::test(tokio::test)]
async fn expunge_uncached_messages() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    inbox.create().await.unwrap();
    inbox.open(OpenMode::ReadWrite).await.unwrap();

    let msg = Message::from_content(email("Trash me")).with_flags(Flag::Deleted);
    inbox.append_message(&msg).await.unwrap();
    inbox
        .append_message(&Message::from_content(email("Keep me")))
        .await
        .unwrap();

    // the uid of a message is its mh file number
    let uid = inbox.get_message_uid_by_number(2).await.unwrap();
    assert_eq!(uid, Uid::from(2u32));
    assert_eq!(inbox.cached_message_count().await, 0);

    let kept = inbox.get_message(2).await.unwrap();
    assert!(inbox.expunge(false).await.unwrap().is_empty());

    assert_eq!(kept.number(), 1);
    assert!(!tmp.path().join("inbox/1").exists());
    assert!(tmp.path().join("inbox/2").exists());

    inbox.close(false).await.unwrap();
}

#[test_log::test(tokio::test)]
async fn interrupted_expunge_renumbers_cached_messages() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    inbox.create().await.unwrap();
    inbox.open(OpenMode::ReadWrite).await.unwrap();

    let msg = Message::from_content(email("Trash me")).with_flags(Flag::Deleted);
    inbox.append_message(&msg).await.unwrap();
    let msg = Message::from_content(email("Keep me")).with_flags(Flag::Seen);
    inbox.append_message(&msg).await.unwrap();

    let kept = inbox.get_message(2).await.unwrap();

    // sequences cannot be rewritten once the message file is gone
    fs::create_dir(tmp.path().join("inbox/.mh_sequences.tmp")).unwrap();

    let err = inbox.expunge(false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendIo);
    assert!(!tmp.path().join("inbox/1").exists());

    assert_eq!(inbox.get_message_count().await.unwrap(), Some(1));
    assert_eq!(kept.number(), 1);
    assert!(!kept.is_expunged());
    let msg = inbox.get_message(1).await.unwrap();
    assert!(Arc::ptr_eq(&msg, &kept));

    inbox.close(false).await.unwrap();
}

#[test_log::test(tokio::test)]
async fn close_with_expunge() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    inbox.create().await.unwrap();
    inbox.open(OpenMode::ReadWrite).await.unwrap();

    let msg = Message::from_content(email("Trash me")).with_flags(Flag::Deleted);
    inbox.append_message(&msg).await.unwrap();
    inbox.close(true).await.unwrap();

    assert!(!tmp.path().join("inbox/1").exists());
}

#[test_log::test(tokio::test)]
async fn permanent_flags_survive_the_store() {
    let tmp = tempdir().unwrap();

    {
        let store = mh_store(tmp.path());
        let inbox = store.get_folder("inbox").await.unwrap();
        inbox.create().await.unwrap();
        assert_eq!(inbox.list_permanent_flags(), &Flags::standard());

        inbox.open(OpenMode::ReadWrite).await.unwrap();
        let msg = Message::from_content(email("Flagged"))
            .with_flags(Flags::from_iter([Flag::Seen, Flag::custom("work")]));
        inbox.append_message(&msg).await.unwrap();

        let msg = inbox.get_message(1).await.unwrap();
        inbox
            .add_message_flags(&msg, &Flags::from_iter([Flag::Flagged, Flag::custom("todo")]))
            .await
            .unwrap();
        assert!(msg.has_flag(&Flag::custom("todo")));
        inbox.close(false).await.unwrap();
    }

    let seqs = fs::read_to_string(tmp.path().join("inbox/.mh_sequences")).unwrap();
    assert!(seqs.contains("seen: 1"));
    assert!(seqs.contains("flagged: 1"));

    let store = mh_store(tmp.path());
    let inbox = store.get_folder("inbox").await.unwrap();
    inbox.open(OpenMode::ReadWrite).await.unwrap();

    let msg = inbox.get_message(1).await.unwrap();
    assert_eq!(msg.flags(), Flags::from_iter([Flag::Seen, Flag::Flagged]));

    inbox
        .remove_message_flags(&msg, &Flags::from_iter([Flag::Seen, Flag::Flagged]))
        .await
        .unwrap();
    assert!(msg.flags().is_empty());
    assert!(!tmp.path().join("inbox/.mh_sequences").exists());
}

#[test_log::test(tokio::test)]
async fn copy_message_between_folders() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    let archive = store.get_folder("archive").await.unwrap();
    inbox.create().await.unwrap();
    archive.create().await.unwrap();

    inbox.open(OpenMode::ReadWrite).await.unwrap();
    archive.open(OpenMode::ReadWrite).await.unwrap();

    let msg = Message::from_content(email("Copy me")).with_flags(Flag::Seen);
    inbox.append_message(&msg).await.unwrap();
    let msg = inbox.get_message(1).await.unwrap();

    assert_eq!(inbox.copy_message_to(&msg, &archive).await.unwrap(), 1);

    let copy = archive.get_message(1).await.unwrap();
    assert_eq!(copy.content(), msg.content());
    assert!(copy.has_flag(&Flag::Seen));
    assert_eq!(inbox.get_message_count().await.unwrap(), Some(1));
}

#[test_log::test(tokio::test)]
async fn summarize_folder() {
    let tmp = tempdir().unwrap();
    let store = mh_store(tmp.path());

    let inbox = store.get_folder("inbox").await.unwrap();
    assert!(inbox.has_summary_capability());
    assert!(inbox.has_uid_capability());
    assert!(inbox.can_hold_folders());
    assert!(inbox.can_hold_messages());

    inbox.get_folder("sub").await.unwrap().create().await.unwrap();
    inbox.open(OpenMode::Write).await.unwrap();
    inbox
        .append_message(&Message::from_content(email("Hello")))
        .await
        .unwrap();
    inbox.close(false).await.unwrap();

    let summary = inbox.summary().await.unwrap();
    assert_eq!(summary.full_name, "inbox");
    assert_eq!(summary.message_count, Some(1));
    assert_eq!(summary.subfolders, vec!["sub"]);
}
