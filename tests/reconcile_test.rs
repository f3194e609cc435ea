mod helpers;

use helpers::{bump_mtime, id_at, notes_dir, record_count, test_store, write_note};
use notewatch::error::SyncError;
use notewatch::note;
use notewatch::store::RecordStore;
use notewatch::sync::{Dispatcher, EligibilityFilter, FsEvent, Reconciler};

fn reconciler(root: &std::path::Path) -> Reconciler {
    Reconciler::new(root, EligibilityFilter::default())
}

#[test]
fn first_sync_indexes_every_note() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "a.md", "# A\nalpha");
    write_note(&root, "nested/deeper/b.md", "beta");
    let mut store = test_store();

    let report = reconciler(&root).sync(&mut store).unwrap();

    assert_eq!(report.disk_files, 2);
    assert_eq!(report.indexed_files, 0);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(record_count(&store), 2);
    assert!(store.find_by_path(&root.join("nested/deeper/b.md")).unwrap().is_some());
}

#[test]
fn second_sync_without_changes_is_a_noop() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "a.md", "alpha");
    write_note(&root, "b.md", "beta");
    let mut store = test_store();
    let r = reconciler(&root);

    r.sync(&mut store).unwrap();
    let second = r.sync(&mut store).unwrap();

    assert!(second.is_noop(), "second pass wrote: {second}");
    assert_eq!(second.skipped, 2);
    assert_eq!(record_count(&store), 2);
}

#[test]
fn note_created_while_stopped_is_inserted_once() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "a.md", "alpha");
    let mut store = test_store();
    let r = reconciler(&root);
    r.sync(&mut store).unwrap();

    let f = write_note(&root, "f.md", "written while nobody watched");
    let report = r.sync(&mut store).unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(record_count(&store), 2);
    assert!(store.find_by_path(&f).unwrap().is_some());
}

#[test]
fn note_removed_while_stopped_is_deleted() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "a.md", "alpha");
    let g = write_note(&root, "g.md", "gamma");
    let mut store = test_store();
    let r = reconciler(&root);
    r.sync(&mut store).unwrap();
    let a_id = id_at(&store, &root.join("a.md"));

    std::fs::remove_file(&g).unwrap();
    let report = r.sync(&mut store).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(store.find_by_path(&g).unwrap().is_none());
    assert_eq!(id_at(&store, &root.join("a.md")), a_id);
}

#[test]
fn edited_note_keeps_its_id() {
    let (_tmp, root) = notes_dir();
    let a = write_note(&root, "a.md", "first draft");
    let mut store = test_store();
    let r = reconciler(&root);
    r.sync(&mut store).unwrap();
    let id = id_at(&store, &a);

    std::fs::write(&a, "second draft, much better").unwrap();
    bump_mtime(&a);
    let report = r.sync(&mut store).unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 0);
    let record = store.find_by_path(&a).unwrap().unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.content, "second draft, much better");
}

#[test]
fn touched_but_unchanged_note_is_skipped() {
    let (_tmp, root) = notes_dir();
    let a = write_note(&root, "a.md", "same text");
    let mut store = test_store();
    let r = reconciler(&root);
    r.sync(&mut store).unwrap();
    let before = store.find_by_path(&a).unwrap().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    std::fs::File::options()
        .write(true)
        .open(&a)
        .unwrap()
        .set_modified(std::time::SystemTime::now())
        .unwrap();
    let report = r.sync(&mut store).unwrap();

    assert!(report.is_noop());
    assert_eq!(report.skipped, 1);
    let after = store.find_by_path(&a).unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert!(after.updated_at > before.updated_at, "touch recorded");

    // No longer newer than the record, so the next pass does not reload it.
    assert!(r.sync(&mut store).unwrap().is_noop());
    assert_eq!(store.find_by_path(&a).unwrap().unwrap().updated_at, after.updated_at);
}

#[cfg(unix)]
#[test]
fn symlinked_note_is_kept_across_syncs() {
    let (_tmp, root) = notes_dir();
    let (_outside_tmp, outside) = notes_dir();
    let target = write_note(&outside, "real.md", "lives elsewhere");
    let link = root.join("linked.md");
    std::os::unix::fs::symlink(&target, &link).unwrap();
    let mut store = test_store();
    Dispatcher::default().dispatch(&mut store, &FsEvent::created(&link));
    let id = id_at(&store, &link);
    let r = reconciler(&root);

    assert!(r.sync(&mut store).unwrap().is_noop());
    assert!(r.sync(&mut store).unwrap().is_noop());
    assert_eq!(id_at(&store, &link), id);
    assert_eq!(record_count(&store), 1);
}

#[test]
fn noise_files_are_never_indexed() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "real.md", "keep me");
    write_note(&root, ".hidden.md", "dotfile");
    write_note(&root, "real.md.swp", "swap");
    write_note(&root, "real.md~", "backup");
    write_note(&root, "notes.txt", "plain text");
    let mut store = test_store();

    let report = reconciler(&root).sync(&mut store).unwrap();

    assert_eq!(report.disk_files, 1);
    assert_eq!(report.inserted, 1);
    let paths: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.file_path).collect();
    assert_eq!(paths, vec![root.join("real.md").to_string_lossy().into_owned()]);
}

#[test]
fn duplicate_records_are_reported_not_resolved() {
    let (_tmp, root) = notes_dir();
    let a = write_note(&root, "a.md", "alpha");
    let mut store = test_store();
    let doc = note::load(&a).unwrap();
    store.insert(&doc).unwrap();
    store.insert(&doc).unwrap();

    std::fs::write(&a, "alpha, edited").unwrap();
    bump_mtime(&a);
    let report = reconciler(&root).sync(&mut store).unwrap();

    assert_eq!(report.conflicts, 1);
    assert!(report.is_noop());
    assert_eq!(record_count(&store), 2, "both conflicting records are left in place");
}

#[test]
fn unreadable_note_is_counted_and_the_pass_continues() {
    let (_tmp, root) = notes_dir();
    std::fs::write(root.join("broken.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    write_note(&root, "fine.md", "fine");
    let mut store = test_store();

    let report = reconciler(&root).sync(&mut store).unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 1);
    assert!(store.find_by_path(&root.join("broken.md")).unwrap().is_none());
}

#[test]
fn missing_root_refuses_to_run() {
    let (_tmp, root) = notes_dir();
    write_note(&root, "a.md", "alpha");
    let mut store = test_store();
    reconciler(&root).sync(&mut store).unwrap();

    let gone = root.join("not-there");
    let err = reconciler(&gone).sync(&mut store).unwrap_err();

    assert!(matches!(err, SyncError::RootUnavailable(_)));
    assert_eq!(record_count(&store), 1, "no records deleted");
}
