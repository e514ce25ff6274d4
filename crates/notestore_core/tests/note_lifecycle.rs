use notestore_core::{
    Actor, InMemoryNoteRepository, Note, NoteManager, NoteManagerError, NoteRepository,
    NoteStoreConfig, RepoError,
};

fn setup() -> NoteManager<InMemoryNoteRepository> {
    NoteManager::new(InMemoryNoteRepository::new(), NoteStoreConfig::default()).unwrap()
}

#[test]
fn note_operations_scenario() {
    let manager = setup();
    let actor = Actor::anonymous();
    assert_eq!(manager.get_notes_info().len(), 0);

    let note1 = Note::new("/prod/my_note1", "test");
    let note2 = Note::new("/dev/project_2/my_note2", "test");
    let note3 = Note::new("/dev/project_3/my_note3", "test");
    manager.save_note(note1.clone(), &actor).unwrap();
    manager.save_note(note2.clone(), &actor).unwrap();
    manager.save_note(note3.clone(), &actor).unwrap();

    assert_eq!(manager.get_notes_info().len(), 3);
    for note in [&note1, &note2, &note3] {
        let loaded = manager.process_note(note.id, |n| n.clone()).unwrap();
        assert_eq!(loaded.id, note.id);
        assert_eq!(loaded.path, note.path);
        assert_eq!(loaded.content, note.content);
    }

    manager
        .move_note(note1.id, "/dev/project_1/my_note1", &actor)
        .unwrap();
    assert_eq!(manager.get_notes_info().len(), 3);
    assert_eq!(
        manager.process_note(note1.id, |n| n.path.clone()).unwrap(),
        "/dev/project_1/my_note1"
    );

    manager.move_folder("/dev", "/staging", &actor).unwrap();
    let info = manager.get_notes_info();
    assert_eq!(info.len(), 3);
    assert_eq!(info[&note1.id], "/staging/project_1/my_note1");
    assert_eq!(info[&note2.id], "/staging/project_2/my_note2");
    assert_eq!(info[&note3.id], "/staging/project_3/my_note3");

    manager.remove_note(note1.id, &actor).unwrap();
    assert_eq!(manager.get_notes_info().len(), 2);

    manager.remove_folder("/staging", &actor).unwrap();
    assert!(manager.get_notes_info().is_empty());
    assert!(manager.repository().is_empty());
}

#[test]
fn add_note_rejects_duplicate_path() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note1 = Note::new("/prod/note", "test");
    let note2 = Note::new("/prod/note", "test");

    manager.add_note(note1.clone(), &actor).unwrap();
    let err = manager.add_note(note2.clone(), &actor).unwrap_err();

    assert!(matches!(&err, NoteManagerError::PathAlreadyExists(path) if path == "/prod/note"));
    assert!(err.to_string().contains("'/prod/note'"));
    assert_eq!(manager.get_notes_info().len(), 1);
    assert!(manager.repository().stored(note2.id).is_none());
    assert_eq!(manager.get_cache_size(), 1);
}

#[test]
fn move_note_rejects_duplicate_path() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note1 = Note::new("/prod/note-1", "test");
    let note2 = Note::new("/prod/note-2", "test");
    manager.add_note(note1.clone(), &actor).unwrap();
    manager.add_note(note2.clone(), &actor).unwrap();

    let err = manager
        .move_note(note2.id, "/prod/note-1", &actor)
        .unwrap_err();

    assert!(matches!(&err, NoteManagerError::PathAlreadyExists(path) if path == "/prod/note-1"));
    assert_eq!(manager.note_path(note2.id).as_deref(), Some("/prod/note-2"));
    assert_eq!(
        manager.repository().stored(note2.id).unwrap().path,
        "/prod/note-2"
    );
}

#[test]
fn move_note_to_current_path_is_noop() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note = Note::new("/prod/note", "test");
    manager.add_note(note.clone(), &actor).unwrap();
    manager.repository().set_fail_all_writes(true);

    // No repository call happens, so the injected failure is never hit.
    manager.move_note(note.id, "/prod/note/", &actor).unwrap();
    assert_eq!(manager.note_path(note.id).as_deref(), Some("/prod/note"));
}

#[test]
fn move_note_failure_in_repository_changes_nothing() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note = Note::new("/prod/note", "test");
    manager.add_note(note.clone(), &actor).unwrap();
    manager.repository().fail_writes_for(note.id);

    let err = manager.move_note(note.id, "/dev/note", &actor).unwrap_err();
    assert!(matches!(err, NoteManagerError::Io(RepoError::Backend(_))));
    assert!(manager.contains_note("/prod/note"));
    assert!(!manager.contains_note("/dev/note"));
    assert_eq!(
        manager.process_note(note.id, |n| n.path.clone()).unwrap(),
        "/prod/note"
    );
}

#[test]
fn unknown_ids_are_not_found() {
    let manager = setup();
    let actor = Actor::anonymous();
    let ghost = Note::new("/ghost", "");

    assert!(matches!(
        manager.process_note(ghost.id, |_| ()),
        Err(NoteManagerError::NotFound(id)) if id == ghost.id
    ));
    assert!(matches!(
        manager.move_note(ghost.id, "/elsewhere", &actor),
        Err(NoteManagerError::NotFound(_))
    ));
    assert!(matches!(
        manager.remove_note(ghost.id, &actor),
        Err(NoteManagerError::NotFound(_))
    ));
}

#[test]
fn save_note_updates_known_note_and_moves_it_when_path_changes() {
    let manager = setup();
    let actor = Actor::user("alice");
    let mut note = Note::new("/prod/note", "v1");
    manager.save_note(note.clone(), &actor).unwrap();

    note.content = "v2".to_string();
    manager.save_note(note.clone(), &actor).unwrap();
    assert_eq!(manager.repository().stored(note.id).unwrap().content, "v2");
    assert_eq!(manager.get_notes_info().len(), 1);

    note.path = "/dev/note".to_string();
    manager.save_note(note.clone(), &actor).unwrap();
    assert!(!manager.contains_note("/prod/note"));
    assert_eq!(manager.note_path(note.id).as_deref(), Some("/dev/note"));
    assert_eq!(manager.repository().stored(note.id).unwrap().path, "/dev/note");
}

#[test]
fn save_note_to_occupied_path_is_rejected() {
    let manager = setup();
    let actor = Actor::anonymous();
    let first = Note::new("/prod/a", "");
    let mut second = Note::new("/prod/b", "");
    manager.save_note(first.clone(), &actor).unwrap();
    manager.save_note(second.clone(), &actor).unwrap();

    second.path = "/prod/a".to_string();
    let err = manager.save_note(second.clone(), &actor).unwrap_err();
    assert!(matches!(err, NoteManagerError::PathAlreadyExists(_)));
    assert_eq!(manager.note_path(second.id).as_deref(), Some("/prod/b"));
}

#[test]
fn process_note_mutations_are_visible_to_later_reads() {
    let manager = setup();
    let note = Note::new("/prod/note", "draft");
    manager.add_note(note.clone(), &Actor::anonymous()).unwrap();

    manager
        .process_note(note.id, |n| n.content.push_str(" + edit"))
        .unwrap();
    let content = manager.read_note(note.id, |n| n.content.clone()).unwrap();
    assert_eq!(content, "draft + edit");
}

#[test]
fn process_note_loads_from_repository_on_miss() {
    let note = Note::new("/prod/cold", "from disk");
    let repo = InMemoryNoteRepository::with_notes([note.clone()]);
    let manager = NoteManager::new(repo, NoteStoreConfig::default()).unwrap();

    assert_eq!(manager.get_notes_info().len(), 1);
    assert_eq!(manager.get_cache_size(), 0);
    let content = manager.read_note(note.id, |n| n.content.clone()).unwrap();
    assert_eq!(content, "from disk");
    assert_eq!(manager.get_cache_size(), 1);
}

#[test]
fn new_rejects_repository_listing_duplicate_paths() {
    let repo = InMemoryNoteRepository::with_notes([Note::new("/a", ""), Note::new("/a", "")]);
    let err = NoteManager::new(repo, NoteStoreConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, NoteManagerError::PathAlreadyExists(path) if path == "/a"));
}

#[test]
fn reload_picks_up_out_of_band_repository_changes() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note = Note::new("/prod/a", "");
    manager.add_note(note.clone(), &actor).unwrap();

    let external = Note::new("/prod/external", "");
    manager.repository().save(&external, &actor).unwrap();
    assert!(!manager.contains_note("/prod/external"));

    manager.reload().unwrap();
    assert!(manager.contains_note("/prod/external"));
    assert_eq!(manager.get_notes_info().len(), 2);
    assert_eq!(manager.get_cache_size(), 0);
}

#[test]
fn remove_note_repairs_index_when_repository_lost_the_note() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note = Note::new("/prod/a", "");
    manager.add_note(note.clone(), &actor).unwrap();
    manager.repository().delete(note.id, &actor).unwrap();

    manager.remove_note(note.id, &actor).unwrap();
    assert!(!manager.contains_note("/prod/a"));
}

#[test]
fn remove_note_failure_keeps_note_registered() {
    let manager = setup();
    let actor = Actor::anonymous();
    let note = Note::new("/prod/a", "");
    manager.add_note(note.clone(), &actor).unwrap();
    manager.repository().set_fail_all_writes(true);

    assert!(matches!(
        manager.remove_note(note.id, &actor),
        Err(NoteManagerError::Io(_))
    ));
    assert!(manager.contains_note("/prod/a"));
    assert_eq!(manager.get_cache_size(), 1);
}

#[test]
fn actor_is_passed_through_to_repository() {
    let manager = setup();
    let note = Note::new("/prod/a", "");
    manager
        .add_note(note.clone(), &Actor::user("alice").with_roles(["admin"]))
        .unwrap();
    assert_eq!(manager.repository().last_actor(note.id).unwrap().user, "alice");

    manager
        .move_note(note.id, "/prod/b", &Actor::user("bob"))
        .unwrap();
    assert_eq!(manager.repository().last_actor(note.id).unwrap().user, "bob");
}

#[test]
fn contains_folder_tracks_membership() {
    let manager = setup();
    let actor = Actor::anonymous();
    manager
        .add_note(Note::new("/dev/project/a", ""), &actor)
        .unwrap();

    assert!(manager.contains_folder("/dev"));
    assert!(manager.contains_folder("/dev/project/"));
    assert!(!manager.contains_folder("/de"));
    assert!(!manager.contains_folder("/prod"));
    assert!(!manager.contains_note("/dev"));
}
