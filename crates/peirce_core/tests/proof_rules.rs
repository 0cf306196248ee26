use peirce_core::db::open_db_in_memory;
use peirce_core::{
    Container, EditorError, EditorService, Mode, ModeController, ObjectId, Pattern, PatternNode,
    Point, RuleRejection, RuleRequest, ShapeTable, SqliteSettingsRepository,
};

type Editor<'conn> = EditorService<ShapeTable, SqliteSettingsRepository<'conn>>;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn editor(conn: &rusqlite::Connection) -> Editor<'_> {
    let settings = SqliteSettingsRepository::try_new(conn).unwrap();
    EditorService::new(ShapeTable::new(), ModeController::initialize(settings).unwrap())
}

fn symbol(editor: &mut Editor<'_>, label: &str, x: f64, y: f64) -> ObjectId {
    let at = editor
        .edit_geometry(|table| table.insert_point(Point::new(x, y)))
        .unwrap();
    editor.add_symbol(label, at).unwrap()
}

fn cut(editor: &mut Editor<'_>, x: f64, y: f64, radius: f64) -> ObjectId {
    let outline = editor
        .edit_geometry(|table| table.insert_circle(Point::new(x, y), radius))
        .unwrap();
    editor.add_cut(outline).unwrap()
}

fn enter_proof_mode(editor: &mut Editor<'_>) {
    assert_eq!(editor.toggle_mode().unwrap(), Mode::Proof);
}

fn sym(label: &str) -> PatternNode {
    PatternNode::symbol(label).unwrap()
}

#[test]
fn erasure_of_symbol_on_sheet_succeeds() {
    let conn = setup();
    let mut editor = editor(&conn);
    let a = symbol(&mut editor, "A", 0.0, 0.0);
    assert_eq!(editor.store().area_level(a).unwrap(), 0);
    enter_proof_mode(&mut editor);

    let subgraph = editor.capture(&[a]).unwrap();
    let effect = editor.apply(&RuleRequest::Erasure(subgraph)).unwrap();

    assert_eq!(effect.removed, vec![a]);
    assert!(!editor.store().contains(a));
    assert!(editor.geometry().is_empty());
}

#[test]
fn erasure_still_allowed_inside_double_cut() {
    let conn = setup();
    let mut editor = editor(&conn);
    let a = symbol(&mut editor, "A", 0.0, 0.0);
    enter_proof_mode(&mut editor);

    let subgraph = editor.capture(&[a]).unwrap();
    let effect = editor
        .apply(&RuleRequest::DoubleCutInsertion(subgraph))
        .unwrap();
    let (outer, inner) = (effect.created[0], effect.created[1]);
    assert_eq!(editor.store().get(outer).unwrap().level(), 1);
    assert_eq!(editor.store().get(inner).unwrap().level(), 2);
    assert_eq!(editor.store().area_level(a).unwrap(), 2);

    let subgraph = editor.capture(&[a]).unwrap();
    editor.apply(&RuleRequest::Erasure(subgraph)).unwrap();
    assert!(!editor.store().contains(a));
    assert_eq!(
        editor.store().children(Container::Cut(inner)).unwrap(),
        Vec::<ObjectId>::new()
    );
}

#[test]
fn insertion_into_odd_cut_places_content_one_level_deeper() {
    let conn = setup();
    let mut editor = editor(&conn);
    let c1 = cut(&mut editor, 0.0, 0.0, 10.0);
    assert_eq!(editor.store().get(c1).unwrap().level(), 1);
    enter_proof_mode(&mut editor);

    let effect = editor
        .apply(&RuleRequest::Insertion {
            pattern: Pattern::new(vec![sym("B")]),
            target: Container::Cut(c1),
        })
        .unwrap();

    let b = effect.created[0];
    assert_eq!(editor.store().parent_of(b).unwrap(), Container::Cut(c1));
    assert_eq!(editor.store().get(b).unwrap().level(), 2);
    assert_eq!(editor.store().symbol(b).unwrap().label().as_str(), "B");
}

#[test]
fn insertion_onto_sheet_is_rejected_without_change() {
    let conn = setup();
    let mut editor = editor(&conn);
    symbol(&mut editor, "A", 0.0, 0.0);
    enter_proof_mode(&mut editor);
    let before = editor.snapshot();

    let err = editor
        .apply(&RuleRequest::Insertion {
            pattern: Pattern::new(vec![sym("B")]),
            target: Container::Sheet,
        })
        .unwrap_err();

    assert!(matches!(
        err,
        EditorError::Rule(RuleRejection::IllegalInsertion { level: 0, .. })
    ));
    assert_eq!(editor.snapshot(), before);
    assert_eq!(editor.geometry().len(), 1);
}

#[test]
fn iteration_then_deiteration_round_trip() {
    let conn = setup();
    let mut editor = editor(&conn);
    let a = symbol(&mut editor, "A", -20.0, 0.0);
    let c1 = cut(&mut editor, 10.0, 0.0, 8.0);
    enter_proof_mode(&mut editor);

    let source = editor.capture(&[a]).unwrap();
    let copied = editor
        .apply(&RuleRequest::Iteration {
            source,
            target: Container::Cut(c1),
        })
        .unwrap();
    let copy = copied.created[0];
    assert_eq!(editor.store().parent_of(copy).unwrap(), Container::Cut(c1));
    assert_eq!(editor.store().get(copy).unwrap().level(), 2);

    let duplicate = editor.capture(&[copy]).unwrap();
    let effect = editor.apply(&RuleRequest::Deiteration(duplicate)).unwrap();
    assert_eq!(effect.removed, vec![copy]);
    assert!(editor.store().contains(a));
}

#[test]
fn deiteration_of_sole_copy_fails() {
    let conn = setup();
    let mut editor = editor(&conn);
    let a = symbol(&mut editor, "A", 0.0, 0.0);
    let c1 = cut(&mut editor, 20.0, 0.0, 6.0);
    let b = symbol(&mut editor, "B", 20.0, 0.0);
    enter_proof_mode(&mut editor);

    for target in [a, b] {
        let subgraph = editor.capture(&[target]).unwrap();
        let err = editor
            .apply(&RuleRequest::Deiteration(subgraph))
            .unwrap_err();
        assert!(matches!(err, EditorError::Rule(RuleRejection::NoMatchingCopy)));
    }
    assert_eq!(editor.store().children(Container::Cut(c1)).unwrap(), vec![b]);
}

#[test]
fn double_cut_insertion_then_removal_restores_graph() {
    let conn = setup();
    let mut editor = editor(&conn);
    let c1 = cut(&mut editor, 0.0, 0.0, 10.0);
    let p = symbol(&mut editor, "P", 0.0, 0.0);
    let q = symbol(&mut editor, "Q", 40.0, 0.0);
    let before_ids = editor.store().object_ids().to_vec();
    let before_levels: Vec<u32> = editor.store().objects().map(|object| object.level()).collect();
    enter_proof_mode(&mut editor);

    let subgraph = editor.capture(&[c1]).unwrap();
    let effect = editor
        .apply(&RuleRequest::DoubleCutInsertion(subgraph))
        .unwrap();
    assert_eq!(editor.store().get(p).unwrap().level(), before_levels[1] + 2);
    assert_eq!(editor.store().get(q).unwrap().level(), 1);

    let pair = editor
        .capture_pair(effect.created[1], effect.created[0])
        .unwrap();
    editor.apply(&RuleRequest::DoubleCutRemoval(pair)).unwrap();

    assert_eq!(editor.store().object_ids(), before_ids.as_slice());
    let after_levels: Vec<u32> = editor.store().objects().map(|object| object.level()).collect();
    assert_eq!(after_levels, before_levels);
}

#[test]
fn double_cut_removal_needs_two_cuts() {
    let conn = setup();
    let mut editor = editor(&conn);
    let c1 = cut(&mut editor, 0.0, 0.0, 10.0);
    let p = symbol(&mut editor, "P", 0.0, 0.0);
    enter_proof_mode(&mut editor);

    let err = editor.capture_pair(c1, p).unwrap_err();
    assert!(matches!(err, EditorError::Selection(_)));

    let single = editor.capture(&[c1]).unwrap();
    let err = editor
        .apply(&RuleRequest::DoubleCutRemoval(single))
        .unwrap_err();
    assert!(matches!(
        err,
        EditorError::Rule(RuleRejection::InvalidPair { .. })
    ));
}

#[test]
fn selection_with_descendants_captures_outermost_objects() {
    let conn = setup();
    let mut editor = editor(&conn);
    let c1 = cut(&mut editor, 0.0, 0.0, 10.0);
    let p = symbol(&mut editor, "P", 0.0, 0.0);
    let q = symbol(&mut editor, "Q", 40.0, 0.0);
    enter_proof_mode(&mut editor);

    assert!(editor.toggle_selection(c1, true).unwrap());
    assert!(editor.toggle_selection(q, false).unwrap());
    assert!(editor.store().get(p).unwrap().is_proof_selected());

    let subgraph = editor.capture_selection().unwrap();
    assert_eq!(subgraph.members(), &[c1, q]);

    let effect = editor.apply(&RuleRequest::Erasure(subgraph)).unwrap();
    assert_eq!(effect.removed, vec![c1, p, q]);
    assert!(editor.store().proof_selected().is_empty());
}

#[test]
fn rules_are_refused_in_transform_mode() {
    let conn = setup();
    let mut editor = editor(&conn);
    let a = symbol(&mut editor, "A", 0.0, 0.0);
    assert!(matches!(editor.capture(&[a]), Err(EditorError::Mode(_))));

    enter_proof_mode(&mut editor);
    let subgraph = editor.capture(&[a]).unwrap();
    editor.toggle_mode().unwrap();
    assert!(matches!(
        editor.apply(&RuleRequest::Erasure(subgraph)),
        Err(EditorError::Mode(_))
    ));
    assert!(editor.store().contains(a));
}
