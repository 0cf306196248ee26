//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `peirce_core` linkage.
//! - Walk one short proof end to end with deterministic output.
//!
//! Set `PEIRCE_LOG_DIR` to an absolute path to capture core log events.

use log::info;
use peirce_core::db::open_db_in_memory;
use peirce_core::{
    Container, EditorService, GraphRepository, ModeController, Pattern, PatternNode, Point,
    RuleRequest, ShapeTable, SqliteGraphRepository, SqliteSettingsRepository,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("peirce_core ping={}", peirce_core::ping());
    println!("peirce_core version={}", peirce_core::core_version());

    if let Ok(log_dir) = std::env::var("PEIRCE_LOG_DIR") {
        peirce_core::init_logging(peirce_core::default_log_level(), &log_dir)?;
    }

    let conn = open_db_in_memory()?;
    let modes = ModeController::initialize(SqliteSettingsRepository::try_new(&conn)?)?;
    let mut editor = EditorService::new(ShapeTable::new(), modes);

    let at = editor.edit_geometry(|table| table.insert_point(Point::new(0.0, 0.0)))?;
    let a = editor.add_symbol("A", at)?;
    let ring = editor.edit_geometry(|table| table.insert_circle(Point::new(30.0, 0.0), 8.0))?;
    let c1 = editor.add_cut(ring)?;
    info!("event=cli_demo module=cli status=start objects={}", editor.store().len());

    editor.toggle_mode()?;
    let source = editor.capture(&[a])?;
    let copy = editor.apply(&RuleRequest::Iteration {
        source: source.clone(),
        target: Container::Cut(c1),
    })?;
    println!("iteration: created={}", copy.created.len());

    let wrapped = editor.apply(&RuleRequest::DoubleCutInsertion(source))?;
    println!(
        "double cut insertion: A now on area level {}",
        editor.store().area_level(a)?
    );

    let pair = editor.capture_pair(wrapped.created[0], wrapped.created[1])?;
    editor.apply(&RuleRequest::DoubleCutRemoval(pair))?;
    println!(
        "double cut removal: A back on area level {}",
        editor.store().area_level(a)?
    );

    let pattern = Pattern::new(vec![PatternNode::symbol("B")?]);
    match editor.check(&RuleRequest::Insertion {
        pattern,
        target: Container::Sheet,
    }) {
        Ok(()) => println!("insertion on sheet: allowed"),
        Err(err) => println!("insertion on sheet: {err}"),
    }

    let duplicate = editor.capture(&copy.created)?;
    editor.apply(&RuleRequest::Deiteration(duplicate))?;
    println!("deiteration: objects={}", editor.store().len());

    let repo = SqliteGraphRepository::try_new(&conn)?;
    editor.save_to(&repo)?;
    println!("saved objects={}", repo.load()?.objects.len());
    Ok(())
}
