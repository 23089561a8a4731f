//! Loading scenario files from disk and running them end to end

use mtg_combat::game::{CombatPhase, ControllerSeats, EventLog};
use mtg_combat::scenario::Scenario;
use mtg_combat::MtgError;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("scenarios")
        .join(name)
}

#[test]
fn test_air_superiority_scenario() {
    let scenario = Scenario::load_from_file(&fixture("air_superiority.json")).unwrap();
    assert_eq!(scenario.permanents.len(), 5);
    let mut loaded = scenario.build().unwrap();

    let angel = loaded.card(1).unwrap();
    let heelcutter = loaded.card(2).unwrap();
    let spider = loaded.card(10).unwrap();
    let grizzly = loaded.card(11).unwrap();
    let runeclaw = loaded.card(12).unwrap();
    let (alice_id, bob_id) = (loaded.game.players[0].id, loaded.game.players[1].id);

    let mut alice = loaded.scripted_controller(alice_id);
    let mut bob = loaded.scripted_controller(bob_id);
    let mut log = EventLog::new();
    let report = {
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        CombatPhase::new(&mut loaded.game)
            .with_options(loaded.options.clone())
            .run(loaded.attacking_player, &mut seats, &mut log)
            .unwrap()
    };

    assert!(alice.rejections().is_empty());
    assert!(bob.rejections().is_empty());
    assert_eq!(report.blocks.len(), 3);

    // Runeclaw Bear was ordered first and takes lethal damage from the goblin
    let mut died = report.died.clone();
    died.sort();
    let mut expected = vec![heelcutter, spider, runeclaw];
    expected.sort();
    assert_eq!(died, expected);
    assert_eq!(loaded.game.cards.get(grizzly).unwrap().damage, 1);

    // Vigilance keeps the angel untapped, and nothing got through
    assert!(!loaded.game.cards.get(angel).unwrap().tapped);
    assert_eq!(loaded.game.cards.get(angel).unwrap().damage, 2);
    assert_eq!(loaded.game.get_player(bob_id).unwrap().life, 10);
}

#[test]
fn test_illegal_scripted_block_is_dropped() {
    let mut loaded = Scenario::load_from_file(&fixture("illegal_block.json"))
        .unwrap()
        .build()
        .unwrap();
    let (alice_id, bob_id) = (loaded.game.players[0].id, loaded.game.players[1].id);

    let mut alice = loaded.scripted_controller(alice_id);
    let mut bob = loaded.scripted_controller(bob_id);
    let mut log = EventLog::new();
    let report = {
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        CombatPhase::new(&mut loaded.game)
            .with_options(loaded.options.clone())
            .run(loaded.attacking_player, &mut seats, &mut log)
            .unwrap()
    };

    // A lone blocker can't block a menace creature
    assert!(report.blocks.is_empty());
    assert_eq!(report.block_fallbacks, vec![bob_id]);
    assert_eq!(bob.rejections().len(), 1);
    assert_eq!(loaded.game.get_player(bob_id).unwrap().life, 17);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Scenario::load_from_file(&fixture("does_not_exist.json"));
    assert!(matches!(result, Err(MtgError::IoError(_))));
}
