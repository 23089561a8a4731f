/// Tests for interactions between multiple keywords
///
/// These tests cover edge cases where multiple keywords interact in non-obvious ways.
/// Each one runs a full combat phase with scripted attacks and blocks.
use mtg_combat::core::{CardId, Keyword, PlayerId};
use mtg_combat::game::{
    CombatEvent, CombatPhase, CombatReport, ControllerSeats, DamageTarget, Defender, EventLog, GameState,
    ScriptedController,
};

fn new_game() -> (GameState, PlayerId, PlayerId) {
    let game = GameState::new_two_player("Alice".to_string(), "Bob".to_string(), 20);
    let p1 = game.players[0].id;
    let p2 = game.players[1].id;
    (game, p1, p2)
}

fn creature(game: &mut GameState, owner: PlayerId, name: &str, power: i8, toughness: i8, keywords: &[Keyword]) -> CardId {
    let id = game.create_creature(owner, name, power, toughness);
    game.cards.get_mut(id).unwrap().keywords.extend(keywords.iter().copied());
    id
}

/// Alice attacks Bob with `attackers`; Bob blocks with (blocker, attacker) pairs
fn fight(game: &mut GameState, attackers: &[CardId], blocks: &[(CardId, CardId)]) -> (CombatReport, EventLog) {
    let p1 = game.players[0].id;
    let p2 = game.players[1].id;
    let mut alice =
        ScriptedController::new(p1).with_attacks(attackers.iter().map(|a| (*a, Defender::Player(p2))).collect());
    let mut bob = ScriptedController::new(p2).with_blocks(blocks.to_vec());
    let mut log = EventLog::new();
    let report = {
        let mut seats = ControllerSeats::pair(&mut alice, &mut bob);
        CombatPhase::new(game).run(p1, &mut seats, &mut log).unwrap()
    };
    assert!(bob.rejections().is_empty(), "blocks rejected: {:?}", bob.rejections());
    (report, log)
}

fn life(game: &GameState, player: PlayerId) -> i32 {
    game.get_player(player).unwrap().life
}

/// Test first strike + trample interaction
///
/// MTG Rules 510.1c: A creature with first strike and trample assigns damage in the
/// first strike damage step. If it destroys all blockers with first strike damage,
/// excess damage tramples over to the defending player before regular combat damage.
#[test]
fn test_first_strike_trample_interaction() {
    let (mut game, p1, p2) = new_game();
    let knight = creature(&mut game, p1, "Trampling Knight", 4, 4, &[Keyword::FirstStrike, Keyword::Trample]);
    let bear = creature(&mut game, p2, "Grizzly Bears", 2, 2, &[]);

    let (report, log) = fight(&mut game, &[knight], &[(bear, knight)]);

    assert_eq!(life(&game, p2), 18);
    assert_eq!(report.died, vec![bear]);
    // The bear died before it could strike back
    assert_eq!(game.cards.get(knight).unwrap().damage, 0);
    assert_eq!(
        log.count_matching(|e| matches!(e, CombatEvent::DamageDealt { source, .. } if *source == bear)),
        0
    );
}

/// Test double strike + trample interaction
///
/// MTG Rules 702.19e: once all its blockers are gone, a blocked trampler assigns
/// all its damage to the player in the regular damage step.
#[test]
fn test_double_strike_trample_interaction() {
    let (mut game, p1, p2) = new_game();
    let giant = creature(&mut game, p1, "Double Giant", 3, 3, &[Keyword::DoubleStrike, Keyword::Trample]);
    let bear = creature(&mut game, p2, "Grizzly Bears", 2, 2, &[]);

    let (report, log) = fight(&mut game, &[giant], &[(bear, giant)]);

    // 1 trample in the first strike step, 3 in the regular step
    assert_eq!(life(&game, p2), 16);
    assert_eq!(report.died, vec![bear]);
    let to_player: Vec<(i32, bool)> = log
        .events()
        .iter()
        .filter_map(|e| match e {
            CombatEvent::DamageDealt {
                target: DamageTarget::Player(_),
                amount,
                first_strike,
                ..
            } => Some((*amount, *first_strike)),
            _ => None,
        })
        .collect();
    assert_eq!(to_player, vec![(1, true), (3, false)]);
}

/// Test deathtouch + trample interaction
///
/// MTG Rules 702.2c: one damage from a deathtouch source counts as lethal when
/// assigning trample damage.
#[test]
fn test_deathtouch_trample_interaction() {
    let (mut game, p1, p2) = new_game();
    let wurm = creature(&mut game, p1, "Deathtouch Wurm", 3, 3, &[Keyword::Deathtouch, Keyword::Trample]);
    let wall = creature(&mut game, p2, "Wall of Stone", 0, 8, &[]);

    let (report, _log) = fight(&mut game, &[wurm], &[(wall, wurm)]);

    assert_eq!(life(&game, p2), 18);
    assert_eq!(report.died, vec![wall]);
}

/// Test lifelink + double strike
///
/// Lifelink gains life in each damage step the creature deals damage in.
#[test]
fn test_lifelink_double_strike_interaction() {
    let (mut game, p1, p2) = new_game();
    let paladin = creature(&mut game, p1, "Paladin", 2, 2, &[Keyword::Lifelink, Keyword::DoubleStrike]);

    let (_report, _log) = fight(&mut game, &[paladin], &[]);

    assert_eq!(life(&game, p1), 24);
    assert_eq!(life(&game, p2), 16);
}

/// Test first strike blocker vs regular attacker
///
/// A first-strike blocker that kills the attacker takes no damage back.
#[test]
fn test_first_strike_blocker_kills_attacker_first() {
    let (mut game, p1, p2) = new_game();
    let bear = creature(&mut game, p1, "Grizzly Bears", 2, 2, &[]);
    let knight = creature(&mut game, p2, "White Knight", 2, 2, &[Keyword::FirstStrike]);

    let (report, _log) = fight(&mut game, &[bear], &[(knight, bear)]);

    assert_eq!(report.died, vec![bear]);
    assert_eq!(game.cards.get(knight).unwrap().damage, 0);
    assert_eq!(life(&game, p2), 20);
}

/// Test flying vs reach
///
/// MTG Rules 702.9b / 702.17b: a flyer can be blocked by flying or reach creatures.
#[test]
fn test_reach_blocks_flyer() {
    let (mut game, p1, p2) = new_game();
    let angel = creature(&mut game, p1, "Serra Angel", 4, 4, &[Keyword::Flying, Keyword::Vigilance]);
    let spider = creature(&mut game, p2, "Giant Spider", 2, 4, &[Keyword::Reach]);

    let (report, _log) = fight(&mut game, &[angel], &[(spider, angel)]);

    assert_eq!(report.blocks, vec![(spider, angel)]);
    assert_eq!(report.died, vec![spider]);
    assert_eq!(life(&game, p2), 20);
    // Vigilance: still untapped after attacking
    assert!(!game.cards.get(angel).unwrap().tapped);
}

/// Test deathtouch blocker vs big attacker
#[test]
fn test_deathtouch_blocker_kills_anything() {
    let (mut game, p1, p2) = new_game();
    let dragon = creature(&mut game, p1, "Shivan Dragon", 5, 5, &[]);
    let snake = creature(&mut game, p2, "Deathtouch Snake", 1, 1, &[Keyword::Deathtouch]);

    let (report, _log) = fight(&mut game, &[dragon], &[(snake, dragon)]);

    let mut died = report.died.clone();
    died.sort();
    let mut expected = vec![dragon, snake];
    expected.sort();
    assert_eq!(died, expected);
}
