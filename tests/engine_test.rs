//! End-to-end tests of the Mines engine against a real RocksDB instance.

use chrono::{Duration, Utc};
use minegrid::config::GameConfig;
use minegrid::errors::EngineError;
use minegrid::game_store::GameStore;
use minegrid::games::commitment::{generate_mine_locations, hash_server_seed};
use minegrid::games::payout::winnings_micros;
use minegrid::games::{AbandonedResolution, GameStatus, MinesEngine, MinesSession, SeedPair};
use minegrid::ledger::{Ledger, MICROS_PER_UNIT};
use minegrid::storage::Storage;
use std::sync::Arc;

struct Harness {
    _dir: tempfile::TempDir,
    engine: Arc<MinesEngine>,
    ledger: Arc<Ledger>,
    store: Arc<GameStore>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::open(dir.path()).expect("open storage");
    let ledger = Arc::new(Ledger::new(storage.clone()));
    let store = Arc::new(GameStore::new(storage));
    let engine = Arc::new(MinesEngine::new(
        store.clone(),
        ledger.clone(),
        GameConfig::default(),
    ));
    Harness {
        _dir: dir,
        engine,
        ledger,
        store,
    }
}

async fn fund(h: &Harness, user: &str, units: u64) {
    h.ledger
        .credit(user, units * MICROS_PER_UNIT, "funding")
        .await
        .expect("funding credit");
}

/// Peek at the full persisted session (tests need the layout the API
/// rightly withholds).
fn mine_layout(h: &Harness, game_id: &str) -> Vec<u8> {
    h.store
        .load_session(game_id)
        .unwrap()
        .expect("session exists")
        .mine_locations
}

fn first_safe_tile(layout: &[u8]) -> u8 {
    (0u8..25).find(|t| !layout.contains(t)).expect("safe tile")
}

#[tokio::test]
async fn safe_reveal_then_cashout_pays_exact_winnings() {
    let h = harness();
    fund(&h, "alice", 100).await;

    let view = h
        .engine
        .place_bet("alice", 10 * MICROS_PER_UNIT, 5, "lucky")
        .await
        .unwrap();
    assert_eq!(view.status, GameStatus::Active);
    assert_eq!(h.ledger.balance_micros("alice").unwrap(), 90_000_000);

    let layout = mine_layout(&h, &view.id);
    let safe = first_safe_tile(&layout);

    let view = h.engine.reveal_tile("alice", &view.id, safe).await.unwrap();
    assert_eq!(view.revealed_tiles, vec![safe]);
    // 0.99 * C(25,1) / C(20,1)
    assert!((view.payout_multiplier - 1.2375).abs() < 1e-12);
    assert!(view.server_seed.is_none());
    assert!(view.mine_locations.is_none());

    let view = h.engine.cashout("alice", &view.id).await.unwrap();
    assert_eq!(view.status, GameStatus::CashedOut);
    assert_eq!(view.cashed_out_micros, Some(12_375_000));
    assert_eq!(h.ledger.balance_micros("alice").unwrap(), 102_375_000);
    // Terminal session discloses the fairness material.
    assert!(view.server_seed.is_some());
    assert_eq!(view.mine_locations, Some(layout));
}

#[tokio::test]
async fn revealing_a_mine_busts_with_no_credit() {
    let h = harness();
    fund(&h, "bob", 50).await;

    let view = h
        .engine
        .place_bet("bob", 10 * MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap();
    let layout = mine_layout(&h, &view.id);

    let view = h
        .engine
        .reveal_tile("bob", &view.id, layout[0])
        .await
        .unwrap();
    assert_eq!(view.status, GameStatus::Busted);
    assert!(view.cashed_out_micros.is_none());
    assert_eq!(h.ledger.balance_micros("bob").unwrap(), 40_000_000);

    // Terminal state is sticky: no further reveals or cashouts.
    let err = h
        .engine
        .reveal_tile("bob", &view.id, first_safe_tile(&layout))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
    let err = h.engine.cashout("bob", &view.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
    assert_eq!(h.ledger.balance_micros("bob").unwrap(), 40_000_000);
}

#[tokio::test]
async fn double_reveal_is_rejected_without_mutation() {
    let h = harness();
    fund(&h, "carol", 50).await;

    let view = h
        .engine
        .place_bet("carol", MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap();
    let safe = first_safe_tile(&mine_layout(&h, &view.id));

    let first = h.engine.reveal_tile("carol", &view.id, safe).await.unwrap();
    let err = h
        .engine
        .reveal_tile("carol", &view.id, safe)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRevealed { tile } if tile == safe));

    let after = h.engine.session("carol", &view.id).await.unwrap();
    assert_eq!(after.revealed_tiles, first.revealed_tiles);
    assert_eq!(after.payout_multiplier, first.payout_multiplier);
}

#[tokio::test]
async fn cashout_before_any_reveal_is_rejected() {
    let h = harness();
    fund(&h, "dave", 50).await;

    let view = h
        .engine
        .place_bet("dave", MICROS_PER_UNIT, 3, "seed")
        .await
        .unwrap();
    let err = h.engine.cashout("dave", &view.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NothingToCashOut));

    let after = h.engine.session("dave", &view.id).await.unwrap();
    assert_eq!(after.status, GameStatus::Active);
}

#[tokio::test]
async fn bet_validation_rejects_before_any_state_change() {
    let h = harness();
    fund(&h, "erin", 5).await;

    let err = h
        .engine
        .place_bet("erin", 10 * MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    assert_eq!(h.ledger.balance_micros("erin").unwrap(), 5 * MICROS_PER_UNIT);

    let err = h
        .engine
        .place_bet("erin", MICROS_PER_UNIT, 0, "seed")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMineCount { .. }));
    let err = h
        .engine
        .place_bet("erin", MICROS_PER_UNIT, 25, "seed")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMineCount { .. }));

    let err = h.engine.place_bet("erin", 0, 5, "seed").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount { .. }));
    assert_eq!(h.ledger.balance_micros("erin").unwrap(), 5 * MICROS_PER_UNIT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_bets_admit_exactly_one_when_funds_cover_one() {
    let h = harness();
    fund(&h, "frank", 10).await;

    let engine_a = h.engine.clone();
    let engine_b = h.engine.clone();
    let a = tokio::spawn(async move {
        engine_a
            .place_bet("frank", 10 * MICROS_PER_UNIT, 5, "a")
            .await
    });
    let b = tokio::spawn(async move {
        engine_b
            .place_bet("frank", 10 * MICROS_PER_UNIT, 5, "b")
            .await
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::InsufficientFunds { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(h.ledger.balance_micros("frank").unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_reveals_on_one_game_serialize() {
    let h = harness();
    fund(&h, "leo", 50).await;

    let view = h
        .engine
        .place_bet("leo", MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap();
    let layout = mine_layout(&h, &view.id);
    let safe: Vec<u8> = (0u8..25).filter(|t| !layout.contains(t)).take(2).collect();

    let (engine_a, engine_b) = (h.engine.clone(), h.engine.clone());
    let (id_a, id_b) = (view.id.clone(), view.id.clone());
    let (tile_a, tile_b) = (safe[0], safe[1]);
    let a = tokio::spawn(async move { engine_a.reveal_tile("leo", &id_a, tile_a).await });
    let b = tokio::spawn(async move { engine_b.reveal_tile("leo", &id_b, tile_b).await });

    let va = a.await.unwrap().unwrap();
    let vb = b.await.unwrap().unwrap();
    // The per-game lock serializes the two reveals: one ran against an
    // empty revealed set, the other built on top of it.
    let mut counts = [va.revealed_tiles.len(), vb.revealed_tiles.len()];
    counts.sort_unstable();
    assert_eq!(counts, [1, 2]);

    let after = h.engine.session("leo", &view.id).await.unwrap();
    assert_eq!(after.revealed_tiles.len(), 2);
    assert!(after.revealed_tiles.contains(&tile_a));
    assert!(after.revealed_tiles.contains(&tile_b));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reveal_racing_cashout_settles_exactly_once() {
    let h = harness();
    fund(&h, "mia", 50).await;

    let view = h
        .engine
        .place_bet("mia", 10 * MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap();
    let layout = mine_layout(&h, &view.id);
    let safe: Vec<u8> = (0u8..25).filter(|t| !layout.contains(t)).take(2).collect();
    h.engine.reveal_tile("mia", &view.id, safe[0]).await.unwrap();

    let (engine_a, engine_b) = (h.engine.clone(), h.engine.clone());
    let (id_a, id_b) = (view.id.clone(), view.id.clone());
    let second = safe[1];
    let reveal = tokio::spawn(async move { engine_a.reveal_tile("mia", &id_a, second).await });
    let cashout = tokio::spawn(async move { engine_b.cashout("mia", &id_b).await });

    let reveal = reveal.await.unwrap();
    let cashed = cashout.await.unwrap().unwrap();
    assert_eq!(cashed.status, GameStatus::CashedOut);
    let paid = cashed.cashed_out_micros.unwrap();

    // Either the cashout won the lock and the reveal found a finished
    // game, or the reveal landed first and the payout covers both tiles.
    // Never a payout without the matching revealed set.
    match reveal {
        Err(EngineError::InvalidState { .. }) => {
            assert_eq!(paid, winnings_micros(10 * MICROS_PER_UNIT, 1, 5, 25, 100));
        }
        Ok(v) => {
            assert_eq!(v.revealed_tiles.len(), 2);
            assert_eq!(paid, winnings_micros(10 * MICROS_PER_UNIT, 2, 5, 25, 100));
        }
        Err(other) => panic!("unexpected reveal failure: {other}"),
    }
    assert_eq!(h.ledger.balance_micros("mia").unwrap(), 40_000_000 + paid);
}

#[tokio::test]
async fn reveal_validates_tile_against_the_session_grid() {
    let h = harness();

    // A persisted game on a smaller grid than the engine currently runs.
    let session = MinesSession {
        id: "g-small".to_string(),
        user_id: "kim".to_string(),
        bet_micros: MICROS_PER_UNIT,
        mine_count: 1,
        grid_size: 10,
        mine_locations: vec![3],
        revealed_tiles: Vec::new(),
        status: GameStatus::Active,
        payout_multiplier: 0.99,
        cashed_out_micros: None,
        seeds: SeedPair {
            server_seed: "seed".to_string(),
            server_seed_hash: "hash".to_string(),
            client_seed: "client".to_string(),
            nonce: 1,
        },
        created_at: Utc::now(),
    };
    let mut ops = Vec::new();
    h.store.stage_create(&session, &mut ops).unwrap();
    h.store.commit(ops).unwrap();

    // Tile 12 fits the configured 25-tile grid but not this game's.
    let err = h
        .engine
        .reveal_tile("kim", "g-small", 12)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTile {
            tile: 12,
            grid_size: 10
        }
    ));

    let view = h.engine.reveal_tile("kim", "g-small", 5).await.unwrap();
    assert_eq!(view.revealed_tiles, vec![5]);
}

#[tokio::test]
async fn ownership_and_existence_checks() {
    let h = harness();
    fund(&h, "gina", 50).await;

    let view = h
        .engine
        .place_bet("gina", MICROS_PER_UNIT, 5, "seed")
        .await
        .unwrap();

    let err = h
        .engine
        .reveal_tile("mallory", &view.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden { .. }));
    let err = h.engine.cashout("mallory", &view.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden { .. }));

    let err = h
        .engine
        .reveal_tile("gina", "no-such-game", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    let err = h.engine.reveal_tile("gina", &view.id, 25).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTile { .. }));
}

#[tokio::test]
async fn disclosed_seed_reproduces_the_layout() {
    let h = harness();
    fund(&h, "henry", 50).await;

    let view = h
        .engine
        .place_bet("henry", MICROS_PER_UNIT, 8, "my-client-seed")
        .await
        .unwrap();
    let layout = mine_layout(&h, &view.id);

    // Bust the game to trigger disclosure.
    let terminal = h
        .engine
        .reveal_tile("henry", &view.id, layout[0])
        .await
        .unwrap();
    let server_seed = terminal.server_seed.expect("disclosed after terminal");

    assert_eq!(hash_server_seed(&server_seed), terminal.server_seed_hash);
    assert_eq!(terminal.nonce, 1);
    let recomputed = generate_mine_locations(
        &server_seed,
        "my-client-seed",
        terminal.nonce,
        terminal.grid_size,
        terminal.mine_count,
    )
    .unwrap();
    assert_eq!(Some(recomputed), terminal.mine_locations);
}

#[tokio::test]
async fn reaper_hook_lists_and_resolves_stale_games() {
    let h = harness();
    fund(&h, "ivy", 100).await;

    let refund_me = h
        .engine
        .place_bet("ivy", 10 * MICROS_PER_UNIT, 5, "a")
        .await
        .unwrap();
    let forfeit_me = h
        .engine
        .place_bet("ivy", 10 * MICROS_PER_UNIT, 5, "b")
        .await
        .unwrap();
    assert_eq!(h.ledger.balance_micros("ivy").unwrap(), 80_000_000);

    // Everything just created counts as stale against a future cutoff.
    let stale = h
        .engine
        .stale_active_games(Utc::now() + Duration::minutes(1), 10);
    assert!(stale.contains(&refund_me.id));
    assert!(stale.contains(&forfeit_me.id));

    let resolved = h
        .engine
        .resolve_abandoned(&refund_me.id, AbandonedResolution::Refund)
        .await
        .unwrap();
    assert_eq!(resolved.status, GameStatus::CashedOut);
    assert_eq!(resolved.cashed_out_micros, Some(10 * MICROS_PER_UNIT));
    assert_eq!(h.ledger.balance_micros("ivy").unwrap(), 90_000_000);

    let resolved = h
        .engine
        .resolve_abandoned(&forfeit_me.id, AbandonedResolution::Forfeit)
        .await
        .unwrap();
    assert_eq!(resolved.status, GameStatus::Busted);
    assert_eq!(h.ledger.balance_micros("ivy").unwrap(), 90_000_000);

    // Resolved games drop out of the stale feed and stay terminal.
    let stale = h
        .engine
        .stale_active_games(Utc::now() + Duration::minutes(1), 10);
    assert!(stale.is_empty());
    let err = h
        .engine
        .resolve_abandoned(&refund_me.id, AbandonedResolution::Forfeit)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState { .. }));
}

#[tokio::test]
async fn multiplier_grows_with_each_safe_reveal() {
    let h = harness();
    fund(&h, "judy", 50).await;

    let view = h
        .engine
        .place_bet("judy", MICROS_PER_UNIT, 3, "seed")
        .await
        .unwrap();
    let layout = mine_layout(&h, &view.id);

    let mut prev = view.payout_multiplier;
    let mut revealed = 0u8;
    for tile in 0u8..25 {
        if layout.contains(&tile) {
            continue;
        }
        let view = h.engine.reveal_tile("judy", &view.id, tile).await.unwrap();
        revealed += 1;
        assert!(view.payout_multiplier > prev);
        assert_eq!(view.revealed_tiles.len(), revealed as usize);
        prev = view.payout_multiplier;
        if revealed == 5 {
            break;
        }
    }
}
