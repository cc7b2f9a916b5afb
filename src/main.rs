use std::error::Error;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use shinobi_triad::game::catalog::{starter_catalog, starter_pack};
use shinobi_triad::game::computer::ComputerOpponent;
use shinobi_triad::game::game_state::Player;
use shinobi_triad::game::gauntlet::{GauntletEngine, MatchOutcome, Progress};
use shinobi_triad::game::mechanics::Mechanic;
use shinobi_triad::game::store::{GameHandle, GameSetup, GameStore};
use shinobi_triad::logger;
use shinobi_triad::models::board::Seat;
use shinobi_triad::models::profile::Profile;
use shinobi_triad::models::settings::Settings;
use shinobi_triad::online::backend::MatchStore;
use shinobi_triad::online::matchmaking::{Matchmaker, Role, SearchRequest};
use shinobi_triad::online::memory::MemoryBackend;
use shinobi_triad::online::sync::{OnlineSession, SessionStatus};
use shinobi_triad::utils::logger::{Level, Logger};

const GAUNTLET_MATCH_LIMIT: u32 = 12;

/// Plays one local match between two computer opponents and returns the final state.
async fn play_out(setup: GameSetup, think: (std::time::Duration, std::time::Duration)) -> GameHandle {
    let game = GameHandle::new(GameStore::new());
    if let Err(rejection) = game.init_game(setup).await {
        logger!(ERROR, "Match could not start ({rejection})");
        return game;
    }

    let first = tokio::spawn(ComputerOpponent::new(Seat::Player1, think).run(game.clone()));
    let second = tokio::spawn(ComputerOpponent::new(Seat::Player2, think).run(game.clone()));
    let _ = tokio::join!(first, second);
    game
}

async fn exhibition(settings: &Settings) {
    let catalog = starter_catalog();
    let mut rng = ChaCha8Rng::from_entropy();
    let setup = GameSetup {
        room_id: "exhibition".to_string(),
        player1: Player::new("cpu-blue", "Blue Leaf", "blue")
            .computer()
            .with_hand(starter_pack(&catalog, &mut rng)),
        player2: Player::new("cpu-red", "Red Sand", "red")
            .computer()
            .with_hand(starter_pack(&catalog, &mut rng)),
        first: Seat::Player1,
        mechanic: Mechanic::plain(),
    };

    let state = play_out(setup, settings.think_range()).await.snapshot().await;
    logger!(
        INFO,
        "Exhibition over: {:?} ({} vs {} cells)",
        state.winner(),
        state.board.owned_by(Seat::Player1),
        state.board.owned_by(Seat::Player2)
    );
}

async fn gauntlet(backend: &MemoryBackend) -> Result<(), Box<dyn Error>> {
    let catalog = backend.fetch_catalog().await?;
    let mut engine = GauntletEngine::new();
    engine.refresh_bosses(backend).await;
    let mut rng = ChaCha8Rng::from_entropy();
    engine.start_run(starter_pack(&catalog, &mut rng))?;

    let instant = (std::time::Duration::ZERO, std::time::Duration::ZERO);
    for _ in 0..GAUNTLET_MATCH_LIMIT {
        if !engine.state().is_active {
            break;
        }
        let config = engine.get_opponent_config(&catalog);
        let setup = engine.match_setup(Player::new("akane", "Akane", "blue").computer(), &config);
        let state = play_out(setup, instant).await.snapshot().await;
        let Some(winner) = state.winner() else {
            break;
        };

        let progress = engine.process_match_result(
            MatchOutcome::for_seat(winner, Seat::Player1),
            state.player1.total_flips as u32,
            state.board.owned_by(Seat::Player1) as u32,
        );
        logger!(INFO, "Gauntlet vs `{}`: {progress:?}", config.name);
        if matches!(progress, Progress::RunEnded { .. }) {
            break;
        }

        if engine.state().pending_reward {
            let pick = engine.reward_options(&catalog).into_iter().next();
            engine.consume_reward(pick.map(|card| (card, 0)));
        }
    }

    if engine.state().is_active {
        engine.abandon_run();
    }
    let coins = engine.settle_run(backend, "akane").await?;
    logger!(
        INFO,
        "Gauntlet finished at {} with {} points, {coins} coins earned",
        engine.state().rank,
        engine.state().score
    );
    Ok(())
}

async fn online_loopback(settings: &Settings, backend: Arc<MemoryBackend>) -> Result<(), Box<dyn Error>> {
    let catalog = starter_catalog();
    let (_stop_tx, stop) = watch::channel(false);

    let mut searches = Vec::new();
    for user_id in ["akane", "botan"] {
        let deck = backend
            .profile(user_id)
            .await
            .map(|profile| profile.selected_deck)
            .unwrap_or_default();
        let deck = catalog
            .iter()
            .filter(|card| deck.contains(&card.id))
            .cloned()
            .collect();
        let matchmaker = Matchmaker::new(
            backend.clone(),
            backend.clone(),
            SearchRequest {
                user_id: user_id.to_string(),
                mode: "casual".to_string(),
                rank: "Genin".to_string(),
                deck,
            },
            settings.sync(),
        );
        searches.push((user_id, tokio::spawn(matchmaker.search(stop.clone()))));
    }

    let mut sessions = Vec::new();
    for (user_id, search) in searches {
        let (found, role) = search.await??;
        let seat = match role {
            Role::Host => Seat::Player1,
            Role::Guest => Seat::Player2,
        };
        let game = GameHandle::new(GameStore::new().with_room(&found.match_id));
        let session = OnlineSession::connect(
            backend.clone(),
            backend.clone(),
            game.clone(),
            &found.match_id,
            user_id,
            settings.sync(),
        )
        .await?;
        tokio::spawn(ComputerOpponent::instant(seat, rand::random()).run(game));
        sessions.push(tokio::spawn(session.run(stop.clone())));
    }

    for session in sessions {
        let status = session.await??;
        if status != SessionStatus::Finished {
            logger!(WARN, "Online session ended as {status:?}");
        }
    }

    // let the host's grace-period cleanup run
    tokio::time::sleep(settings.sync().archive_grace).await;
    for row in backend.history().await {
        logger!(
            INFO,
            "Online match `{}`: winner {:?} ({} vs {} cells)",
            row.match_id,
            row.winner_id,
            row.player1_cells,
            row.player2_cells
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load()?;
    match settings.log_level.parse::<Level>() {
        Ok(level) => Logger::set_level(level),
        Err(error) => logger!(WARN, "{error}, keeping `info`"),
    }

    let backend = Arc::new(MemoryBackend::new());
    let catalog = starter_catalog();
    backend.add_cards(catalog.clone()).await;
    let mut rng = ChaCha8Rng::from_entropy();
    for (id, username) in [("akane", "Akane"), ("botan", "Botan")] {
        backend
            .add_profile(Profile {
                id: id.to_string(),
                username: username.to_string(),
                selected_deck: starter_pack(&catalog, &mut rng)
                    .into_iter()
                    .map(|card| card.id)
                    .collect(),
                ..Profile::default()
            })
            .await;
    }

    exhibition(&settings).await;
    gauntlet(&backend).await?;
    online_loopback(&settings, backend).await?;
    Ok(())
}
