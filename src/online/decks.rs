use super::backend::MatchStore;
use crate::game::game_state::HAND_SIZE;
use crate::logger;
use crate::models::card::Card;
use crate::utils::errors::{StoreError, SyncError};
use crate::utils::retry::RetryPolicy;

/// Playable cards of a deck, duplicates by id dropped, original order kept.
pub fn usable_cards(cards: &[Card]) -> Vec<Card> {
    let mut usable: Vec<Card> = Vec::with_capacity(cards.len());
    for card in cards {
        if card.is_usable() && !usable.iter().any(|kept| kept.id == card.id) {
            usable.push(card.dealt());
        }
    }
    usable
}

/// The first five usable cards, or an error naming how many there were.
///
/// # Arguments
/// * `player_id` - Owner of the deck, named in the error.
/// * `cards` - The deck as stored, possibly with unusable or duplicate entries.
///
/// # Returns
/// * `Ok(Vec<Card>)` - Exactly five dealt cards.
/// * `Err(SyncError::InvalidDeck)` - Fewer than five usable cards.
pub fn validate_deck(player_id: &str, cards: &[Card]) -> Result<Vec<Card>, SyncError> {
    let usable = usable_cards(cards);
    if usable.len() < HAND_SIZE {
        return Err(SyncError::InvalidDeck {
            player_id: player_id.to_string(),
            usable: usable.len(),
        });
    }
    Ok(usable.into_iter().take(HAND_SIZE).collect())
}

fn is_complete(cards: &[Card]) -> bool {
    usable_cards(cards).len() >= HAND_SIZE
}

async fn load_profile_deck<S: MatchStore>(
    store: &S,
    user_id: &str,
) -> Result<Option<Vec<Card>>, StoreError> {
    let Some(profile) = store.fetch_profile(user_id).await? else {
        return Ok(None);
    };
    let cards = store.fetch_cards(&profile.selected_deck).await?;
    Ok(Some(cards).filter(|cards| is_complete(cards)))
}

/// Loads a user's selected deck from their profile, retrying while the store fails or the deck
/// comes back incomplete.
///
/// `Ok(None)` means every attempt went through but the deck never had five usable cards.
pub async fn fetch_profile_deck<S: MatchStore>(
    store: &S,
    user_id: &str,
    retry: &RetryPolicy,
) -> Result<Option<Vec<Card>>, SyncError> {
    let label = format!("deck of `{user_id}`");
    let result = retry
        .run(&label, move |_| load_profile_deck(store, user_id))
        .await;

    match result {
        Ok(cards) => Ok(cards),
        Err(error) => {
            logger!(ERROR, "[DECKS] Could not load deck of `{user_id}` ({error})");
            Err(SyncError::RetriesExhausted {
                what: label,
                attempts: retry.attempts,
            })
        }
    }
}

/// Deck for seeding a match: the copy embedded in the match row when it is complete,
/// otherwise the profile deck.
pub async fn resolve_seed_deck<S: MatchStore>(
    store: &S,
    user_id: &str,
    embedded: Option<&[Card]>,
    retry: &RetryPolicy,
) -> Result<Vec<Card>, SyncError> {
    if let Some(cards) = embedded.filter(|cards| is_complete(cards)) {
        return validate_deck(user_id, cards);
    }

    logger!(
        WARN,
        "[DECKS] Embedded deck of `{user_id}` is incomplete, falling back to profile lookup"
    );
    match fetch_profile_deck(store, user_id, retry).await? {
        Some(cards) => validate_deck(user_id, &cards),
        None => validate_deck(user_id, embedded.unwrap_or_default()),
    }
}

/// Deck of a matchmaking opponent: the profile deck first, the deck they advertised in
/// presence when the profile stays unavailable.
pub async fn resolve_opponent_deck<S: MatchStore>(
    store: &S,
    user_id: &str,
    advertised: &[Card],
    retry: &RetryPolicy,
) -> Result<Vec<Card>, SyncError> {
    match fetch_profile_deck(store, user_id, retry).await {
        Ok(Some(cards)) => validate_deck(user_id, &cards),
        Ok(None) | Err(SyncError::RetriesExhausted { .. }) => {
            logger!(
                WARN,
                "[DECKS] Using the deck `{user_id}` advertised in presence"
            );
            validate_deck(user_id, advertised)
        }
        Err(error) => Err(error),
    }
}
