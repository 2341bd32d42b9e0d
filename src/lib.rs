//! holdem-engine: a deterministic No-Limit Texas Hold'em hand engine.
//!
//! One [`game::Hand`] conducts exactly one hand of poker: it deals hole
//! cards, collects blinds and antes, runs the preflop/flop/turn/river
//! betting rounds, validates every action under No-Limit rules (including
//! short all-in raises), layers contributions into main and side pots, and
//! awards each pot at showdown with deterministic odd-chip handling.
//!
//! Goals:
//! - Deterministic: with an injected deck, a hand's whole trace is a pure
//!   function of seating, configuration and the action sequence
//! - Single-threaded: delayed steps (turn timers, street transitions, pot
//!   awards) run on an explicit virtual clock, never on background threads
//! - No panics for invalid input; `Result` for recoverable errors
//!
//! ## Quick start: play out a heads-up hand
//! ```
//! use holdem_engine::deck::SeededDeck;
//! use holdem_engine::game::{GameConfig, Hand, PlayerAction, Seat, Stage};
//!
//! let seats = vec![Seat::new("hero", 1000), Seat::new("villain", 1000)];
//! let config = GameConfig { small_blind: 10, big_blind: 20, ante: 0, time_limit_secs: 30 };
//! let mut hand = Hand::new(seats, config).with_deck_provider(SeededDeck(7));
//! hand.start().unwrap();
//!
//! // Heads-up the button posts the small blind and opens the action.
//! assert_eq!(hand.active_player(), Some("hero"));
//! hand.act("hero", PlayerAction::Bet(10)).unwrap();
//! hand.act("villain", PlayerAction::Bet(0)).unwrap();
//!
//! // The staged street transition runs when the clock moves.
//! hand.advance_clock(0);
//! assert_eq!(hand.stage(), Stage::Flop);
//! assert_eq!(hand.get_state().community_cards.len(), 3);
//! ```

pub mod cards;
pub mod deck;
pub mod evaluator;
pub mod game;
pub mod hand;
pub mod scheduler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
