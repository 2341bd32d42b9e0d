use std::collections::{BTreeMap, BTreeSet};

use crate::cards::Card;
use crate::deck::{Deck, DeckError, DeckProvider, ShuffledDeck};
use crate::evaluator::{BestFiveOracle, WinnerOracle};
use crate::hand::{Board, HoleCards};
use crate::scheduler::{EventId, Scheduler};

/// One-second turn-timer tick.
const TICK_MS: u64 = 1_000;
/// Pause between dealt streets and between pot awards.
const STAGE_PAUSE_MS: u64 = 1_000;

/// Stage of the hand state machine. Betting happens on the four streets
/// between `Start` and `Showdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    Start,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

/// A player's move when the action is on them. Check, call, raise and
/// all-in are all `Bet` amounts (chips added by this action); the engine
/// classifies them against the current betting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Fold,
    Bet(u64),
}

/// Ring position: player identity plus remaining chips. Index 0 of the
/// seating passed to [`Hand::new`] is the button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    player_id: String,
    stack: u64,
}

impl Seat {
    pub fn new(player_id: impl Into<String>, stack: u64) -> Self {
        Self { player_id: player_id.into(), stack }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn stack(&self) -> u64 {
        self.stack
    }
}

/// Blinds, antes and the per-turn time allowance.
///
/// `time_limit_secs == 0` disables act-timeouts entirely.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub ante: u64,
    pub time_limit_secs: u32,
}

/// Opaque pot identity, unique within one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PotId(u64);

/// Pot id and amount, as exposed in [`HandState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotView {
    pub id: PotId,
    pub amount: u64,
}

/// Payload handed to the pot-award sink, once per pot in creation order,
/// right before the chips move. `winning_cards` is the sorted, de-duplicated
/// union of the tied winners' best five cards; it is empty when the pot goes
/// uncontested to the last live player.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PotAward {
    pub pot_id: PotId,
    pub player_ids: Vec<String>,
    pub winning_cards: Vec<Card>,
}

/// Observable snapshot of a running hand. Hole cards of folded players are
/// absent; `bets` holds only non-zero current-street contributions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct HandState {
    pub community_cards: Vec<Card>,
    pub hole_cards: BTreeMap<String, [Card; 2]>,
    pub pots: Vec<PotView>,
    pub bets: BTreeMap<String, u64>,
    pub min_raise: u64,
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StartError {
    #[error("a hand needs at least two seats, got {0}")]
    NotEnoughSeats(usize),
    #[error("hand already started")]
    AlreadyStarted,
    #[error(transparent)]
    BadDeck(#[from] DeckError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActionError {
    #[error("no action is pending")]
    NoActionPending,
    #[error("action is on {expected}, not {actual}")]
    OutOfTurn { expected: String, actual: String },
    #[error("invalid bet of {amount} by {player}")]
    InvalidBet { player: String, amount: u64 },
}

#[derive(Debug)]
struct SeatState {
    player_id: String,
    stack: u64,
    street_bet: u64,
    hole: Option<HoleCards>,
}

#[derive(Debug)]
struct Pot {
    id: PotId,
    amount: u64,
    eligible: BTreeSet<usize>,
}

#[derive(Debug)]
struct TurnTimer {
    seat: usize,
    remaining_secs: u32,
    tick: EventId,
}

/// Deferred engine steps; everything that is not a synchronous `act` runs
/// through the scheduler so `destroy` can suppress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandEvent {
    TimerTick,
    NextStage,
    AwardPot,
}

/// One hand of No-Limit Texas Hold'em, driven as a deterministic state
/// machine: deal, forced bets, four betting rounds, pot construction,
/// showdown and award.
///
/// The hand owns a virtual clock; the embedder advances it with
/// [`Hand::advance_clock`] to run staged street transitions, turn-timer
/// ticks and pot awards. With an injected deck the whole trace is a pure
/// function of seating, configuration and the action sequence.
///
/// ```
/// use holdem_engine::game::{GameConfig, Hand, PlayerAction, Seat, Stage};
///
/// let seats = vec![
///     Seat::new("alice", 1000),
///     Seat::new("bob", 1000),
///     Seat::new("carol", 1000),
/// ];
/// let config = GameConfig { small_blind: 10, big_blind: 20, ante: 0, time_limit_secs: 30 };
/// let mut hand = Hand::new(seats, config);
/// hand.start().unwrap();
///
/// // bob posted the small blind, carol the big blind; alice opens.
/// assert_eq!(hand.active_player(), Some("alice"));
/// hand.act("alice", PlayerAction::Bet(20)).unwrap();
/// assert_eq!(hand.get_state().bets["alice"], 20);
/// assert_eq!(hand.stage(), Stage::Preflop);
/// ```
pub struct Hand {
    config: GameConfig,
    seats: Vec<SeatState>,
    deck: Option<Deck>,
    board: Board,
    pots: Vec<Pot>,
    next_pot_id: u64,
    stage: Stage,
    active: Option<usize>,
    first_to_act: Option<usize>,
    last_raiser: Option<usize>,
    min_raise: u64,
    timer: Option<TurnTimer>,
    sched: Scheduler<HandEvent>,
    deck_provider: Box<dyn DeckProvider>,
    oracle: Box<dyn WinnerOracle>,
    award_sink: Option<Box<dyn FnMut(&PotAward)>>,
    awarded: usize,
    finished: bool,
    destroyed: bool,
}

impl Hand {
    pub fn new(seats: Vec<Seat>, config: GameConfig) -> Self {
        let seats = seats
            .into_iter()
            .map(|s| SeatState {
                player_id: s.player_id,
                stack: s.stack,
                street_bet: 0,
                hole: None,
            })
            .collect();
        Self {
            config,
            seats,
            deck: None,
            board: Board::new(),
            pots: Vec::new(),
            next_pot_id: 0,
            stage: Stage::Start,
            active: None,
            first_to_act: None,
            last_raiser: None,
            min_raise: 0,
            timer: None,
            sched: Scheduler::new(),
            deck_provider: Box::new(ShuffledDeck),
            oracle: Box::new(BestFiveOracle),
            award_sink: None,
            awarded: 0,
            finished: false,
            destroyed: false,
        }
    }

    /// Replace the deck source (defaults to a freshly shuffled deck).
    pub fn with_deck_provider(mut self, provider: impl DeckProvider + 'static) -> Self {
        self.deck_provider = Box::new(provider);
        self
    }

    /// Replace the showdown oracle (defaults to best-five-of-seven).
    pub fn with_oracle(mut self, oracle: impl WinnerOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Register a callback fired once per pot award, before chips move.
    pub fn with_award_sink(mut self, sink: impl FnMut(&PotAward) + 'static) -> Self {
        self.award_sink = Some(Box::new(sink));
        self
    }

    // ---- lifecycle ------------------------------------------------------

    /// Deal the hand: hole cards to every seat, blinds and antes posted,
    /// first actor scheduled.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.destroyed {
            return Ok(());
        }
        if !matches!(self.stage, Stage::Start) {
            return Err(StartError::AlreadyStarted);
        }
        if self.seats.len() < 2 {
            return Err(StartError::NotEnoughSeats(self.seats.len()));
        }

        let mut deck = Deck::try_new(self.deck_provider.provide())?;
        for seat in &mut self.seats {
            if let (Some(a), Some(b)) = (deck.draw(), deck.draw()) {
                seat.hole = Some(HoleCards::from_deck(a, b));
            }
        }
        self.deck = Some(deck);
        self.stage = Stage::Preflop;

        let bb_seat = self.post_forced_bets();
        self.min_raise = self.config.big_blind;
        self.last_raiser = None;
        self.open_action_from(bb_seat + 1);
        Ok(())
    }

    /// Process one player action. Errors leave the hand untouched; calls
    /// during showdown, or by a player without hole cards, are no-ops.
    pub fn act(&mut self, player_id: &str, action: PlayerAction) -> Result<(), ActionError> {
        if self.destroyed || self.finished || matches!(self.stage, Stage::Showdown) {
            return Ok(());
        }
        let Some(seat) = self.seat_index(player_id) else {
            return Ok(());
        };
        if self.seats[seat].hole.is_none() {
            return Ok(());
        }
        match self.active {
            None => return Err(ActionError::NoActionPending),
            Some(a) if a != seat => {
                return Err(ActionError::OutOfTurn {
                    expected: self.seats[a].player_id.clone(),
                    actual: player_id.to_string(),
                })
            }
            Some(_) => {}
        }
        if let PlayerAction::Bet(amount) = action {
            if !self.is_valid_bet(player_id, amount) {
                return Err(ActionError::InvalidBet {
                    player: player_id.to_string(),
                    amount,
                });
            }
        }
        self.cancel_timer();
        self.apply(seat, action);
        Ok(())
    }

    /// Mark the hand terminated. Scheduled work is dropped and every later
    /// callback becomes a no-op; nothing else is mutated.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.timer = None;
        self.sched.clear();
    }

    /// Move the virtual clock forward, running every due step in order:
    /// staged street transitions, timer ticks, pot awards. Zero is valid
    /// and runs work staged by the last `act` call.
    pub fn advance_clock(&mut self, delta_ms: u64) {
        if self.destroyed {
            return;
        }
        let target = self.sched.now_ms().saturating_add(delta_ms);
        loop {
            match self.sched.next_due() {
                Some(due) if due <= target => {
                    self.sched.advance_to(due);
                    while let Some(event) = self.sched.pop_due() {
                        self.dispatch(event);
                        if self.destroyed {
                            return;
                        }
                    }
                }
                _ => break,
            }
        }
        self.sched.advance_to(target);
    }

    // ---- queries --------------------------------------------------------

    /// Is `amount` a legal bet for this player right now? Always true for
    /// an all-in; otherwise the amount must match the largest standing
    /// all-in, check/call the maximum bet, or fully raise it.
    pub fn is_valid_bet(&self, player_id: &str, amount: u64) -> bool {
        if !matches!(self.stage, Stage::Preflop | Stage::Flop | Stage::Turn | Stage::River) {
            return false;
        }
        let Some(seat) = self.seat_index(player_id) else {
            return false;
        };
        let s = &self.seats[seat];
        if s.hole.is_none() || amount > s.stack {
            return false;
        }
        let total = s.street_bet + amount;
        let max_bet = self.max_bet();
        let max_call_in = self.max_call_in();
        amount == s.stack
            || (max_call_in > 0 && total == max_call_in)
            || total == max_bet
            || total >= max_bet + self.min_raise
    }

    /// Snapshot for observers: board, live hole cards, pot totals, current
    /// street bets and the raise increment.
    pub fn get_state(&self) -> HandState {
        let hole_cards = self
            .seats
            .iter()
            .filter_map(|s| s.hole.map(|h| (s.player_id.clone(), h.as_array())))
            .collect();
        let bets = self
            .seats
            .iter()
            .filter(|s| s.street_bet > 0)
            .map(|s| (s.player_id.clone(), s.street_bet))
            .collect();
        HandState {
            community_cards: self.board.as_slice().to_vec(),
            hole_cards,
            pots: self.pots.iter().map(|p| PotView { id: p.id, amount: p.amount }).collect(),
            bets,
            min_raise: self.min_raise,
        }
    }

    pub fn seat_by_player_id(&self, player_id: &str) -> Option<Seat> {
        self.seat_index(player_id)
            .map(|i| Seat::new(self.seats[i].player_id.clone(), self.seats[i].stack))
    }

    pub fn seats(&self) -> Vec<Seat> {
        self.seats.iter().map(|s| Seat::new(s.player_id.clone(), s.stack)).collect()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn active_player(&self) -> Option<&str> {
        self.active.map(|i| self.seats[i].player_id.as_str())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn min_raise(&self) -> u64 {
        self.min_raise
    }

    /// Chips already locked into pots (excludes current street bets).
    pub fn pot_total(&self) -> u64 {
        self.pots.iter().map(|p| p.amount).sum()
    }

    /// Player ids still eligible to win the given pot.
    pub fn pot_eligibility(&self, id: PotId) -> Option<Vec<String>> {
        self.pots.iter().find(|p| p.id == id).map(|p| {
            p.eligible.iter().map(|&i| self.seats[i].player_id.clone()).collect()
        })
    }

    /// True once every pot has been paid out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ---- forced bets ----------------------------------------------------

    /// Post antes and blinds; returns the big-blind seat. Heads-up the
    /// button posts the small blind; otherwise blinds sit left of it.
    /// Every forced post is capped at the stack.
    fn post_forced_bets(&mut self) -> usize {
        let n = self.seats.len();
        let (sb, bb) = if n == 2 { (0, 1) } else { (1, 2) };

        if self.config.ante > 0 {
            for i in 0..n {
                if i != sb && i != bb {
                    self.post(i, self.config.ante);
                }
            }
        }
        self.post(sb, self.config.small_blind);
        self.post(bb, self.config.big_blind);
        bb
    }

    fn post(&mut self, seat: usize, amount: u64) {
        let s = &mut self.seats[seat];
        let paid = amount.min(s.stack);
        s.stack -= paid;
        s.street_bet += paid;
    }

    // ---- betting round --------------------------------------------------

    fn apply(&mut self, seat: usize, action: PlayerAction) {
        match action {
            PlayerAction::Fold => {
                self.seats[seat].hole = None;
                for pot in &mut self.pots {
                    pot.eligible.remove(&seat);
                }
            }
            PlayerAction::Bet(amount) => {
                let max_bet = self.max_bet();
                let s = &mut self.seats[seat];
                s.stack -= amount;
                s.street_bet += amount;
                let total = s.street_bet;
                // A full raise resets the increment and re-opens action; a
                // short all-in completes without doing either.
                if total >= max_bet + self.min_raise {
                    self.min_raise = total - max_bet;
                    self.last_raiser = Some(seat);
                }
            }
        }
        self.after_action(seat);
    }

    fn after_action(&mut self, seat: usize) {
        // Keep the round-end predicate anchored on a seat that can still act.
        if self.first_to_act == Some(seat) && !self.can_act(seat) {
            self.first_to_act = self.next_actor_after(seat);
        }

        if self.live_count() <= 1 {
            self.active = None;
            self.sched.schedule_in(0, HandEvent::NextStage);
            return;
        }

        if self.street_done(seat) {
            self.active = None;
            self.sched.schedule_in(0, HandEvent::NextStage);
        } else if let Some(next) = self.next_actor_after(seat) {
            self.active = Some(next);
            self.arm_timer(next);
        } else {
            self.active = None;
            self.sched.schedule_in(0, HandEvent::NextStage);
        }
    }

    /// End-of-street predicate, evaluated after each action.
    fn street_done(&self, actor: usize) -> bool {
        let Some(next) = self.next_actor_after(actor) else {
            return true;
        };
        if next == actor {
            return true;
        }
        if Some(next) == self.last_raiser {
            return true;
        }
        let max_bet = self.max_bet();
        // Everyone else is all-in and the last mover has nothing to call.
        if self.acting_count() <= 1 && self.seats[next].street_bet == max_bet {
            return true;
        }
        let all_matched = self
            .seats
            .iter()
            .filter(|s| s.hole.is_some())
            .all(|s| s.street_bet == max_bet || s.stack == 0);
        all_matched && Some(next) == self.first_to_act
    }

    /// Open action on a street, scanning the ring from `from` for the first
    /// seat that can act. With fewer than two such seats there is no
    /// betting: the remaining board runs out street by street.
    fn open_action_from(&mut self, from: usize) {
        let n = self.seats.len();
        if self.acting_count() < 2 {
            self.active = None;
            self.first_to_act = None;
            self.sched.schedule_in(STAGE_PAUSE_MS, HandEvent::NextStage);
            return;
        }
        let mut idx = from % n;
        for _ in 0..n {
            if self.can_act(idx) {
                break;
            }
            idx = (idx + 1) % n;
        }
        self.first_to_act = Some(idx);
        self.active = Some(idx);
        self.arm_timer(idx);
    }

    // ---- street transitions ---------------------------------------------

    fn dispatch(&mut self, event: HandEvent) {
        if self.destroyed {
            return;
        }
        match event {
            HandEvent::TimerTick => self.on_timer_tick(),
            HandEvent::NextStage => self.on_next_stage(),
            HandEvent::AwardPot => self.on_award_pot(),
        }
    }

    fn on_next_stage(&mut self) {
        self.move_bets_to_pots();

        if self.live_count() <= 1 {
            self.begin_showdown();
            return;
        }
        match self.stage {
            Stage::Preflop => {
                self.deal_board(3);
                self.stage = Stage::Flop;
                self.open_street();
            }
            Stage::Flop => {
                self.deal_board(1);
                self.stage = Stage::Turn;
                self.open_street();
            }
            Stage::Turn => {
                self.deal_board(1);
                self.stage = Stage::River;
                self.open_street();
            }
            Stage::River => self.begin_showdown(),
            Stage::Start | Stage::Showdown => {}
        }
    }

    fn open_street(&mut self) {
        self.min_raise = self.config.big_blind;
        self.last_raiser = None;
        self.open_action_from(1);
    }

    fn deal_board(&mut self, count: usize) {
        if let Some(deck) = &mut self.deck {
            for _ in 0..count {
                if let Some(card) = deck.draw() {
                    self.board.push(card);
                }
            }
        }
    }

    // ---- pot construction ------------------------------------------------

    /// Fold the street's contributions into the pot list, smallest
    /// contribution first. Each tier is winnable by its live contributors;
    /// a tier whose eligibility matches an existing pot merges into it.
    fn move_bets_to_pots(&mut self) {
        let mut remaining: Vec<(usize, u64)> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.street_bet > 0)
            .map(|(i, s)| (i, s.street_bet))
            .collect();
        remaining.sort_by_key(|&(seat, bet)| (bet, seat));

        while !remaining.is_empty() {
            let tier = remaining[0].1;
            let amount = tier * remaining.len() as u64;
            let eligible: BTreeSet<usize> = remaining
                .iter()
                .map(|&(seat, _)| seat)
                .filter(|&seat| self.seats[seat].hole.is_some())
                .collect();

            if let Some(pot) = self.pots.iter_mut().find(|p| p.eligible == eligible) {
                pot.amount += amount;
            } else if eligible.is_empty() {
                // Every contributor at this tier folded; the chips stay in
                // the most recent pot rather than forming one nobody can win.
                if let Some(last) = self.pots.last_mut() {
                    last.amount += amount;
                } else {
                    let all_live =
                        (0..self.seats.len()).filter(|&i| self.seats[i].hole.is_some()).collect();
                    self.push_pot(amount, all_live);
                }
            } else {
                self.push_pot(amount, eligible);
            }

            for entry in &mut remaining {
                entry.1 -= tier;
            }
            remaining.retain(|&(_, left)| left > 0);
        }

        for seat in &mut self.seats {
            seat.street_bet = 0;
        }
    }

    fn push_pot(&mut self, amount: u64, eligible: BTreeSet<usize>) {
        let id = PotId(self.next_pot_id);
        self.next_pot_id += 1;
        self.pots.push(Pot { id, amount, eligible });
    }

    // ---- showdown and award ----------------------------------------------

    fn begin_showdown(&mut self) {
        self.stage = Stage::Showdown;
        self.active = None;
        self.first_to_act = None;
        self.last_raiser = None;
        self.cancel_timer();

        // Folds can empty a pot's eligibility; merge such chips forward so
        // every surviving pot has someone to win it.
        let mut carry = 0u64;
        let mut pots = Vec::with_capacity(self.pots.len());
        for mut pot in self.pots.drain(..) {
            if pot.eligible.is_empty() {
                carry += pot.amount;
                continue;
            }
            pot.amount += carry;
            carry = 0;
            pots.push(pot);
        }
        if carry > 0 {
            if let Some(last) = pots.last_mut() {
                last.amount += carry;
            }
        }
        self.pots = pots;

        self.awarded = 0;
        if self.pots.is_empty() {
            self.finished = true;
        } else {
            self.sched.schedule_in(STAGE_PAUSE_MS, HandEvent::AwardPot);
        }
    }

    /// Pay out the next pot in creation order: oracle over the eligible
    /// hands, even split, whole remainder to the first winner.
    fn on_award_pot(&mut self) {
        if self.awarded >= self.pots.len() {
            self.finished = true;
            return;
        }
        let idx = self.awarded;
        let pot_id = self.pots[idx].id;
        let amount = self.pots[idx].amount;
        let eligible: Vec<usize> = self.pots[idx].eligible.iter().copied().collect();

        let (winners, winning_cards) = if self.live_count() == 1 {
            (eligible, Vec::new())
        } else {
            let entrants: Vec<(usize, HoleCards)> = eligible
                .iter()
                .filter_map(|&i| self.seats[i].hole.map(|h| (i, h)))
                .collect();
            let hands: Vec<HoleCards> = entrants.iter().map(|&(_, h)| h).collect();
            let reported = self.oracle.winners(&hands, &self.board);
            let mut winners: Vec<usize> = reported
                .iter()
                .filter_map(|w| entrants.get(w.entrant).map(|&(seat, _)| seat))
                .collect();
            let mut cards: Vec<Card> = reported.iter().flat_map(|w| w.cards).collect();
            cards.sort();
            cards.dedup();
            if winners.is_empty() {
                winners = entrants.iter().map(|&(seat, _)| seat).collect();
            }
            (winners, cards)
        };

        if let Some(sink) = &mut self.award_sink {
            sink(&PotAward {
                pot_id,
                player_ids: winners.iter().map(|&i| self.seats[i].player_id.clone()).collect(),
                winning_cards,
            });
        }

        let share = amount / winners.len() as u64;
        let remainder = amount % winners.len() as u64;
        self.pots[idx].amount = 0;
        for (k, &seat) in winners.iter().enumerate() {
            let prize = if k == 0 { share + remainder } else { share };
            self.seats[seat].stack += prize;
        }

        self.awarded += 1;
        if self.awarded < self.pots.len() {
            self.sched.schedule_in(STAGE_PAUSE_MS, HandEvent::AwardPot);
        } else {
            self.finished = true;
        }
    }

    // ---- timers -----------------------------------------------------------

    fn arm_timer(&mut self, seat: usize) {
        self.cancel_timer();
        if self.config.time_limit_secs == 0 {
            return;
        }
        let tick = self.sched.schedule_in(TICK_MS, HandEvent::TimerTick);
        self.timer = Some(TurnTimer { seat, remaining_secs: self.config.time_limit_secs, tick });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.sched.cancel(timer.tick);
        }
    }

    /// One second elapsed for the active player. At zero the engine takes
    /// the free action: check when that is a valid zero bet, fold otherwise.
    fn on_timer_tick(&mut self) {
        let Some(timer) = &mut self.timer else {
            return;
        };
        timer.remaining_secs -= 1;
        if timer.remaining_secs > 0 {
            timer.tick = self.sched.schedule_in(TICK_MS, HandEvent::TimerTick);
            return;
        }
        let seat = timer.seat;
        self.timer = None;
        if self.active != Some(seat) {
            return;
        }
        let player_id = self.seats[seat].player_id.clone();
        let action = if self.is_valid_bet(&player_id, 0) {
            PlayerAction::Bet(0)
        } else {
            PlayerAction::Fold
        };
        self.apply(seat, action);
    }

    // ---- seat scanning -----------------------------------------------------

    fn seat_index(&self, player_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    fn is_live(&self, seat: usize) -> bool {
        self.seats[seat].hole.is_some()
    }

    fn can_act(&self, seat: usize) -> bool {
        self.is_live(seat) && self.seats[seat].stack > 0
    }

    fn live_count(&self) -> usize {
        self.seats.iter().filter(|s| s.hole.is_some()).count()
    }

    /// Seats that still have both chips and cards.
    fn acting_count(&self) -> usize {
        (0..self.seats.len()).filter(|&i| self.can_act(i)).count()
    }

    /// Next seat after `seat` (ring order) that can still act; lands back on
    /// `seat` itself when it is the only one left.
    fn next_actor_after(&self, seat: usize) -> Option<usize> {
        let n = self.seats.len();
        (1..=n).map(|j| (seat + j) % n).find(|&i| self.can_act(i))
    }

    fn max_bet(&self) -> u64 {
        self.seats.iter().map(|s| s.street_bet).max().unwrap_or(0)
    }

    /// Largest current-street bet among seats that are already all-in.
    fn max_call_in(&self) -> u64 {
        self.seats
            .iter()
            .filter(|s| s.stack == 0)
            .map(|s| s.street_bet)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::full_deck;

    fn config() -> GameConfig {
        GameConfig { small_blind: 10, big_blind: 20, ante: 0, time_limit_secs: 0 }
    }

    fn seats(stacks: &[u64]) -> Vec<Seat> {
        const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];
        stacks.iter().zip(NAMES).map(|(&stack, name)| Seat::new(name, stack)).collect()
    }

    fn started(stacks: &[u64]) -> Hand {
        let mut hand = Hand::new(seats(stacks), config()).with_deck_provider(full_deck);
        hand.start().unwrap();
        hand
    }

    #[test]
    fn blinds_are_posted_and_first_actor_is_left_of_big_blind() {
        let hand = started(&[1000, 1000, 1000]);
        let state = hand.get_state();
        assert_eq!(state.bets.get("b"), Some(&10));
        assert_eq!(state.bets.get("c"), Some(&20));
        assert_eq!(state.bets.get("a"), None);
        assert_eq!(hand.active_player(), Some("a"));
        assert_eq!(state.min_raise, 20);
    }

    #[test]
    fn heads_up_button_posts_small_blind_and_opens() {
        let hand = started(&[1000, 1000]);
        let state = hand.get_state();
        assert_eq!(state.bets.get("a"), Some(&10));
        assert_eq!(state.bets.get("b"), Some(&20));
        assert_eq!(hand.active_player(), Some("a"));
    }

    #[test]
    fn antes_come_from_non_blind_seats_only() {
        let cfg = GameConfig { small_blind: 10, big_blind: 20, ante: 5, time_limit_secs: 0 };
        let mut hand =
            Hand::new(seats(&[1000, 1000, 1000, 1000]), cfg).with_deck_provider(full_deck);
        hand.start().unwrap();
        let state = hand.get_state();
        assert_eq!(state.bets.get("a"), Some(&5), "button antes");
        assert_eq!(state.bets.get("b"), Some(&10), "small blind posts no ante");
        assert_eq!(state.bets.get("c"), Some(&20), "big blind posts no ante");
        assert_eq!(state.bets.get("d"), Some(&5));
    }

    #[test]
    fn forced_posts_are_capped_at_the_stack() {
        let hand = started(&[1000, 4, 1000]);
        let state = hand.get_state();
        assert_eq!(state.bets.get("b"), Some(&4));
        assert_eq!(hand.seat_by_player_id("b").unwrap().stack(), 0);
    }

    #[test]
    fn start_preconditions() {
        let mut lone = Hand::new(seats(&[1000]), config());
        assert!(matches!(lone.start(), Err(StartError::NotEnoughSeats(1))));

        let mut hand = started(&[1000, 1000]);
        assert!(matches!(hand.start(), Err(StartError::AlreadyStarted)));
    }

    #[test]
    fn a_short_deck_fails_start() {
        let mut hand = Hand::new(seats(&[1000, 1000]), config())
            .with_deck_provider(|| Vec::new());
        assert!(matches!(hand.start(), Err(StartError::BadDeck(DeckError::WrongSize(0)))));
    }

    #[test]
    fn bets_layer_into_tiered_pots() {
        let mut hand = started(&[1000, 1000, 1000]);
        hand.seats[0].street_bet = 30;
        hand.seats[1].street_bet = 50;
        hand.seats[2].street_bet = 50;
        hand.move_bets_to_pots();

        let state = hand.get_state();
        let amounts: Vec<u64> = state.pots.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![90, 40]);
        assert_eq!(
            hand.pot_eligibility(state.pots[0].id).unwrap(),
            vec!["a", "b", "c"],
            "everyone reaches the bottom tier"
        );
        assert_eq!(hand.pot_eligibility(state.pots[1].id).unwrap(), vec!["b", "c"]);
        assert!(state.bets.is_empty(), "street bets are consumed");
    }

    #[test]
    fn equal_eligibility_tiers_merge_across_streets() {
        let mut hand = started(&[1000, 1000, 1000]);
        hand.seats[0].street_bet = 20;
        hand.seats[1].street_bet = 20;
        hand.seats[2].street_bet = 20;
        hand.move_bets_to_pots();
        hand.seats[0].street_bet = 50;
        hand.seats[1].street_bet = 50;
        hand.seats[2].street_bet = 50;
        hand.move_bets_to_pots();

        let state = hand.get_state();
        assert_eq!(state.pots.len(), 1, "same eligibility merges into one pot");
        assert_eq!(state.pots[0].amount, 210);
    }

    #[test]
    fn folded_chips_count_but_folded_players_are_not_eligible() {
        let mut hand = started(&[1000, 1000, 1000]);
        hand.seats[0].street_bet = 40;
        hand.seats[1].street_bet = 40;
        hand.seats[2].street_bet = 40;
        hand.seats[2].hole = None; // c folded this street
        hand.move_bets_to_pots();

        let state = hand.get_state();
        assert_eq!(state.pots[0].amount, 120);
        assert_eq!(hand.pot_eligibility(state.pots[0].id).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn folding_retroactively_leaves_every_pot() {
        let mut hand = started(&[1000, 1000, 1000]);
        hand.seats[0].street_bet = 20;
        hand.seats[1].street_bet = 20;
        hand.seats[2].street_bet = 20;
        hand.move_bets_to_pots();

        hand.active = Some(2);
        hand.act("c", PlayerAction::Fold).unwrap();
        let state = hand.get_state();
        assert_eq!(hand.pot_eligibility(state.pots[0].id).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn orphaned_tier_merges_into_the_previous_pot() {
        let mut hand = started(&[1000, 1000, 1000]);
        // c bet the most and then folded: nobody live reaches the top tier.
        hand.seats[0].street_bet = 50;
        hand.seats[1].street_bet = 50;
        hand.seats[2].street_bet = 80;
        hand.seats[2].hole = None;
        hand.move_bets_to_pots();
        hand.begin_showdown();

        let state = hand.get_state();
        assert_eq!(state.pots.len(), 1);
        assert_eq!(state.pots[0].amount, 180, "orphaned chips stay winnable");
    }

    #[test]
    fn validator_rejects_what_act_rejects() {
        let mut hand = started(&[1000, 1000, 1000]);
        // a raises to 100; b calls all of its short stack via the engine.
        hand.act("a", PlayerAction::Bet(100)).unwrap();
        assert_eq!(hand.min_raise(), 80);

        for amount in [0, 5, 79, 99, 101, 2000] {
            if hand.is_valid_bet("b", amount) {
                continue;
            }
            let before = hand.get_state();
            let err = hand.act("b", PlayerAction::Bet(amount)).unwrap_err();
            assert!(matches!(err, ActionError::InvalidBet { .. }));
            assert_eq!(hand.get_state(), before, "rejected bets leave state untouched");
        }
    }

    #[test]
    fn out_of_turn_and_unknown_players() {
        let mut hand = started(&[1000, 1000, 1000]);
        let err = hand.act("b", PlayerAction::Bet(10)).unwrap_err();
        assert!(matches!(err, ActionError::OutOfTurn { .. }));
        // Unknown ids have no hole cards: silently ignored.
        assert!(hand.act("zz", PlayerAction::Fold).is_ok());
        assert_eq!(hand.active_player(), Some("a"));
    }

    #[test]
    fn exactly_one_active_actor_between_transitions() {
        let mut hand = started(&[1000, 1000, 1000]);
        for (player, amount) in [("a", 20), ("b", 10)] {
            assert_eq!(hand.active_player(), Some(player));
            hand.act(player, PlayerAction::Bet(amount)).unwrap();
        }
        assert_eq!(hand.active_player(), Some("c"));
    }

    #[test]
    fn destroyed_hands_ignore_everything() {
        let mut hand = started(&[1000, 1000, 1000]);
        hand.destroy();
        assert!(hand.act("a", PlayerAction::Bet(20)).is_ok());
        hand.advance_clock(60_000);
        assert_eq!(hand.get_state().bets.get("a"), None);
        assert_eq!(hand.stage(), Stage::Preflop);
    }
}
