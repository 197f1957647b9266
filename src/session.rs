//! Quiz session lifecycle.
//!
//! A session moves `Idle -> Running -> Terminated -> Idle`. [`reduce`] is the
//! pure transition function; [`Machine`] holds the current phase and applies
//! events to it, leaving the phase untouched when an event is rejected.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DrillError, Result};
use crate::question::{Deck, Question, DECK_SIZE};
use crate::record::{AnswerEntry, AnswerResult, SessionOutcome, SessionStatus};

pub const CORRECT_FEEDBACK: &str = "Correct! 🎉";

/// Per-process rules every session runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Countdown in seconds; `None` runs the session untimed.
    pub time_limit_secs: Option<u32>,
    /// Emit a [`Effect::LogAnswer`] for every submitted answer.
    pub log_answers: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            time_limit_secs: Some(300),
            log_answers: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Start { name: String, deck: Deck },
    Submit(i64),
    Tick,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist(SessionOutcome),
    LogAnswer(AnswerEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ending {
    Completed,
    TimedOut,
}

impl Ending {
    pub fn status(&self) -> SessionStatus {
        match self {
            Ending::Completed => SessionStatus::Completed,
            Ending::TimedOut => SessionStatus::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    name: String,
    deck: Deck,
    current: Question,
    correct_count: u32,
    total_count: u32,
    time_remaining: Option<u32>,
    feedback: Option<String>,
}

impl Session {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_question(&self) -> Question {
        self.current
    }

    pub fn current_answer(&self) -> i64 {
        self.current.answer()
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    /// Feedback for the most recent answer, if any was given.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn remaining_questions(&self) -> usize {
        self.deck.remaining()
    }

    fn finish(&self, ending: Ending) -> Finished {
        Finished {
            name: self.name.clone(),
            correct_count: self.correct_count,
            total_count: self.total_count,
            time_remaining: self.time_remaining,
            ending,
        }
    }
}

/// A session that will accept no more answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub name: String,
    pub correct_count: u32,
    pub total_count: u32,
    pub time_remaining: Option<u32>,
    pub ending: Ending,
}

impl Finished {
    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            name: self.name.clone(),
            status: self.ending.status(),
            score: self.correct_count,
            total_questions: self.total_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running(Session),
    Terminated(Finished),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub phase: Phase,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn quiet(phase: Phase) -> Self {
        Self {
            phase,
            effects: Vec::new(),
        }
    }
}

pub fn wrong_feedback(correct_answer: i64) -> String {
    format!("Wrong. The correct answer was {}. 🙁", correct_answer)
}

/// Trims and parses what the participant typed into the answer box.
pub fn parse_answer(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| DrillError::InvalidAnswer(trimmed.to_string()))
}

pub fn reduce(phase: &Phase, event: Event, rules: &Rules) -> Result<Transition> {
    match event {
        Event::Start { name, deck } => start(name, deck, rules),
        Event::Submit(answer) => match phase {
            Phase::Running(session) => Ok(submit(session.clone(), answer, rules)),
            Phase::Idle => Err(DrillError::NotRunning),
            Phase::Terminated(_) => Err(DrillError::SessionOver),
        },
        Event::Tick => Ok(match phase {
            Phase::Running(session) if session.time_remaining.is_some() => tick(session.clone()),
            other => Transition::quiet(other.clone()),
        }),
        Event::Reset => Ok(Transition::quiet(Phase::Idle)),
    }
}

fn start(name: String, mut deck: Deck, rules: &Rules) -> Result<Transition> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DrillError::EmptyName);
    }
    let current = deck.draw().ok_or(DrillError::EmptyDeck)?;

    info!(participant = name, timed = rules.time_limit_secs.is_some(), "session started");
    Ok(Transition::quiet(Phase::Running(Session {
        name: name.to_string(),
        deck,
        current,
        correct_count: 0,
        total_count: 0,
        time_remaining: rules.time_limit_secs,
        feedback: None,
    })))
}

fn submit(mut session: Session, answer: i64, rules: &Rules) -> Transition {
    let expected = session.current_answer();
    let result = if answer == expected {
        AnswerResult::Correct
    } else {
        AnswerResult::Wrong
    };

    session.total_count += 1;
    if result == AnswerResult::Correct {
        session.correct_count += 1;
        session.feedback = Some(CORRECT_FEEDBACK.to_string());
    } else {
        session.feedback = Some(wrong_feedback(expected));
    }
    debug!(
        participant = %session.name,
        question = %session.current.display(),
        answer,
        correct = result == AnswerResult::Correct,
        "answer submitted"
    );

    let mut effects = Vec::new();
    if rules.log_answers {
        effects.push(Effect::LogAnswer(AnswerEntry {
            name: session.name.clone(),
            question: session.current.display(),
            correct_answer: expected,
            user_answer: answer,
            result,
            score: session.correct_count,
        }));
    }

    let next = if session.total_count as usize >= DECK_SIZE {
        None
    } else {
        session.deck.draw()
    };

    match next {
        Some(question) => {
            session.current = question;
            Transition {
                phase: Phase::Running(session),
                effects,
            }
        }
        None => {
            let finished = session.finish(Ending::Completed);
            info!(
                participant = %finished.name,
                score = finished.correct_count,
                total = finished.total_count,
                "session completed"
            );
            effects.push(Effect::Persist(finished.outcome()));
            Transition {
                phase: Phase::Terminated(finished),
                effects,
            }
        }
    }
}

fn tick(mut session: Session) -> Transition {
    let left = session.time_remaining.unwrap_or(0).saturating_sub(1);
    session.time_remaining = Some(left);
    if left > 0 {
        return Transition::quiet(Phase::Running(session));
    }

    let finished = session.finish(Ending::TimedOut);
    info!(
        participant = %finished.name,
        score = finished.correct_count,
        total = finished.total_count,
        "session timed out"
    );
    let outcome = finished.outcome();
    Transition {
        phase: Phase::Terminated(finished),
        effects: vec![Effect::Persist(outcome)],
    }
}

/// Holds one participant's phase and applies events to it.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    phase: Phase,
    rules: Rules,
}

impl Machine {
    pub fn new(rules: Rules) -> Self {
        Self {
            phase: Phase::Idle,
            rules,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>> {
        let Transition { phase, effects } = reduce(&self.phase, event, &self.rules)?;
        self.phase = phase;
        Ok(effects)
    }

    pub fn start(&mut self, name: impl Into<String>, deck: Deck) -> Result<Vec<Effect>> {
        self.apply(Event::Start {
            name: name.into(),
            deck,
        })
    }

    pub fn submit(&mut self, answer: i64) -> Result<Vec<Effect>> {
        self.apply(Event::Submit(answer))
    }

    pub fn tick(&mut self) -> Result<Vec<Effect>> {
        self.apply(Event::Tick)
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::generate_all_questions;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const UNTIMED: Rules = Rules {
        time_limit_secs: None,
        log_answers: false,
    };

    /// Deck whose first drawn question is 6 × 7.
    fn deck_starting_with_six_by_seven() -> Deck {
        let mut questions: Vec<Question> = generate_all_questions()
            .into_iter()
            .filter(|q| *q != Question::new(6, 7))
            .collect();
        questions.push(Question::new(6, 7));
        Deck::from_questions(questions)
    }

    fn running(machine: &Machine) -> &Session {
        match machine.phase() {
            Phase::Running(s) => s,
            other => panic!("expected running session, got {:?}", other),
        }
    }

    #[test]
    fn empty_name_is_rejected_without_state_change() {
        let mut machine = Machine::new(UNTIMED);
        let err = machine.start("   ", deck_starting_with_six_by_seven()).unwrap_err();
        assert!(matches!(err, DrillError::EmptyName));
        assert_eq!(err.to_string(), "Please enter your name to start.");
        assert_eq!(machine.phase(), &Phase::Idle);
    }

    #[test]
    fn start_trims_name_and_shows_first_question() {
        let mut machine = Machine::new(Rules::default());
        let effects = machine.start("  Alice ", deck_starting_with_six_by_seven()).unwrap();
        assert!(effects.is_empty());

        let session = running(&machine);
        assert_eq!(session.name(), "Alice");
        assert_eq!(session.current_question(), Question::new(6, 7));
        assert_eq!(session.remaining_questions(), 29);
        assert_eq!(session.time_remaining(), Some(300));
        assert_eq!(session.feedback(), None);
    }

    #[test]
    fn correct_then_wrong_answer() {
        let mut machine = Machine::new(UNTIMED);
        machine.start("Alice", deck_starting_with_six_by_seven()).unwrap();

        machine.submit(42).unwrap();
        let session = running(&machine);
        assert_eq!(session.feedback(), Some("Correct! 🎉"));
        assert_eq!((session.correct_count(), session.total_count()), (1, 1));

        let product = session.current_answer();
        machine.submit(999).unwrap();
        let session = running(&machine);
        let expected = format!("Wrong. The correct answer was {}", product);
        assert!(session.feedback().unwrap().contains(&expected));
        assert_eq!((session.correct_count(), session.total_count()), (1, 2));
    }

    #[test]
    fn thirty_answers_complete_the_session_once() {
        let mut machine = Machine::new(UNTIMED);
        machine.start("Bob", deck_starting_with_six_by_seven()).unwrap();

        let mut persisted = Vec::new();
        for i in 0..30 {
            let answer = if i % 2 == 0 {
                running(&machine).current_answer()
            } else {
                -1
            };
            for effect in machine.submit(answer).unwrap() {
                if let Effect::Persist(outcome) = effect {
                    persisted.push(outcome);
                }
            }
        }

        assert_eq!(
            persisted,
            vec![SessionOutcome {
                name: "Bob".into(),
                status: SessionStatus::Completed,
                score: 15,
                total_questions: 30,
            }]
        );
        assert!(matches!(machine.phase(), Phase::Terminated(f) if f.ending == Ending::Completed));
        assert!(matches!(machine.submit(1), Err(DrillError::SessionOver)));
    }

    #[test]
    fn counters_stay_bounded_under_random_play() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut machine = Machine::new(UNTIMED);
            machine.start("Rand", Deck::shuffled(&mut rng)).unwrap();
            for _ in 0..40 {
                let answer = match machine.phase() {
                    Phase::Running(s) if rng.gen_bool(0.5) => s.current_answer(),
                    _ => rng.gen_range(0..100),
                };
                let _ = machine.submit(answer);
                match machine.phase() {
                    Phase::Running(s) => {
                        assert!(s.correct_count() <= s.total_count());
                        assert!(s.total_count() as usize <= DECK_SIZE);
                    }
                    Phase::Terminated(f) => {
                        assert!(f.correct_count <= f.total_count);
                        assert_eq!(f.total_count as usize, DECK_SIZE);
                    }
                    Phase::Idle => panic!("machine fell back to idle"),
                }
            }
        }
    }

    #[test]
    fn countdown_expiry_times_out_and_locks_submissions() {
        let rules = Rules {
            time_limit_secs: Some(3),
            log_answers: false,
        };
        let mut machine = Machine::new(rules);
        machine.start("Carol", deck_starting_with_six_by_seven()).unwrap();
        machine.submit(42).unwrap();

        assert!(machine.tick().unwrap().is_empty());
        assert!(machine.tick().unwrap().is_empty());
        assert_eq!(running(&machine).time_remaining(), Some(1));

        let effects = machine.tick().unwrap();
        assert_eq!(
            effects,
            vec![Effect::Persist(SessionOutcome {
                name: "Carol".into(),
                status: SessionStatus::TimedOut,
                score: 1,
                total_questions: 1,
            })]
        );
        assert!(matches!(machine.submit(56), Err(DrillError::SessionOver)));

        // Later ticks are ignored.
        assert!(machine.tick().unwrap().is_empty());
        match machine.phase() {
            Phase::Terminated(f) => {
                assert_eq!(f.ending, Ending::TimedOut);
                assert_eq!((f.correct_count, f.total_count), (1, 1));
            }
            other => panic!("unexpected phase {:?}", other),
        }
    }

    #[test]
    fn ticks_do_nothing_for_untimed_or_idle_sessions() {
        let mut machine = Machine::new(UNTIMED);
        assert!(machine.tick().unwrap().is_empty());
        assert_eq!(machine.phase(), &Phase::Idle);

        machine.start("Dan", deck_starting_with_six_by_seven()).unwrap();
        let before = machine.phase().clone();
        machine.tick().unwrap();
        assert_eq!(machine.phase(), &before);
    }

    #[test]
    fn submit_without_session_is_rejected() {
        let mut machine = Machine::new(UNTIMED);
        assert!(matches!(machine.submit(42), Err(DrillError::NotRunning)));
    }

    #[test]
    fn answer_log_entries_follow_each_submit() {
        let rules = Rules {
            time_limit_secs: None,
            log_answers: true,
        };
        let mut machine = Machine::new(rules);
        machine.start("Eve", deck_starting_with_six_by_seven()).unwrap();
        let effects = machine.submit(41).unwrap();
        assert_eq!(
            effects,
            vec![Effect::LogAnswer(AnswerEntry {
                name: "Eve".into(),
                question: "6 × 7 =".into(),
                correct_answer: 42,
                user_answer: 41,
                result: AnswerResult::Wrong,
                score: 0,
            })]
        );
    }

    #[test]
    fn reset_and_restart() {
        let mut machine = Machine::new(UNTIMED);
        machine.start("Fay", deck_starting_with_six_by_seven()).unwrap();
        machine.submit(42).unwrap();

        machine.start("Gus", deck_starting_with_six_by_seven()).unwrap();
        let session = running(&machine);
        assert_eq!(session.name(), "Gus");
        assert_eq!(session.total_count(), 0);

        machine.reset();
        assert_eq!(machine.phase(), &Phase::Idle);
    }

    #[test]
    fn parse_answer_accepts_integers_only() {
        assert_eq!(parse_answer(" 56 ").unwrap(), 56);
        assert_eq!(parse_answer("-3").unwrap(), -3);
        assert!(matches!(parse_answer(""), Err(DrillError::InvalidAnswer(_))));
        assert!(matches!(parse_answer("4.5"), Err(DrillError::InvalidAnswer(_))));
    }

    #[test]
    fn empty_deck_cannot_start() {
        let mut machine = Machine::new(UNTIMED);
        let err = machine.start("Hal", Deck::from_questions(Vec::new())).unwrap_err();
        assert!(matches!(err, DrillError::EmptyDeck));
    }
}
