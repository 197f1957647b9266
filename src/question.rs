use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const FACTORS: [u8; 3] = [6, 7, 8];
pub const MAX_MULTIPLE: u8 = 10;
pub const DECK_SIZE: usize = FACTORS.len() * MAX_MULTIPLE as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    pub a: u8,
    pub b: u8,
}

impl Question {
    pub fn new(a: u8, b: u8) -> Self {
        Self { a, b }
    }

    pub fn answer(&self) -> i64 {
        i64::from(self.a) * i64::from(self.b)
    }

    pub fn display(&self) -> String {
        format!("{} × {} =", self.a, self.b)
    }
}

/// Every question of a session, one per (factor, multiple) pair.
pub fn generate_all_questions() -> Vec<Question> {
    let mut questions = Vec::with_capacity(DECK_SIZE);
    for a in FACTORS {
        for b in 1..=MAX_MULTIPLE {
            questions.push(Question::new(a, b));
        }
    }
    questions
}

/// Remaining questions of a session. Questions are drawn from the back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    questions: Vec<Question>,
}

impl Deck {
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut questions = generate_all_questions();
        questions.shuffle(rng);
        Self { questions }
    }

    /// Deck with a fixed order; the last element is drawn first.
    pub fn from_questions(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn draw(&mut self) -> Option<Question> {
        self.questions.pop()
    }

    pub fn remaining(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
