use serde::Serialize;

use crate::session::{Ending, Phase};

pub const COMPLETED_NOTICE: &str = "Session Completed! 🎉";
pub const QUIZ_OVER: &str = "No more questions. Quiz over!";
pub const TIME_UP: &str = "Time is up!";
pub const TIME_UP_FEEDBACK: &str = "Time is up! Session over.";

/// Everything a front end needs to draw the drill screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct View {
    pub name_feedback: Option<String>,
    pub question: Option<String>,
    pub feedback: Option<String>,
    pub score: Option<String>,
    pub countdown: Option<String>,
    pub show_name_entry: bool,
    pub show_training: bool,
    pub submit_enabled: bool,
    pub timer_running: bool,
    pub show_new_session: bool,
    /// Set when the transition went through but a row could not be saved.
    pub storage_error: Option<String>,
}

pub fn countdown_text(secs: u32) -> String {
    format!("Time Left: {}:{:02}", secs / 60, secs % 60)
}

pub fn score_text(correct: u32, total: u32) -> String {
    format!("Score: {}/{}", correct, total)
}

pub fn final_score_text(correct: u32, total: u32) -> String {
    format!("Final Score: {}/{}", correct, total)
}

impl View {
    pub fn render(phase: &Phase) -> Self {
        match phase {
            Phase::Idle => View {
                show_name_entry: true,
                ..View::default()
            },
            Phase::Running(session) => View {
                question: Some(session.current_question().display()),
                feedback: session.feedback().map(str::to_string),
                score: (session.total_count() > 0)
                    .then(|| score_text(session.correct_count(), session.total_count())),
                countdown: session.time_remaining().map(countdown_text),
                show_training: true,
                submit_enabled: true,
                timer_running: session.time_remaining().is_some(),
                ..View::default()
            },
            Phase::Terminated(finished) => {
                let final_score = final_score_text(finished.correct_count, finished.total_count);
                match finished.ending {
                    Ending::Completed => View {
                        name_feedback: Some(COMPLETED_NOTICE.to_string()),
                        question: Some(QUIZ_OVER.to_string()),
                        feedback: Some(final_score.clone()),
                        score: Some(final_score),
                        countdown: finished.time_remaining.map(countdown_text),
                        show_name_entry: true,
                        show_new_session: true,
                        ..View::default()
                    },
                    Ending::TimedOut => View {
                        name_feedback: Some(TIME_UP.to_string()),
                        feedback: Some(TIME_UP_FEEDBACK.to_string()),
                        score: Some(final_score),
                        countdown: Some(TIME_UP.to_string()),
                        show_name_entry: true,
                        show_new_session: true,
                        ..View::default()
                    },
                }
            }
        }
    }

    /// Idle screen carrying a validation message, e.g. after a nameless start.
    pub fn rejected(phase: &Phase, message: impl Into<String>) -> Self {
        let mut view = View::render(phase);
        match phase {
            Phase::Running(_) => view.feedback = Some(message.into()),
            _ => view.name_feedback = Some(message.into()),
        }
        view
    }
}
