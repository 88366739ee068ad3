//! Screen state of the terminal front-end.
//!
//! Landing -> Form -> Generating -> Complete. A failed run goes back to the form
//! with an error banner; a cancelled run goes back to the landing screen.

use serde_json::Value;
use thiserror::Error;

use crate::generation::sink::GenerationStep;

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Landing,
    Form {
        /// Banner shown above the form after a failed run.
        error: Option<String>,
    },
    Generating {
        step: Option<GenerationStep>,
        progress: u8,
    },
    Complete {
        result: Value,
    },
}

impl Screen {
    fn name(&self) -> &'static str {
        match self {
            Screen::Landing => "landing",
            Screen::Form { .. } => "form",
            Screen::Generating { .. } => "generating",
            Screen::Complete { .. } => "complete",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("cannot {action} from the {from} screen")]
pub struct InvalidTransition {
    pub action: &'static str,
    pub from: &'static str,
}

#[derive(Debug)]
pub struct Session {
    screen: Screen,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            screen: Screen::Landing,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Landing -> Form.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.expect("start", |s| matches!(s, Screen::Landing))?;
        self.screen = Screen::Form { error: None };
        Ok(())
    }

    /// Form -> Generating. Clears any error banner.
    pub fn submit(&mut self) -> Result<(), InvalidTransition> {
        self.expect("submit", |s| matches!(s, Screen::Form { .. }))?;
        self.screen = Screen::Generating {
            step: None,
            progress: 0,
        };
        Ok(())
    }

    /// Records a progress report. Progress never goes backwards.
    pub fn progress(&mut self, new_step: Option<GenerationStep>, new_progress: u8) {
        if let Screen::Generating { step, progress } = &mut self.screen {
            if new_step.is_some() {
                *step = new_step;
            }
            *progress = (*progress).max(new_progress.min(100));
        }
    }

    /// Generating -> Complete.
    pub fn complete(&mut self, result: Value) -> Result<(), InvalidTransition> {
        self.expect("complete", |s| matches!(s, Screen::Generating { .. }))?;
        self.screen = Screen::Complete { result };
        Ok(())
    }

    /// Generating -> Form with an error banner.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.expect("fail", |s| matches!(s, Screen::Generating { .. }))?;
        self.screen = Screen::Form {
            error: Some(message.into()),
        };
        Ok(())
    }

    /// Generating -> Landing.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        self.expect("cancel", |s| matches!(s, Screen::Generating { .. }))?;
        self.screen = Screen::Landing;
        Ok(())
    }

    /// Complete -> Landing, dropping the result.
    pub fn generate_new(&mut self) -> Result<(), InvalidTransition> {
        self.expect("start over", |s| matches!(s, Screen::Complete { .. }))?;
        self.screen = Screen::Landing;
        Ok(())
    }

    fn expect(
        &self,
        action: &'static str,
        allowed: impl Fn(&Screen) -> bool,
    ) -> Result<(), InvalidTransition> {
        if allowed(&self.screen) {
            Ok(())
        } else {
            Err(InvalidTransition {
                action,
                from: self.screen.name(),
            })
        }
    }
}
