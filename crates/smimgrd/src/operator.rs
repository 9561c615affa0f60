//! Operator interaction capability.
//!
//! The reconciler never reads the terminal directly; it asks an
//! [`Operator`] to confirm or to answer a selection prompt.

use std::collections::VecDeque;
use std::sync::Mutex;

use dialoguer::{Confirm, Input};
use smi_cfgmgr_common::{SmiError, SmiResult};

/// Synchronous prompts the reconciler may issue.
pub trait Operator: Send + Sync {
    /// Asks a yes/no question.
    fn confirm(&self, prompt: &str) -> SmiResult<bool>;

    /// Asks for a free-form selection answer.
    fn select(&self, prompt: &str) -> SmiResult<String>;

    /// Shows information the operator needs to answer the next prompt.
    fn notify(&self, _message: &str) {}
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalOperator {
    assume_yes: bool,
}

impl TerminalOperator {
    /// `assume_yes` answers every confirmation with yes without asking.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, prompt: &str) -> SmiResult<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| SmiError::interaction(e.to_string()))
    }

    fn select(&self, prompt: &str) -> SmiResult<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| SmiError::interaction(e.to_string()))
    }

    fn notify(&self, message: &str) {
        println!("{}", message);
    }
}

/// Answers prompts from a fixed script.
///
/// Running out of answers declines confirmations and gives an empty
/// selection.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    confirmations: Mutex<VecDeque<bool>>,
    selections: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an answer for the next confirmation.
    pub fn confirming(self, answer: bool) -> Self {
        self.confirmations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer);
        self
    }

    /// Queues an answer for the next selection prompt.
    pub fn selecting(self, answer: impl Into<String>) -> Self {
        self.selections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer.into());
        self
    }

    /// Every prompt and notification shown, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, prompt: &str) {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, prompt: &str) -> SmiResult<bool> {
        self.record(prompt);
        Ok(self
            .confirmations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(false))
    }

    fn select(&self, prompt: &str) -> SmiResult<String> {
        self.record(prompt);
        Ok(self
            .selections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default())
    }

    fn notify(&self, message: &str) {
        self.record(message);
    }
}
