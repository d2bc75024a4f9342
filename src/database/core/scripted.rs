//! Scripted executor used by unit tests
//!
//! Records every statement and answers with queued results, one per call, in
//! order. Once the queue is drained every further statement gets an empty
//! result.

use super::executor::{QueryResult, SqlExecutor};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: RefCell<VecDeque<std::result::Result<QueryResult, String>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Executor whose first answer is the `select current_role()` result
    pub(crate) fn with_current_role(role: &str) -> Self {
        let exec = Self::new();
        exec.push(QueryResult::from_records(&[&[("CURRENT_ROLE()", role)]]));
        exec
    }

    pub(crate) fn push(&self, result: QueryResult) -> &Self {
        self.responses.borrow_mut().push_back(Ok(result));
        self
    }

    pub(crate) fn push_empty(&self) -> &Self {
        self.push(QueryResult::empty())
    }

    pub(crate) fn push_err(&self, message: &str) -> &Self {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl SqlExecutor for ScriptedExecutor {
    fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.calls.borrow_mut().push(sql.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(QueryResult::empty()),
        }
    }
}
