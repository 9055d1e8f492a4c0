//! Shared test doubles and crate-level behaviour tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, ExecutionDecision, Response};
use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::handle::PluginHandle;
use crate::serve::{Plugin, ProcessFailure};


/// Plugin that acts on events whose content contains a keyword.
#[derive(Debug, Clone)]
pub(crate) struct KeywordPlugin {
    name: String,
    priority: i32,
    keyword: String,
    failure: Option<String>,
}

impl KeywordPlugin {
    pub(crate) fn new(name: &str, priority: i32, keyword: &str) -> Self {
        Self {
            name: name.to_owned(),
            priority,
            keyword: keyword.to_owned(),
            failure: None,
        }
    }

    pub(crate) fn describe_name(&self) -> String {
        self.name.clone()
    }

    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_owned());
        self
    }
}

impl Plugin for KeywordPlugin {
    fn describe(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.name.as_str(), "1.0.0", self.priority)
    }

    fn decide(&self, context: &Context) -> ExecutionDecision {
        if context.event().content().contains(self.keyword.as_str()) {
            ExecutionDecision::accept(format!("saw '{}'", self.keyword))
        } else {
            ExecutionDecision::decline("keyword absent")
        }
    }

    fn process(&self, mut context: Context) -> Result<Context, ProcessFailure> {
        if let Some(message) = &self.failure {
            return Err(ProcessFailure::new(message.as_str()));
        }
        context.set(format!("{}_ran", self.name), true);
        context.push_response(Response::new(self.name.as_str(), "status", "ran"));
        Ok(context)
    }
}

/// Records every call made to scripted handles, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub(crate) fn record(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries for one operation, with the operation prefix removed.
    pub(crate) fn calls(&self, op: &str) -> Vec<String> {
        let prefix = format!("{op}:");
        self.entries()
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix.as_str()).map(str::to_owned))
            .collect()
    }
}

/// What a scripted handle does when asked to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    /// Declines every decision.
    Decline,
    /// Publishes `<name>=true` and a response.
    Publish,
    /// Fails with a remote error.
    Fail,
    /// Returns a context with every property removed.
    Shrink,
    /// Panics inside `process`.
    Panic,
}

/// Handle whose behaviour is fixed at construction and whose calls are logged.
pub(crate) struct ScriptedHandle {
    name: String,
    descriptor: PluginDescriptor,
    behaviour: Behaviour,
    log: CallLog,
}

impl ScriptedHandle {
    pub(crate) fn new(name: &str, priority: i32, behaviour: Behaviour, log: &CallLog) -> Self {
        Self {
            name: name.to_owned(),
            descriptor: PluginDescriptor::new(name, "1.0.0", priority),
            behaviour,
            log: log.clone(),
        }
    }

    pub(crate) fn with_descriptor(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn PluginHandle> {
        Box::new(self)
    }
}

impl PluginHandle for ScriptedHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, _context: &Context) -> ExecutionDecision {
        self.log.record(format!("decide:{}", self.name));
        if self.behaviour == Behaviour::Decline {
            ExecutionDecision::decline("scripted decline")
        } else {
            ExecutionDecision::accept("scripted accept")
        }
    }

    fn process(&mut self, context: &Context) -> Result<Context, PluginError> {
        self.log.record(format!("process:{}", self.name));
        match self.behaviour {
            Behaviour::Decline | Behaviour::Publish => {
                let mut next = context.clone();
                next.set(self.name.as_str(), true);
                next.push_response(Response::new(self.name.as_str(), "status", "published"));
                Ok(next)
            }
            Behaviour::Fail => Err(PluginError::Remote {
                name: self.name.clone(),
                message: String::from("scripted failure"),
            }),
            Behaviour::Shrink => Ok(Context::new(context.event().clone())),
            Behaviour::Panic => panic!("scripted panic in {}", self.name),
        }
    }

    fn describe(&mut self) -> PluginDescriptor {
        self.descriptor.clone()
    }

    fn teardown(&mut self) {
        self.log.record(format!("teardown:{}", self.name));
    }
}
