use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use fgswarm_core::error::{FgError, Result};

use crate::agent::SwarmAgent;
use crate::context::SharedContext;

/// Where control goes when a handoff rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "agent", rename_all = "snake_case")]
pub enum HandoffTarget {
    /// Activate the named agent.
    Agent(String),
    /// End the run.
    Terminate,
    /// Return to the agent that was active before the current one.
    Revert,
    /// Keep the current agent active.
    Stay,
}

impl HandoffTarget {
    pub fn agent(name: impl Into<String>) -> Self {
        Self::Agent(name.into())
    }
}

/// When a handoff rule applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandoffCondition {
    /// Fires once the agent finishes its work.
    #[default]
    AfterWork,
    /// Fires if a simple expression over the shared context holds.
    /// Supported: `key == "value"`, `key != "value"`, `key contains "substr"`,
    /// `key is_set`.
    ContextExpr { expr: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRule {
    #[serde(default)]
    pub condition: HandoffCondition,
    pub target: HandoffTarget,
}

impl HandoffRule {
    pub fn after_work(target: HandoffTarget) -> Self {
        Self {
            condition: HandoffCondition::AfterWork,
            target,
        }
    }

    pub fn on_context(expr: impl Into<String>, target: HandoffTarget) -> Self {
        Self {
            condition: HandoffCondition::ContextExpr { expr: expr.into() },
            target,
        }
    }

    fn holds(&self, ctx: &SharedContext) -> bool {
        match &self.condition {
            HandoffCondition::AfterWork => true,
            HandoffCondition::ContextExpr { expr } => evaluate_condition(expr, ctx),
        }
    }
}

/// Resolved outcome of a handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    Terminated,
}

/// Per-agent ordered handoff rules plus the swarm-wide default.
#[derive(Debug, Clone)]
pub struct HandoffTable {
    rules: HashMap<String, Vec<HandoffRule>>,
    default: HandoffTarget,
}

impl Default for HandoffTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoffTable {
    /// Empty table whose default is to terminate.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            default: HandoffTarget::Terminate,
        }
    }

    pub fn with_default(mut self, default: HandoffTarget) -> Self {
        self.default = default;
        self
    }

    /// Replace the rules registered for `agent`.
    pub fn register(&mut self, agent: impl Into<String>, rules: Vec<HandoffRule>) -> &mut Self {
        self.rules.insert(agent.into(), rules);
        self
    }

    pub fn rules_for(&self, agent: &str) -> &[HandoffRule] {
        self.rules.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Linear `AfterWork` chain through `names`, the last one terminating.
    pub fn chain<S: AsRef<str>>(names: &[S]) -> Self {
        let mut table = Self::new();
        for (i, name) in names.iter().enumerate() {
            let target = match names.get(i + 1) {
                Some(next) => HandoffTarget::agent(next.as_ref()),
                None => HandoffTarget::Terminate,
            };
            table.register(name.as_ref(), vec![HandoffRule::after_work(target)]);
        }
        table
    }

    /// Every agent named by the table must exist in `agents`.
    pub fn validate(&self, agents: &[SwarmAgent]) -> Result<()> {
        let known = |name: &str| agents.iter().any(|a| a.name() == name);
        let targets = self
            .rules
            .values()
            .flatten()
            .map(|r| &r.target)
            .chain(std::iter::once(&self.default));

        for name in self.rules.keys() {
            if !known(name) {
                return Err(FgError::UnknownAgent(name.clone()));
            }
        }
        for target in targets {
            if let HandoffTarget::Agent(name) = target {
                if !known(name) {
                    return Err(FgError::UnknownAgent(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Target of the first rule for `current` whose condition holds, else the default.
    pub fn next(&self, current: &str, ctx: &SharedContext) -> HandoffTarget {
        self.rules_for(current)
            .iter()
            .find(|rule| rule.holds(ctx))
            .map(|rule| rule.target.clone())
            .unwrap_or_else(|| self.default.clone())
    }

    /// Resolve the handoff out of `current` into a concrete transition.
    pub fn resolve(
        &self,
        current: &str,
        previous: Option<&str>,
        ctx: &SharedContext,
    ) -> Transition {
        match self.next(current, ctx) {
            HandoffTarget::Agent(name) => Transition::Next(name),
            HandoffTarget::Stay => Transition::Next(current.to_string()),
            HandoffTarget::Revert => match previous {
                Some(prev) => Transition::Next(prev.to_string()),
                None => {
                    warn!(agent = %current, "Revert with no previous agent; terminating");
                    Transition::Terminated
                }
            },
            HandoffTarget::Terminate => Transition::Terminated,
        }
    }
}

/// Evaluate a simple conditional expression against the shared context.
///
/// Returns `false` for unparseable expressions.
pub fn evaluate_condition(expr: &str, ctx: &SharedContext) -> bool {
    let expr = expr.trim();

    if let Some(key) = expr.strip_suffix("is_set") {
        let key = key.trim();
        return !key.is_empty() && !key.contains(char::is_whitespace) && ctx.is_set(key);
    }

    if let Some((key, substr)) = parse_operator(expr, "contains") {
        return ctx.is_set(key) && ctx.get(key).contains(substr);
    }

    if let Some((key, value)) = parse_operator(expr, "!=") {
        return ctx.is_set(key) && ctx.get(key) != value;
    }

    if let Some((key, value)) = parse_operator(expr, "==") {
        return ctx.is_set(key) && ctx.get(key) == value;
    }

    false
}

/// Parse `key OP "value"`, returning (key, value).
fn parse_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let (key, val) = expr.split_once(op)?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, val.trim().trim_matches('"')))
}
