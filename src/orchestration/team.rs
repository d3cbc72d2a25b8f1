//! Teams: named groups of agents that route tasks to their best-fit member.
//!
//! Collaboration is one relation owned by the team, a set of unordered
//! agent pairs, rather than back-references stored on each agent.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentId, AgentMetrics};
use crate::core::capability::CapabilitySet;
use crate::core::task::Task;
use crate::error::{Error, Result};
use crate::provider::TaskOutput;
use crate::{alog_debug, alog_warn};

/// Aggregate and per-agent performance for a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPerformance {
    pub team_id: String,
    pub team_name: String,
    pub team_size: usize,
    pub team_lead: Option<String>,
    pub total_capabilities: usize,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    pub success_rate: f64,
    pub agents: Vec<AgentMetrics>,
}

#[derive(Debug)]
pub struct Team {
    id: String,
    name: String,
    description: String,
    /// Members in insertion order; routing ties resolve to the earliest.
    agents: Vec<Arc<Agent>>,
    lead: Option<AgentId>,
    /// Unordered pairs, stored with the smaller id first.
    collaborations: BTreeSet<(AgentId, AgentId)>,
}

impl Team {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            agents: Vec::new(),
            lead: None,
            collaborations: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.agents.iter().any(|a| a.id() == agent_id)
    }

    pub fn lead(&self) -> Option<&Arc<Agent>> {
        let lead = self.lead?;
        self.agents.iter().find(|a| a.id() == lead)
    }

    /// Add a member. Adding an existing member changes nothing.
    pub fn add_agent(&mut self, agent: Arc<Agent>) {
        if self.contains(agent.id()) {
            return;
        }
        for member in &self.agents {
            self.collaborations.insert(pair(member.id(), agent.id()));
        }
        self.agents.push(agent);
    }

    pub fn set_lead(&mut self, agent_id: AgentId) -> Result<()> {
        if !self.contains(agent_id) {
            return Err(Error::NotMember {
                agent: agent_id,
                team: self.name.clone(),
            });
        }
        self.lead = Some(agent_id);
        Ok(())
    }

    /// Members that collaborate with `agent_id`, in membership order.
    pub fn collaborators_of(&self, agent_id: AgentId) -> Vec<Arc<Agent>> {
        self.agents
            .iter()
            .filter(|a| {
                a.id() != agent_id && self.collaborations.contains(&pair(a.id(), agent_id))
            })
            .cloned()
            .collect()
    }

    pub fn collaboration_count(&self) -> usize {
        self.collaborations.len()
    }

    /// Pick the best capable member and assign the task to it.
    ///
    /// The lead wins whenever it is capable. Otherwise the capable member
    /// with the highest success rate is chosen, earliest member on ties.
    pub fn route_task(&self, task: &mut Task) -> Result<Arc<Agent>> {
        let selected = self.select(task)?;
        alog_debug!(
            "Team {} routed {} to {} (success rate {:.2})",
            self.name,
            task.name,
            selected.name(),
            selected.success_rate()
        );
        selected.assign(task)?;
        Ok(selected)
    }

    /// Route, run and settle one task.
    ///
    /// Whatever the provider returns, the chosen agent's bookkeeping is
    /// updated before this returns: success through `complete_task`, any
    /// error through `fail_task`.
    pub async fn execute_task(
        &self,
        task: &mut Task,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Arc<Agent>, TaskOutput)> {
        let agent = self.route_task(task)?;
        match agent.execute_task(task, cancel).await {
            Ok(output) => {
                agent.complete_task(task, &output)?;
                Ok((agent, output))
            }
            Err(e) => {
                if let Err(inner) = agent.fail_task(task, &e) {
                    alog_warn!("Could not record failure of {}: {}", task.name, inner);
                }
                Err(e)
            }
        }
    }

    fn select(&self, task: &Task) -> Result<Arc<Agent>> {
        let candidates: Vec<&Arc<Agent>> =
            self.agents.iter().filter(|a| a.can_perform(task)).collect();

        if candidates.is_empty() {
            return Err(Error::NoCapableAgent {
                team: self.name.clone(),
                task: task.name.clone(),
            });
        }

        if let Some(lead) = self.lead {
            if let Some(&agent) = candidates.iter().find(|a| a.id() == lead) {
                return Ok(Arc::clone(agent));
            }
        }

        let mut best = candidates[0];
        let mut best_rate = best.success_rate();
        for &agent in &candidates[1..] {
            let rate = agent.success_rate();
            if rate > best_rate {
                best = agent;
                best_rate = rate;
            }
        }
        Ok(Arc::clone(best))
    }

    pub fn get_team_capabilities(&self) -> CapabilitySet {
        self.agents
            .iter()
            .fold(CapabilitySet::new(), |acc, a| acc.union(a.capabilities()))
    }

    pub fn get_team_performance(&self) -> TeamPerformance {
        let agents: Vec<AgentMetrics> = self
            .agents
            .iter()
            .map(|a| a.get_performance_metrics())
            .collect();
        let tasks_completed = agents.iter().map(|m| m.tasks_completed).sum::<u32>();
        let tasks_failed = agents.iter().map(|m| m.tasks_failed).sum::<u32>();

        TeamPerformance {
            team_id: self.id.clone(),
            team_name: self.name.clone(),
            team_size: self.agents.len(),
            team_lead: self.lead().map(|a| a.name().to_string()),
            total_capabilities: self.get_team_capabilities().len(),
            tasks_completed,
            tasks_failed,
            success_rate: tasks_completed as f64 / (tasks_completed + tasks_failed).max(1) as f64,
            agents,
        }
    }
}

fn pair(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
