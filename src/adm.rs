//! Preset TOGAF ADM phases.
//!
//! Phase A (Architecture Vision) and Phase B (Business Architecture), each
//! with its team, lead and step graph. The Quality Reviewer is one agent
//! shared by both teams, so its metrics cover both phases.

use std::sync::Arc;

use serde_json::json;

use crate::agent::Agent;
use crate::config::Config;
use crate::core::capability::{AgentRole, Capability, CapabilitySet};
use crate::error::Result;
use crate::orchestration::{Orchestrator, Team};
use crate::provider::CapabilityProvider;
use crate::workflow::WorkflowGraph;
use crate::alog_error;

pub const PHASE_A: &str = "Phase A";
pub const PHASE_B: &str = "Phase B";

/// Builds agents that share one provider and the configured step timeout.
struct AgentFactory<'a> {
    provider: &'a Arc<dyn CapabilityProvider>,
    config: &'a Config,
}

impl AgentFactory<'_> {
    fn agent(
        &self,
        name: &str,
        role: AgentRole,
        capabilities: CapabilitySet,
        description: &str,
    ) -> Arc<Agent> {
        Arc::new(
            Agent::new(name, role, capabilities, Arc::clone(self.provider))
                .with_description(description)
                .with_timeout(self.config.step_timeout()),
        )
    }
}

/// Orchestrator with Phase A and Phase B registered.
pub fn standard_orchestrator(
    provider: Arc<dyn CapabilityProvider>,
    config: &Config,
) -> Result<Orchestrator> {
    if let Err(e) = config.validate() {
        alog_error!("Cannot build ADM phases: {}", e);
        return Err(e);
    }
    let factory = AgentFactory {
        provider: &provider,
        config,
    };
    let quality_reviewer = factory.agent(
        "Quality Reviewer",
        AgentRole::QualityReviewer,
        CapabilitySet::from([
            Capability::ValidateQuality,
            Capability::ValidateCompliance,
            Capability::ValidateStandards,
            Capability::ValidateSecurity,
        ]),
        "Quality assurance across phases",
    );

    let mut orchestrator = Orchestrator::new(config.clone());
    orchestrator.register_phase(
        PHASE_A,
        Arc::new(phase_a_team(&factory, &quality_reviewer)?),
        Some(phase_a_workflow()?),
    )?;
    orchestrator.register_phase(
        PHASE_B,
        Arc::new(phase_b_team(&factory, &quality_reviewer)?),
        Some(phase_b_workflow()?),
    )?;
    Ok(orchestrator)
}

fn phase_a_team(factory: &AgentFactory<'_>, quality_reviewer: &Arc<Agent>) -> Result<Team> {
    let vision_analyst = factory.agent(
        "Vision Analyst",
        AgentRole::VisionAnalyst,
        CapabilitySet::from([
            Capability::AnalyzeRequirements,
            Capability::RecommendPrinciples,
            Capability::DesignArchitecture,
        ]),
        "Creates architecture visions",
    );
    let stakeholder_analyst = factory.agent(
        "Stakeholder Analyst",
        AgentRole::StakeholderAnalyst,
        CapabilitySet::from([
            Capability::AnalyzeStakeholders,
            Capability::CommunicateStakeholders,
            Capability::AnalyzeRequirements,
        ]),
        "Stakeholder analysis",
    );
    let principles_architect = factory.agent(
        "Principles Architect",
        AgentRole::VisionAnalyst,
        CapabilitySet::from([Capability::RecommendPrinciples, Capability::ValidateStandards]),
        "Architecture principles",
    );
    let requirements_engineer = factory.agent(
        "Requirements Engineer",
        AgentRole::RequirementsEngineer,
        CapabilitySet::from([
            Capability::AnalyzeRequirements,
            Capability::ValidateQuality,
            Capability::AnalyzeDependencies,
        ]),
        "Requirements engineering",
    );

    let mut team = Team::new("phase_a_vision", "Architecture Vision Team")
        .with_description("Agents that create the architecture vision");
    team.add_agent(Arc::clone(&vision_analyst));
    team.add_agent(stakeholder_analyst);
    team.add_agent(principles_architect);
    team.add_agent(requirements_engineer);
    team.add_agent(Arc::clone(quality_reviewer));
    team.set_lead(vision_analyst.id())?;
    Ok(team)
}

fn phase_b_team(factory: &AgentFactory<'_>, quality_reviewer: &Arc<Agent>) -> Result<Team> {
    let business_architect = factory.agent(
        "Business Architect",
        AgentRole::BusinessArchitect,
        CapabilitySet::from([
            Capability::DesignArchitecture,
            Capability::AnalyzeGaps,
            Capability::AnalyzeDependencies,
        ]),
        "Business architecture design",
    );

    let mut team = Team::new("phase_b_business", "Business Architecture Team")
        .with_description("Agents that design the business architecture");
    team.add_agent(Arc::clone(&business_architect));
    team.add_agent(Arc::clone(quality_reviewer));
    team.set_lead(business_architect.id())?;
    Ok(team)
}

/// Vision, stakeholders, principles, requirements, then review; a failed
/// review re-captures requirements.
pub fn phase_a_workflow() -> Result<WorkflowGraph> {
    WorkflowGraph::builder(PHASE_A)
        .dispatch_as(
            "define_vision",
            AgentRole::VisionAnalyst,
            CapabilitySet::from([Capability::AnalyzeRequirements, Capability::RecommendPrinciples]),
        )
        .dispatch_as(
            "identify_stakeholders",
            AgentRole::StakeholderAnalyst,
            CapabilitySet::from([
                Capability::AnalyzeStakeholders,
                Capability::CommunicateStakeholders,
            ]),
        )
        .dispatch_as(
            "establish_principles",
            AgentRole::VisionAnalyst,
            CapabilitySet::from([Capability::RecommendPrinciples]),
        )
        .dispatch_as(
            "capture_requirements",
            AgentRole::RequirementsEngineer,
            CapabilitySet::from([Capability::AnalyzeRequirements]),
        )
        .dispatch_as(
            "validate",
            AgentRole::QualityReviewer,
            CapabilitySet::from([Capability::ValidateQuality, Capability::ValidateCompliance]),
        )
        .record("generate_deliverables")
        .entry("define_vision")
        .edge("define_vision", "identify_stakeholders")
        .edge("identify_stakeholders", "establish_principles")
        .edge("establish_principles", "capture_requirements")
        .edge("capture_requirements", "validate")
        .validate(
            "validate",
            &[
                "define_vision",
                "identify_stakeholders",
                "establish_principles",
                "capture_requirements",
            ],
            "generate_deliverables",
            "capture_requirements",
        )
        .end("generate_deliverables")
        .default_artifact("deliverable", json!("Architecture Vision"))
        .build()
}

/// Capabilities, processes, value streams, gaps, then review; a failed
/// review starts over from capability modelling.
pub fn phase_b_workflow() -> Result<WorkflowGraph> {
    WorkflowGraph::builder(PHASE_B)
        .dispatch_as(
            "model_capabilities",
            AgentRole::BusinessArchitect,
            CapabilitySet::from([Capability::DesignArchitecture, Capability::AnalyzeGaps]),
        )
        .dispatch_as(
            "map_processes",
            AgentRole::BusinessArchitect,
            CapabilitySet::from([Capability::DesignArchitecture]),
        )
        .dispatch_as(
            "analyze_value_streams",
            AgentRole::BusinessArchitect,
            CapabilitySet::from([Capability::AnalyzeDependencies]),
        )
        .dispatch_as(
            "perform_gap_analysis",
            AgentRole::BusinessArchitect,
            CapabilitySet::from([Capability::AnalyzeGaps]),
        )
        .dispatch_as(
            "validate",
            AgentRole::QualityReviewer,
            CapabilitySet::from([Capability::ValidateQuality]),
        )
        .record("generate_deliverables")
        .entry("model_capabilities")
        .edge("model_capabilities", "map_processes")
        .edge("map_processes", "analyze_value_streams")
        .edge("analyze_value_streams", "perform_gap_analysis")
        .edge("perform_gap_analysis", "validate")
        .validate(
            "validate",
            &[
                "model_capabilities",
                "map_processes",
                "analyze_value_streams",
                "perform_gap_analysis",
            ],
            "generate_deliverables",
            "model_capabilities",
        )
        .end("generate_deliverables")
        .default_artifact("deliverable", json!("Business Architecture"))
        .build()
}
