//! Capabilities and roles.
//!
//! A capability is an atomic skill a task requires and an agent may
//! possess. Capabilities form a closed set so routing never compares
//! free-form strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named skill tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // Analysis
    AnalyzeRequirements,
    AnalyzeStakeholders,
    AnalyzeGaps,
    AnalyzeRisks,
    AnalyzeCosts,
    AnalyzeDependencies,

    // Design
    DesignArchitecture,
    DesignSolutions,
    DesignIntegrations,
    DesignMigrations,

    // Validation
    ValidateCompliance,
    ValidateStandards,
    ValidateQuality,
    ValidateSecurity,

    // Recommendation
    RecommendPrinciples,
    RecommendPatterns,
    RecommendTechnologies,
    RecommendImprovements,

    // Collaboration
    CoordinateTeams,
    FacilitateDecisions,
    ManageKnowledge,
    CommunicateStakeholders,
}

impl Capability {
    pub const ALL: [Capability; 22] = [
        Capability::AnalyzeRequirements,
        Capability::AnalyzeStakeholders,
        Capability::AnalyzeGaps,
        Capability::AnalyzeRisks,
        Capability::AnalyzeCosts,
        Capability::AnalyzeDependencies,
        Capability::DesignArchitecture,
        Capability::DesignSolutions,
        Capability::DesignIntegrations,
        Capability::DesignMigrations,
        Capability::ValidateCompliance,
        Capability::ValidateStandards,
        Capability::ValidateQuality,
        Capability::ValidateSecurity,
        Capability::RecommendPrinciples,
        Capability::RecommendPatterns,
        Capability::RecommendTechnologies,
        Capability::RecommendImprovements,
        Capability::CoordinateTeams,
        Capability::FacilitateDecisions,
        Capability::ManageKnowledge,
        Capability::CommunicateStakeholders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AnalyzeRequirements => "analyze_requirements",
            Capability::AnalyzeStakeholders => "analyze_stakeholders",
            Capability::AnalyzeGaps => "analyze_gaps",
            Capability::AnalyzeRisks => "analyze_risks",
            Capability::AnalyzeCosts => "analyze_costs",
            Capability::AnalyzeDependencies => "analyze_dependencies",
            Capability::DesignArchitecture => "design_architecture",
            Capability::DesignSolutions => "design_solutions",
            Capability::DesignIntegrations => "design_integrations",
            Capability::DesignMigrations => "design_migrations",
            Capability::ValidateCompliance => "validate_compliance",
            Capability::ValidateStandards => "validate_standards",
            Capability::ValidateQuality => "validate_quality",
            Capability::ValidateSecurity => "validate_security",
            Capability::RecommendPrinciples => "recommend_principles",
            Capability::RecommendPatterns => "recommend_patterns",
            Capability::RecommendTechnologies => "recommend_technologies",
            Capability::RecommendImprovements => "recommend_improvements",
            Capability::CoordinateTeams => "coordinate_teams",
            Capability::FacilitateDecisions => "facilitate_decisions",
            Capability::ManageKnowledge => "manage_knowledge",
            Capability::CommunicateStakeholders => "communicate_stakeholders",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("unknown capability: {}", s)))
    }
}

/// Role an agent plays in the architecture process.
///
/// Roles are descriptive only; routing is decided by capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    VisionAnalyst,
    BusinessArchitect,
    DataArchitect,
    ApplicationArchitect,
    TechnologyArchitect,
    SolutionArchitect,
    MigrationPlanner,
    GovernanceOfficer,
    ChangeManager,
    StakeholderAnalyst,
    RequirementsEngineer,
    ComplianceChecker,
    RiskAssessor,
    CostAnalyst,
    IntegrationSpecialist,
    SecurityArchitect,
    TeamCoordinator,
    DecisionFacilitator,
    KnowledgeCurator,
    QualityReviewer,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentRole::VisionAnalyst => "vision_analyst",
            AgentRole::BusinessArchitect => "business_architect",
            AgentRole::DataArchitect => "data_architect",
            AgentRole::ApplicationArchitect => "application_architect",
            AgentRole::TechnologyArchitect => "technology_architect",
            AgentRole::SolutionArchitect => "solution_architect",
            AgentRole::MigrationPlanner => "migration_planner",
            AgentRole::GovernanceOfficer => "governance_officer",
            AgentRole::ChangeManager => "change_manager",
            AgentRole::StakeholderAnalyst => "stakeholder_analyst",
            AgentRole::RequirementsEngineer => "requirements_engineer",
            AgentRole::ComplianceChecker => "compliance_checker",
            AgentRole::RiskAssessor => "risk_assessor",
            AgentRole::CostAnalyst => "cost_analyst",
            AgentRole::IntegrationSpecialist => "integration_specialist",
            AgentRole::SecurityArchitect => "security_architect",
            AgentRole::TeamCoordinator => "team_coordinator",
            AgentRole::DecisionFacilitator => "decision_facilitator",
            AgentRole::KnowledgeCurator => "knowledge_curator",
            AgentRole::QualityReviewer => "quality_reviewer",
        };
        f.write_str(s)
    }
}

/// An unordered, membership-unique set of capabilities.
///
/// Backed by a `BTreeSet` so iteration and display order are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// True iff every capability in `self` is also in `other`.
    pub fn is_subset(&self, other: &CapabilitySet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Capabilities in `self` that `other` lacks.
    pub fn missing_from(&self, other: &CapabilitySet) -> CapabilitySet {
        Self(self.0.difference(&other.0).copied().collect())
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(caps: [Capability; N]) -> Self {
        caps.into_iter().collect()
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|c| c.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
