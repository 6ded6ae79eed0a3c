//! Candidate pools drawn from the item store and the catalogue.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::{MasteryCriteria, PlannerConfig};
use crate::error::StrandResult;
use crate::traits::{CatalogueStore, ItemStore};
use crate::types::{
    Candidate, CandidatePools, CatalogueNode, Item, LearnerProfile, MasteryStatus,
};

/// Composes an [`ItemStore`] and a [`CatalogueStore`] into candidate pools.
pub struct CandidateCatalogue {
    items: Arc<dyn ItemStore>,
    catalogue: Arc<dyn CatalogueStore>,
    planner: PlannerConfig,
    mastery: MasteryCriteria,
}

impl CandidateCatalogue {
    pub fn new(
        items: Arc<dyn ItemStore>,
        catalogue: Arc<dyn CatalogueStore>,
        planner: PlannerConfig,
        mastery: MasteryCriteria,
    ) -> Self {
        Self {
            items,
            catalogue,
            planner,
            mastery,
        }
    }

    /// Frontier, due and mastered pools for a learner at `now`.
    pub fn pools(&self, profile: &LearnerProfile, now: DateTime<Utc>) -> StrandResult<CandidatePools> {
        let nodes = self.catalogue.nodes()?;
        let by_id: HashMap<&str, &CatalogueNode> =
            nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();
        let items = self.items.all_items()?;

        let frontier = self.frontier(profile, &nodes, &items);
        let due = self
            .items
            .due_items(now, self.planner.due_limit)?
            .iter()
            .map(|item| candidate_for(item, &by_id))
            .collect();
        let mastered = self.fluency(profile, &items, &by_id);

        Ok(CandidatePools {
            frontier,
            due,
            mastered,
        })
    }

    /// Nodes at or below the learner's current level that are not yet
    /// learned and whose prerequisites all have a started item.
    fn frontier(
        &self,
        profile: &LearnerProfile,
        nodes: &[CatalogueNode],
        items: &[Item],
    ) -> Vec<Candidate> {
        let mut by_node: HashMap<&str, Vec<&Item>> = HashMap::new();
        for item in items {
            by_node.entry(item.node_id.as_str()).or_default().push(item);
        }
        let started: HashSet<&str> = items
            .iter()
            .filter(|i| i.mastery_status != MasteryStatus::New)
            .map(|i| i.node_id.as_str())
            .collect();

        let mut frontier: Vec<(&CatalogueNode, Candidate)> = nodes
            .iter()
            .filter(|n| n.cefr_level <= profile.current_level)
            .filter_map(|node| {
                let node_items = by_node.get(node.node_id.as_str());
                let unlearned = node_items
                    .map(|its| its.iter().all(|i| i.mastery_status == MasteryStatus::New))
                    .unwrap_or(true);
                if !unlearned {
                    return None;
                }
                if !node
                    .prerequisites
                    .iter()
                    .all(|p| started.contains(p.as_str()))
                {
                    return None;
                }
                let candidate = match node_items.and_then(|its| its.first()) {
                    Some(item) => Candidate {
                        strand: node.effective_strand(),
                        ..Candidate::from_item(item, node.label.clone())
                    },
                    None => Candidate::from_node(node),
                };
                Some((node, candidate))
            })
            .collect();

        frontier.sort_by(|(a, _), (b, _)| {
            (!a.prerequisites.is_empty())
                .cmp(&!b.prerequisites.is_empty())
                .then_with(|| a.cefr_level.cmp(&b.cefr_level))
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        frontier.truncate(self.planner.frontier_limit);
        frontier.into_iter().map(|(_, c)| c).collect()
    }

    /// Mastered items within the learner's secure level for their skill.
    fn fluency(
        &self,
        profile: &LearnerProfile,
        items: &[Item],
        by_id: &HashMap<&str, &CatalogueNode>,
    ) -> Vec<Candidate> {
        let mut eligible: Vec<(&Item, &CatalogueNode)> = items
            .iter()
            .filter(|i| i.mastery_status == MasteryStatus::Mastered)
            .filter(|i| i.stability >= self.mastery.stability_days && i.reps >= self.mastery.min_reps)
            .filter_map(|i| by_id.get(i.node_id.as_str()).map(|n| (i, *n)))
            .filter(|(i, n)| n.cefr_level <= profile.secure_level(i.skill))
            .collect();

        eligible.sort_by(|(a, _), (b, _)| {
            b.stability
                .partial_cmp(&a.stability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.last_reviewed_at.cmp(&b.last_reviewed_at))
        });
        eligible.truncate(self.planner.mastered_limit);
        eligible
            .into_iter()
            .map(|(item, node)| Candidate::from_item(item, node.label.clone()))
            .collect()
    }
}

fn candidate_for(item: &Item, nodes: &HashMap<&str, &CatalogueNode>) -> Candidate {
    let label = nodes
        .get(item.node_id.as_str())
        .map(|n| n.label.clone())
        .unwrap_or_default();
    Candidate::from_item(item, label)
}
