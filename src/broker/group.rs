//! Consumer group membership, partition assignment and positions
//!
//! Positions are kept per group, so every group reads the full topic
//! independently. Inside a group each partition belongs to exactly one
//! member, and a fetch advances the group position, so a record reaches
//! one member of the group.

use std::collections::HashMap;

/// Where a new group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Oldest retained record
    #[default]
    Earliest,
    /// Only records appended after the group is created
    Latest,
}

/// Membership and positions of one group on one topic
#[derive(Debug)]
pub struct GroupState {
    pub group_id: String,
    /// Members in join order
    members: Vec<String>,
    assignments: HashMap<String, Vec<u32>>,
    /// Next offset to deliver, per partition
    positions: Vec<u64>,
    /// Incremented on every rebalance
    generation: u32,
}

impl GroupState {
    /// Create an empty group starting at the given per-partition positions
    pub fn new(group_id: impl Into<String>, start_positions: Vec<u64>) -> Self {
        Self {
            group_id: group_id.into(),
            members: Vec::new(),
            assignments: HashMap::new(),
            positions: start_positions,
            generation: 0,
        }
    }

    /// Add a member and rebalance; returns the new generation
    pub fn join(&mut self, member_id: impl Into<String>) -> u32 {
        let member_id = member_id.into();
        if !self.members.contains(&member_id) {
            self.members.push(member_id);
        }
        self.rebalance();
        self.generation
    }

    /// Remove a member and rebalance. Positions survive an empty group.
    pub fn leave(&mut self, member_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != member_id);
        let removed = self.members.len() != before;
        if removed {
            self.rebalance();
        }
        removed
    }

    /// Round-robin assignment: partition `p` goes to member `p % n`
    fn rebalance(&mut self) {
        self.assignments.clear();
        for member in &self.members {
            self.assignments.insert(member.clone(), Vec::new());
        }

        if !self.members.is_empty() {
            for partition in 0..self.positions.len() as u32 {
                let owner = &self.members[partition as usize % self.members.len()];
                if let Some(owned) = self.assignments.get_mut(owner) {
                    owned.push(partition);
                }
            }
        }

        self.generation += 1;
    }

    /// Partitions owned by a member
    pub fn assignment(&self, member_id: &str) -> &[u32] {
        self.assignments
            .get(member_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Next offset to deliver on a partition
    pub fn position(&self, partition: u32) -> u64 {
        self.positions.get(partition as usize).copied().unwrap_or(0)
    }

    /// Move a partition position forward
    pub fn advance(&mut self, partition: u32, next_offset: u64) {
        if let Some(position) = self.positions.get_mut(partition as usize) {
            *position = (*position).max(next_offset);
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}
