//! Bulk-assignment rule engine.
//!
//! Translates an administrator's reviewer selection plus a relationship
//! choice into a validated reviewee candidate pool, and expands the final
//! selection into the assignment records to insert. Pure functions over
//! in-memory snapshots; the web layer owns all I/O.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Relationship label used for self reviews.
pub const SELF_LABEL: &str = "Self";
/// Relationship label used for the default peer choice.
pub const PEER_LABEL: &str = "Peer to Peer";

/// The administrator's relationship selection in the bulk wizard.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RelationshipChoice {
    #[serde(rename = "self")]
    SelfReview,
    Peer,
    Rule { id: Uuid },
}

impl Default for RelationshipChoice {
    fn default() -> Self {
        RelationshipChoice::Peer
    }
}

/// Roster snapshot entry: a user as the engine sees them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterUser {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

/// A named relationship rule with its role references already resolved to
/// role names. `reviewee_role == None` is the self sentinel.
#[derive(Clone, Debug)]
pub struct RuleSpec {
    pub id: Uuid,
    pub label: String,
    pub reviewer_role: String,
    pub reviewee_role: Option<String>,
}

/// An assignment already present in the period, as far as exclusion cares.
#[derive(Clone, Debug)]
pub struct ExistingAssignment {
    pub evaluator_id: Uuid,
    pub evaluatee_id: Uuid,
    pub relationship: String,
}

/// One record the expansion step wants inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAssignment {
    pub evaluator_id: Uuid,
    pub evaluator_name: String,
    pub evaluatee_id: Uuid,
    pub evaluatee_name: String,
    pub relationship: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("no reviewers selected")]
    NoReviewers,
    #[error("no reviewees selected")]
    NoReviewees,
    #[error("selected reviewers span more than one role")]
    MixedRoles,
    #[error("relationship rule no longer exists")]
    UnknownRule,
    #[error("reviewer {0} is not on the roster")]
    UnknownReviewer(Uuid),
    #[error("reviewer {0} does not hold the rule's reviewer role")]
    ReviewerRoleMismatch(Uuid),
    #[error("reviewee {0} is not in the candidate pool")]
    InvalidReviewee(Uuid),
}

fn find_user<'a>(roster: &'a [RosterUser], id: Uuid) -> Result<&'a RosterUser, RuleError> {
    roster
        .iter()
        .find(|u| u.id == id)
        .ok_or(RuleError::UnknownReviewer(id))
}

/// The single role every selected reviewer holds, or `MixedRoles`.
fn shared_role<'a>(
    reviewer_ids: &[Uuid],
    roster: &'a [RosterUser],
) -> Result<&'a str, RuleError> {
    let mut shared: Option<&str> = None;
    for &id in reviewer_ids {
        let user = find_user(roster, id)?;
        match shared {
            None => shared = Some(&user.role),
            Some(role) if role != user.role => return Err(RuleError::MixedRoles),
            Some(_) => {}
        }
    }
    shared.ok_or(RuleError::NoReviewers)
}

fn find_rule<'a>(rules: &'a [RuleSpec], id: Uuid) -> Result<&'a RuleSpec, RuleError> {
    rules.iter().find(|r| r.id == id).ok_or(RuleError::UnknownRule)
}

/// The relationship label a choice records on its assignments.
pub fn choice_label<'a>(
    choice: RelationshipChoice,
    rules: &'a [RuleSpec],
) -> Result<&'a str, RuleError> {
    match choice {
        RelationshipChoice::SelfReview => Ok(SELF_LABEL),
        RelationshipChoice::Peer => Ok(PEER_LABEL),
        RelationshipChoice::Rule { id } => find_rule(rules, id).map(|r| r.label.as_str()),
    }
}

/// Is the current choice still valid for this reviewer set and rule list?
fn choice_is_valid(
    choice: RelationshipChoice,
    reviewer_ids: &[Uuid],
    roster: &[RosterUser],
    rules: &[RuleSpec],
) -> bool {
    match choice {
        // Self never depends on roles.
        RelationshipChoice::SelfReview => true,
        RelationshipChoice::Peer => shared_role(reviewer_ids, roster).is_ok(),
        RelationshipChoice::Rule { id } => {
            let Ok(rule) = find_rule(rules, id) else {
                return false;
            };
            reviewer_ids.iter().all(|&rid| {
                find_user(roster, rid).is_ok_and(|u| u.role == rule.reviewer_role)
            })
        }
    }
}

/// Re-validates the current choice against a (possibly changed) reviewer set
/// and rule list. An invalid choice resets to the default peer relationship;
/// the caller must then clear its reviewee selection.
pub fn effective_choice(
    choice: RelationshipChoice,
    reviewer_ids: &[Uuid],
    roster: &[RosterUser],
    rules: &[RuleSpec],
) -> (RelationshipChoice, bool) {
    if reviewer_ids.is_empty() || choice_is_valid(choice, reviewer_ids, roster, rules) {
        (choice, false)
    } else {
        (RelationshipChoice::Peer, true)
    }
}

fn already_assigned(
    existing: &[ExistingAssignment],
    reviewer_ids: &[Uuid],
    candidate: Uuid,
    label: &str,
) -> bool {
    existing.iter().any(|a| {
        a.relationship == label
            && a.evaluatee_id == candidate
            && reviewer_ids.contains(&a.evaluator_id)
    })
}

fn has_self_assignment(existing: &[ExistingAssignment], reviewer: Uuid, label: &str) -> bool {
    existing
        .iter()
        .any(|a| a.relationship == label && a.evaluator_id == reviewer && a.evaluatee_id == reviewer)
}

fn pool_for_role(
    role: &str,
    label: &str,
    reviewer_ids: &[Uuid],
    roster: &[RosterUser],
    existing: &[ExistingAssignment],
) -> Vec<RosterUser> {
    roster
        .iter()
        .filter(|u| u.role == role)
        .filter(|u| !reviewer_ids.contains(&u.id))
        .filter(|u| !already_assigned(existing, reviewer_ids, u.id, label))
        .cloned()
        .collect()
}

/// The validated reviewee candidate pool for a choice.
///
/// For self-style choices this is the reviewers themselves minus those who
/// already have a self assignment under the label; the duplicate exclusion
/// everywhere is advisory only, computed from the assignment snapshot passed
/// in, with no guarantee against concurrent writers.
pub fn candidate_reviewees(
    choice: RelationshipChoice,
    reviewer_ids: &[Uuid],
    roster: &[RosterUser],
    rules: &[RuleSpec],
    existing: &[ExistingAssignment],
) -> Result<Vec<RosterUser>, RuleError> {
    if reviewer_ids.is_empty() {
        return Err(RuleError::NoReviewers);
    }
    match choice {
        RelationshipChoice::SelfReview => self_pool(reviewer_ids, roster, existing, SELF_LABEL),
        RelationshipChoice::Peer => {
            let role = shared_role(reviewer_ids, roster)?.to_string();
            Ok(pool_for_role(&role, PEER_LABEL, reviewer_ids, roster, existing))
        }
        RelationshipChoice::Rule { id } => {
            let rule = find_rule(rules, id)?;
            for &rid in reviewer_ids {
                let user = find_user(roster, rid)?;
                if user.role != rule.reviewer_role {
                    return Err(RuleError::ReviewerRoleMismatch(rid));
                }
            }
            match &rule.reviewee_role {
                None => self_pool(reviewer_ids, roster, existing, &rule.label),
                Some(role) => Ok(pool_for_role(role, &rule.label, reviewer_ids, roster, existing)),
            }
        }
    }
}

fn self_pool(
    reviewer_ids: &[Uuid],
    roster: &[RosterUser],
    existing: &[ExistingAssignment],
    label: &str,
) -> Result<Vec<RosterUser>, RuleError> {
    let mut pool = Vec::new();
    for &rid in reviewer_ids {
        let user = find_user(roster, rid)?;
        if !has_self_assignment(existing, rid, label) {
            pool.push(user.clone());
        }
    }
    Ok(pool)
}

/// Expands the final selection into the full set of records to insert.
///
/// Non-self choices produce the Cartesian product of reviewers and selected
/// reviewees; self choices produce one record per not-yet-assigned reviewer
/// and ignore the reviewee selection. Empty reviewer or reviewee sets block
/// submission.
pub fn expand(
    choice: RelationshipChoice,
    reviewer_ids: &[Uuid],
    reviewee_ids: &[Uuid],
    roster: &[RosterUser],
    rules: &[RuleSpec],
    existing: &[ExistingAssignment],
) -> Result<Vec<NewAssignment>, RuleError> {
    let pool = candidate_reviewees(choice, reviewer_ids, roster, rules, existing)?;
    let label = choice_label(choice, rules)?.to_string();

    let self_style = matches!(choice, RelationshipChoice::SelfReview)
        || matches!(choice, RelationshipChoice::Rule { id }
            if find_rule(rules, id).is_ok_and(|r| r.reviewee_role.is_none()));

    if self_style {
        return Ok(pool
            .into_iter()
            .map(|u| NewAssignment {
                evaluator_id: u.id,
                evaluator_name: u.name.clone(),
                evaluatee_id: u.id,
                evaluatee_name: u.name,
                relationship: label.clone(),
            })
            .collect());
    }

    if reviewee_ids.is_empty() {
        return Err(RuleError::NoReviewees);
    }
    let pool_ids: HashSet<Uuid> = pool.iter().map(|u| u.id).collect();
    for &id in reviewee_ids {
        if !pool_ids.contains(&id) {
            return Err(RuleError::InvalidReviewee(id));
        }
    }

    let mut out = Vec::with_capacity(reviewer_ids.len() * reviewee_ids.len());
    for &rid in reviewer_ids {
        let reviewer = find_user(roster, rid)?;
        for &eid in reviewee_ids {
            let reviewee = find_user(roster, eid)?;
            out.push(NewAssignment {
                evaluator_id: reviewer.id,
                evaluator_name: reviewer.name.clone(),
                evaluatee_id: reviewee.id,
                evaluatee_name: reviewee.name.clone(),
                relationship: label.clone(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u128, name: &str, role: &str) -> RosterUser {
        RosterUser {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            role: role.to_string(),
        }
    }

    fn assignment(evaluator: u128, evaluatee: u128, relationship: &str) -> ExistingAssignment {
        ExistingAssignment {
            evaluator_id: Uuid::from_u128(evaluator),
            evaluatee_id: Uuid::from_u128(evaluatee),
            relationship: relationship.to_string(),
        }
    }

    fn roster() -> Vec<RosterUser> {
        vec![
            user(1, "Ada", "Engineer"),
            user(2, "Ben", "Engineer"),
            user(3, "Cleo", "Engineer"),
            user(4, "Dan", "Engineer"),
            user(5, "Eva", "Manager"),
        ]
    }

    fn ids(raw: &[u128]) -> Vec<Uuid> {
        raw.iter().map(|&v| Uuid::from_u128(v)).collect()
    }

    #[test]
    fn peer_pool_excludes_reviewers_and_assigned_pairs() {
        let roster = roster();
        // Ada already reviews Cleo peer-to-peer.
        let existing = vec![assignment(1, 3, PEER_LABEL)];

        let pool = candidate_reviewees(
            RelationshipChoice::Peer,
            &ids(&[1, 2]),
            &roster,
            &[],
            &existing,
        )
        .unwrap();

        let pool_ids: Vec<Uuid> = pool.iter().map(|u| u.id).collect();
        // Not Ada or Ben (reviewers), not Cleo (already assigned), not Eva
        // (different role) -- only Dan remains.
        assert_eq!(pool_ids, ids(&[4]));
    }

    #[test]
    fn peer_pool_ignores_assignments_under_other_labels() {
        let roster = roster();
        let existing = vec![assignment(1, 3, "Manager Review")];

        let pool = candidate_reviewees(
            RelationshipChoice::Peer,
            &ids(&[1, 2]),
            &roster,
            &[],
            &existing,
        )
        .unwrap();

        let pool_ids: Vec<Uuid> = pool.iter().map(|u| u.id).collect();
        assert_eq!(pool_ids, ids(&[3, 4]));
    }

    #[test]
    fn peer_requires_a_single_shared_role() {
        let roster = roster();
        let err = candidate_reviewees(
            RelationshipChoice::Peer,
            &ids(&[1, 5]),
            &roster,
            &[],
            &[],
        )
        .unwrap_err();
        assert_eq!(err, RuleError::MixedRoles);
    }

    #[test]
    fn self_expansion_skips_already_assigned_reviewer() {
        let roster = roster();
        // Ada already has a self assignment.
        let existing = vec![assignment(1, 1, SELF_LABEL)];

        let records = expand(
            RelationshipChoice::SelfReview,
            &ids(&[1, 2]),
            &[],
            &roster,
            &[],
            &existing,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].evaluator_id, Uuid::from_u128(2));
        assert_eq!(records[0].evaluatee_id, Uuid::from_u128(2));
        assert_eq!(records[0].relationship, SELF_LABEL);
    }

    #[test]
    fn mixed_role_reviewers_reset_named_rule_to_peer() {
        let roster = roster();
        let rule = RuleSpec {
            id: Uuid::from_u128(100),
            label: "Reports to Manager".to_string(),
            reviewer_role: "Engineer".to_string(),
            reviewee_role: Some("Manager".to_string()),
        };
        let choice = RelationshipChoice::Rule { id: rule.id };

        // All-engineer selection: the rule holds.
        let (kept, reset) = effective_choice(choice, &ids(&[1, 2]), &roster, &[rule.clone()]);
        assert_eq!(kept, choice);
        assert!(!reset);

        // Adding a manager invalidates it: back to peer.
        let (fallback, reset) = effective_choice(choice, &ids(&[1, 5]), &roster, &[rule]);
        assert_eq!(fallback, RelationshipChoice::Peer);
        assert!(reset);
    }

    #[test]
    fn deleted_rule_resets_to_peer() {
        let roster = roster();
        let choice = RelationshipChoice::Rule {
            id: Uuid::from_u128(999),
        };
        let (fallback, reset) = effective_choice(choice, &ids(&[1]), &roster, &[]);
        assert_eq!(fallback, RelationshipChoice::Peer);
        assert!(reset);
    }

    #[test]
    fn named_rule_pool_matches_reviewee_role() {
        let roster = roster();
        let rule = RuleSpec {
            id: Uuid::from_u128(100),
            label: "Reports to Manager".to_string(),
            reviewer_role: "Engineer".to_string(),
            reviewee_role: Some("Manager".to_string()),
        };

        let pool = candidate_reviewees(
            RelationshipChoice::Rule { id: rule.id },
            &ids(&[1, 2]),
            &roster,
            &[rule],
            &[],
        )
        .unwrap();

        let pool_ids: Vec<Uuid> = pool.iter().map(|u| u.id).collect();
        assert_eq!(pool_ids, ids(&[5]));
    }

    #[test]
    fn named_rule_rejects_reviewer_outside_declared_role() {
        let roster = roster();
        let rule = RuleSpec {
            id: Uuid::from_u128(100),
            label: "Reports to Manager".to_string(),
            reviewer_role: "Engineer".to_string(),
            reviewee_role: Some("Manager".to_string()),
        };

        let err = candidate_reviewees(
            RelationshipChoice::Rule { id: rule.id },
            &ids(&[5]),
            &roster,
            &[rule],
            &[],
        )
        .unwrap_err();
        assert_eq!(err, RuleError::ReviewerRoleMismatch(Uuid::from_u128(5)));
    }

    #[test]
    fn expansion_is_the_full_cartesian_product() {
        let roster = vec![
            user(1, "Ada", "Engineer"),
            user(2, "Ben", "Engineer"),
            user(3, "Cleo", "Engineer"),
            user(4, "Dan", "Engineer"),
            user(5, "Eli", "Engineer"),
        ];

        let records = expand(
            RelationshipChoice::Peer,
            &ids(&[1, 2]),
            &ids(&[3, 4, 5]),
            &roster,
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(records.len(), 6);
        let pairs: HashSet<(Uuid, Uuid)> = records
            .iter()
            .map(|r| (r.evaluator_id, r.evaluatee_id))
            .collect();
        assert_eq!(pairs.len(), 6, "every (evaluator, evaluatee) pair distinct");
        assert!(records.iter().all(|r| r.relationship == PEER_LABEL));
    }

    #[test]
    fn empty_selections_block_submission() {
        let roster = roster();
        assert_eq!(
            expand(RelationshipChoice::Peer, &[], &ids(&[3]), &roster, &[], &[]).unwrap_err(),
            RuleError::NoReviewers
        );
        assert_eq!(
            expand(RelationshipChoice::Peer, &ids(&[1]), &[], &roster, &[], &[]).unwrap_err(),
            RuleError::NoReviewees
        );
    }

    #[test]
    fn reviewees_outside_the_pool_are_rejected() {
        let roster = roster();
        // Eva holds a different role and is not a valid peer reviewee.
        let err = expand(
            RelationshipChoice::Peer,
            &ids(&[1]),
            &ids(&[5]),
            &roster,
            &[],
            &[],
        )
        .unwrap_err();
        assert_eq!(err, RuleError::InvalidReviewee(Uuid::from_u128(5)));
    }
}
