use std::collections::HashMap;

use super::reconcile::Mutation;
use crate::error::{HelpdeskError, Result};
use crate::types::{classify_role, Assignment, Ticket, User, UserRef};

/// Users already fetched by this session, for naming bare ids.
#[derive(Debug, Clone, Default)]
pub struct KnownUsers(HashMap<u64, User>);

impl KnownUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: User) {
        self.0.insert(user.id, user);
    }

    pub fn get(&self, id: u64) -> Option<&User> {
        self.0.get(&id)
    }

    /// Remember every embedded user a ticket carries.
    pub fn learn_from(&mut self, ticket: &Ticket) {
        if let Some(owner) = &ticket.owner {
            self.insert(owner.clone());
        }
        let embedded = ticket
            .assignments
            .iter()
            .flat_map(|a| [&a.assigned_to, &a.assigned_by])
            .chain([&ticket.assignee])
            .flatten();
        for user_ref in embedded {
            if let UserRef::Embedded(user) = user_ref {
                self.insert(user.clone());
            }
        }
        for response in &ticket.responses {
            if let Some(author) = &response.author {
                self.insert(author.clone());
            }
        }
    }
}

impl FromIterator<User> for KnownUsers {
    fn from_iter<I: IntoIterator<Item = User>>(iter: I) -> Self {
        Self(iter.into_iter().map(|u| (u.id, u)).collect())
    }
}

impl Extend<User> for KnownUsers {
    fn extend<I: IntoIterator<Item = User>>(&mut self, iter: I) {
        for user in iter {
            self.insert(user);
        }
    }
}

/// Embedded name, then a known user with that id, then `User #<id>`, then
/// `Unassigned`.
pub fn resolve_user_name(user: Option<&UserRef>, known: &KnownUsers) -> String {
    let Some(user) = user else {
        return "Unassigned".to_string();
    };

    let embedded = match user {
        UserRef::Embedded(u) => u.display_name(),
        UserRef::Id(_) => None,
    };

    embedded
        .or_else(|| known.get(user.id()).and_then(User::display_name))
        .map(String::from)
        .unwrap_or_else(|| format!("User #{}", user.id()))
}

pub fn resolve_assignee_name(ticket: &Ticket, known: &KnownUsers) -> String {
    resolve_user_name(ticket.assignee.as_ref(), known)
}

/// "Assigned to" and "assigned by" of one history entry, named independently.
pub fn resolve_history_names(entry: &Assignment, known: &KnownUsers) -> (String, String) {
    (
        resolve_user_name(entry.assigned_to.as_ref(), known),
        resolve_user_name(entry.assigned_by.as_ref(), known),
    )
}

/// Only active administrators and superusers can take tickets.
pub fn staff_candidates(users: Vec<User>) -> Vec<User> {
    users
        .into_iter()
        .filter(|u| classify_role(u).is_admin())
        .collect()
}

/// Assignee picker state for one ticket.
///
/// `reassign` only clears the picker. The ticket keeps its server-side
/// assignee until a new pick is submitted as [`Mutation::Assign`].
#[derive(Debug, Clone)]
pub struct AssigneePicker {
    current: Option<u64>,
    selected: Option<u64>,
    candidates: Vec<User>,
}

impl AssigneePicker {
    pub fn open(ticket: &Ticket, candidates: Vec<User>) -> Self {
        let current = ticket.assignee_id();
        Self {
            current,
            selected: current,
            candidates,
        }
    }

    pub fn reassign(&mut self) {
        self.selected = None;
    }

    pub fn select(&mut self, user_id: u64) -> Result<()> {
        if !self.candidates.iter().any(|u| u.id == user_id) {
            return Err(HelpdeskError::guard(format!(
                "User #{user_id} is not an active administrator and cannot be assigned tickets."
            )));
        }
        self.selected = Some(user_id);
        Ok(())
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn candidates(&self) -> &[User] {
        &self.candidates
    }

    /// The assignment to submit, if the pick differs from the current assignee.
    pub fn into_mutation(self) -> Option<Mutation> {
        self.selected
            .filter(|id| Some(*id) != self.current)
            .map(Mutation::Assign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{sample_ticket, TicketStatus};
    use serde_json::json;

    fn named(id: u64, name: &str) -> User {
        User {
            id,
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn staff(id: u64, name: &str, profile: &str) -> User {
        serde_json::from_value(json!({
            "id": id, "name": name, "my_profile": { "name": profile }
        }))
        .unwrap()
    }

    #[test]
    fn test_name_fallback_chain() {
        let known: KnownUsers = [named(7, "Tomás")].into_iter().collect();

        let embedded = UserRef::Embedded(named(7, "Tomás Embedded"));
        assert_eq!(resolve_user_name(Some(&embedded), &known), "Tomás Embedded");
        assert_eq!(resolve_user_name(Some(&UserRef::Id(7)), &known), "Tomás");
        assert_eq!(resolve_user_name(Some(&UserRef::Id(8)), &known), "User #8");
        assert_eq!(resolve_user_name(None, &known), "Unassigned");

        // Embedded without any usable name still consults the known users.
        let nameless = UserRef::Embedded(User {
            id: 7,
            ..Default::default()
        });
        assert_eq!(resolve_user_name(Some(&nameless), &known), "Tomás");
    }

    #[test]
    fn test_history_names_resolved_separately() {
        let known: KnownUsers = [named(2, "Ana Admin")].into_iter().collect();
        let entry: Assignment = serde_json::from_value(json!({
            "id": 1,
            "assigned_to": { "id": 7, "name": "Tomás" },
            "assigned_by": 2
        }))
        .unwrap();

        let (to, by) = resolve_history_names(&entry, &known);
        assert_eq!(to, "Tomás");
        assert_eq!(by, "Ana Admin");
    }

    #[test]
    fn test_assignee_name_from_ticket() {
        let mut ticket = sample_ticket(1, TicketStatus::Open);
        let mut known = KnownUsers::new();
        assert_eq!(resolve_assignee_name(&ticket, &known), "Unassigned");

        ticket.assignee = Some(UserRef::Id(100));
        known.learn_from(&ticket);
        // The owner was embedded, so the bare id now resolves.
        assert_eq!(resolve_assignee_name(&ticket, &known), "Olga Owner");
    }

    #[test]
    fn test_staff_candidates_filter() {
        let users = vec![
            staff(1, "Ana", "Administrador"),
            staff(2, "Bea", "Usuario"),
            staff(3, "Caro", "SuperUser"),
            named(4, "Dani"),
        ];
        let ids: Vec<_> = staff_candidates(users).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_picker_reassign_is_view_only() {
        let mut ticket = sample_ticket(1, TicketStatus::Assigned);
        ticket.assignee = Some(UserRef::Id(1));
        let candidates = vec![staff(1, "Ana", "Admin"), staff(3, "Caro", "Admin")];

        let mut picker = AssigneePicker::open(&ticket, candidates.clone());
        assert_eq!(picker.selected(), Some(1));

        picker.reassign();
        assert_eq!(picker.selected(), None);
        assert_eq!(ticket.assignee_id(), Some(1));
        assert_eq!(picker.clone().into_mutation(), None);

        assert!(picker.select(99).is_err());
        picker.select(3).unwrap();
        assert_eq!(picker.into_mutation(), Some(Mutation::Assign(3)));

        // Picking the current assignee again is a no-op.
        let mut picker = AssigneePicker::open(&ticket, candidates);
        picker.select(1).unwrap();
        assert_eq!(picker.into_mutation(), None);
    }
}
