//! Typed views of Planka API payloads.
//!
//! Decoding from JSON happens in one place (the Planka adapter); these records
//! only carry the fields the bridge reads. Optional fields stay optional.

/// Position that puts a card at the top of a list.
pub const POSITION_TOP: f64 = 0.0;
/// Position that appends a card to the end of a list.
pub const POSITION_END: f64 = 65535.0;
/// Gap between consecutive checklist items, leaving room for later inserts.
pub const CHECKLIST_POSITION_STEP: f64 = 65536.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Board {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Card {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub list_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskList {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Task {
    pub id: String,
    pub task_list_id: Option<String>,
    pub name: Option<String>,
    pub is_completed: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub name: Option<String>,
}

/// A card together with the records Planka includes in `GET /api/cards/{id}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CardDetails {
    pub card: Card,
    pub task_lists: Vec<TaskList>,
    pub tasks: Vec<Task>,
    pub attachments: Vec<Attachment>,
}

/// List snapshot embedded in an action's `data`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListRef {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Planka list type (`active`, `closed`, `trash`, ...).
    pub kind: Option<String>,
}

impl ListRef {
    pub fn is_trash(&self) -> bool {
        self.kind.as_deref() == Some("trash")
    }
}

/// One entry of a board's activity feed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Action {
    pub id: String,
    /// Feed type string, e.g. `createCard` or `moveCard`.
    pub kind: String,
    pub card_id: Option<String>,
    pub user_id: Option<String>,
    pub card_name: Option<String>,
    pub list: Option<ListRef>,
    pub from_list: Option<ListRef>,
    pub to_list: Option<ListRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedUser {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
}

/// One page of the activity feed, newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityPage {
    pub items: Vec<Action>,
    pub users: Vec<FeedUser>,
}
