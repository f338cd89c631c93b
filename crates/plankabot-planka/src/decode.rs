//! Planka JSON payloads -> core board records.
//!
//! Planka wraps single records in `{"item": ..}` and collections in
//! `{"items": [..]}` (some deployments return a bare array). Related records
//! come in `included`. Envelopes are unwrapped here on the `Value` level;
//! records go through the typed wire structs below. Every record field is
//! optional, and ids may be bigint strings or plain numbers.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use plankabot_core::{
    board::types::{
        Action, ActivityPage, Attachment, Board, Card, CardDetails, FeedUser, ListRef, Task,
        TaskList,
    },
    errors::Error,
    Result,
};

/// Strings and numbers become text; anything else is treated as missing.
fn lenient_text<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(d: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(d)?.as_bool().unwrap_or(false))
}

/// Nested records that are not objects (`null`, strings) decode to `None`.
fn lenient_object<'de, D, T>(d: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = Value::deserialize(d)?;
    if !v.is_object() {
        return Ok(None);
    }
    T::deserialize(v).map(Some).map_err(serde::de::Error::custom)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireBoard {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireCard {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    list_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireTask {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    task_list_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    is_completed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireListRef {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_text")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUser {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireActionData {
    #[serde(deserialize_with = "lenient_object")]
    card: Option<WireBoard>,
    #[serde(deserialize_with = "lenient_object")]
    list: Option<WireListRef>,
    #[serde(deserialize_with = "lenient_object")]
    from_list: Option<WireListRef>,
    #[serde(deserialize_with = "lenient_object")]
    to_list: Option<WireListRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireAction {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_text")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    card_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    user_id: Option<String>,
    #[serde(deserialize_with = "lenient_object")]
    data: Option<WireActionData>,
}

impl From<WireListRef> for ListRef {
    fn from(w: WireListRef) -> Self {
        ListRef {
            id: w.id,
            name: w.name,
            kind: w.kind,
        }
    }
}

fn record<T: DeserializeOwned>(v: &Value) -> Result<T> {
    T::deserialize(v).map_err(|e| {
        Error::Api(format!("Planka API returned an unexpected record: {e}"))
    })
}

/// Objects of a collection envelope, or `None` if the payload is not one.
pub fn items(payload: &Value) -> Option<Vec<&Value>> {
    let list = match payload {
        Value::Array(list) => list,
        Value::Object(map) => match (map.get("items"), map.get("item")) {
            (Some(Value::Array(list)), _) | (_, Some(Value::Array(list))) => list,
            _ => return None,
        },
        _ => return None,
    };
    Some(list.iter().filter(|v| v.is_object()).collect())
}

/// The record of a single-item envelope (or the object itself).
pub fn item(payload: &Value) -> Result<&Value> {
    match payload.get("item") {
        Some(inner) if inner.is_object() => Ok(inner),
        _ if payload.is_object() => Ok(payload),
        _ => Err(Error::Api(
            "Planka API returned an unexpected response payload".to_string(),
        )),
    }
}

fn included<'a>(payload: &'a Value, key: &str) -> Vec<&'a Value> {
    payload
        .get("included")
        .and_then(|inc| inc.get(key))
        .and_then(Value::as_array)
        .map(|list| list.iter().filter(|v| v.is_object()).collect())
        .unwrap_or_default()
}

fn all<T>(values: Vec<&Value>, decode: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    values.into_iter().map(decode).collect()
}

/// Access token from `POST /api/access-tokens`.
pub fn access_token(payload: &Value) -> Option<String> {
    payload
        .get("item")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn board(v: &Value) -> Result<Board> {
    let w: WireBoard = record(v)?;
    Ok(Board {
        id: w.id.unwrap_or_default(),
        name: w.name,
    })
}

pub fn boards(values: Vec<&Value>) -> Result<Vec<Board>> {
    all(values, board)
}

/// Boards from `GET /api/projects`, found under `included.boards`.
pub fn project_boards(payload: &Value) -> Result<Vec<Board>> {
    boards(included(payload, "boards"))
}

pub fn card(v: &Value) -> Result<Card> {
    let w: WireCard = record(v)?;
    Ok(Card {
        id: w.id.unwrap_or_default(),
        name: w.name,
        description: w.description,
        list_id: w.list_id,
    })
}

pub fn cards(values: Vec<&Value>) -> Result<Vec<Card>> {
    all(values, card)
}

pub fn task_list(v: &Value) -> Result<TaskList> {
    let w: WireBoard = record(v)?;
    Ok(TaskList {
        id: w.id.unwrap_or_default(),
        name: w.name,
    })
}

pub fn task(v: &Value) -> Result<Task> {
    let w: WireTask = record(v)?;
    Ok(Task {
        id: w.id.unwrap_or_default(),
        task_list_id: w.task_list_id,
        name: w.name,
        is_completed: w.is_completed,
    })
}

pub fn attachment(v: &Value) -> Result<Attachment> {
    let w: WireBoard = record(v)?;
    Ok(Attachment {
        id: w.id.unwrap_or_default(),
        name: w.name,
    })
}

/// `GET /api/cards/{id}`: the card plus its task lists, tasks, attachments.
pub fn card_details(payload: &Value) -> Result<CardDetails> {
    Ok(CardDetails {
        card: card(item(payload)?)?,
        task_lists: all(included(payload, "taskLists"), task_list)?,
        tasks: all(included(payload, "tasks"), task)?,
        attachments: all(included(payload, "attachments"), attachment)?,
    })
}

pub fn action(v: &Value) -> Result<Action> {
    let w: WireAction = record(v)?;
    let data = w.data.unwrap_or_default();
    Ok(Action {
        id: w.id.unwrap_or_default(),
        kind: w.kind.unwrap_or_default(),
        card_id: w.card_id,
        user_id: w.user_id,
        card_name: data.card.and_then(|c| c.name),
        list: data.list.map(ListRef::from),
        from_list: data.from_list.map(ListRef::from),
        to_list: data.to_list.map(ListRef::from),
    })
}

pub fn feed_user(v: &Value) -> Result<FeedUser> {
    let w: WireUser = record(v)?;
    Ok(FeedUser {
        id: w.id.unwrap_or_default(),
        name: w.name,
        username: w.username,
    })
}

/// `GET /api/boards/{id}/actions`: newest-first actions plus `included.users`.
pub fn activity_page(payload: &Value) -> Result<ActivityPage> {
    let items = items(payload).ok_or_else(|| {
        Error::Api("Planka API returned an unexpected activity feed payload".to_string())
    })?;
    Ok(ActivityPage {
        items: all(items, action)?,
        users: all(included(payload, "users"), feed_user)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_all_collection_envelopes() {
        let bare = json!([{"id": "1"}, 5, {"id": "2"}]);
        let wrapped = json!({"items": [{"id": "1"}]});
        let item_list = json!({"item": [{"id": "1"}]});

        assert_eq!(items(&bare).unwrap().len(), 2);
        assert_eq!(items(&wrapped).unwrap().len(), 1);
        assert_eq!(items(&item_list).unwrap().len(), 1);
        assert!(items(&json!({"item": {"id": "1"}})).is_none());
        assert!(items(&json!("nope")).is_none());
    }

    #[test]
    fn unwraps_single_item() {
        let wrapped = json!({"item": {"id": "7", "name": "Deploy"}});
        assert_eq!(
            card(item(&wrapped).unwrap()).unwrap().name.as_deref(),
            Some("Deploy")
        );

        let bare = json!({"id": "7"});
        assert_eq!(card(item(&bare).unwrap()).unwrap().id, "7");

        assert!(matches!(item(&json!([1, 2])), Err(Error::Api(_))));
    }

    #[test]
    fn tolerates_numeric_ids_and_odd_field_types() {
        let c = card(&json!({
            "id": 1573340758063187370u64,
            "listId": 42,
            "name": null,
            "description": ["not", "text"],
            "position": 65535.0
        }))
        .unwrap();
        assert_eq!(c.id, "1573340758063187370");
        assert_eq!(c.list_id.as_deref(), Some("42"));
        assert_eq!(c.name, None);
        assert_eq!(c.description, None);

        let t = task(&json!({"id": "t1", "isCompleted": "yes"})).unwrap();
        assert!(!t.is_completed);
    }

    #[test]
    fn decodes_card_details_with_included_records() {
        let payload = json!({
            "item": {"id": "c1", "name": "Release", "description": "notes"},
            "included": {
                "taskLists": [{"id": "tl1", "name": "Checklist"}],
                "tasks": [
                    {"id": "t1", "taskListId": "tl1", "name": "build", "isCompleted": true},
                    {"id": "t2", "taskListId": "tl1", "name": "test"}
                ],
                "attachments": [{"id": "a1", "name": "shot.png"}]
            }
        });
        let details = card_details(&payload).unwrap();
        assert_eq!(details.card.description.as_deref(), Some("notes"));
        assert_eq!(details.task_lists.len(), 1);
        assert!(details.tasks[0].is_completed);
        assert!(!details.tasks[1].is_completed);
        assert_eq!(details.attachments[0].name.as_deref(), Some("shot.png"));
    }

    #[test]
    fn decodes_activity_feed() {
        let payload = json!({
            "items": [
                {
                    "id": "7",
                    "type": "moveCard",
                    "cardId": "c1",
                    "userId": "u1",
                    "data": {
                        "card": {"name": "Deploy"},
                        "fromList": {"id": "l1", "name": "Todo", "type": "active"},
                        "toList": {"id": "l2", "name": "Trash", "type": "trash"}
                    }
                },
                {"id": "6", "type": "createCard", "cardId": "c2", "data": null}
            ],
            "included": {"users": [{"id": "u1", "name": "Alice", "username": "alice"}]}
        });
        let page = activity_page(&payload).unwrap();

        assert_eq!(page.items.len(), 2);
        let moved = &page.items[0];
        assert_eq!(moved.kind, "moveCard");
        assert_eq!(moved.card_name.as_deref(), Some("Deploy"));
        assert_eq!(moved.from_list.as_ref().unwrap().name.as_deref(), Some("Todo"));
        assert!(moved.to_list.as_ref().unwrap().is_trash());
        assert_eq!(page.items[1].card_name, None);
        assert_eq!(page.users[0].username.as_deref(), Some("alice"));

        assert!(activity_page(&json!({"error": "x"})).is_err());
    }

    #[test]
    fn reads_access_token_and_project_boards() {
        assert_eq!(access_token(&json!({"item": "tok"})).as_deref(), Some("tok"));
        assert_eq!(access_token(&json!({"item": ""})), None);
        assert_eq!(access_token(&json!({})), None);

        let projects = json!({"items": [], "included": {"boards": [{"id": "b1", "name": "Ops"}]}});
        assert_eq!(
            project_boards(&projects).unwrap(),
            vec![Board {
                id: "b1".into(),
                name: Some("Ops".into())
            }]
        );
        assert!(project_boards(&json!([])).unwrap().is_empty());
    }
}
