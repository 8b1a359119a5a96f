//! Per-user to-do list kept in session user state.

use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

use crate::app::Query;
use crate::card;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TodoItem {
    id: String,
    label: String,
    done: bool,
}

pub async fn serve(q: Query) -> anyhow::Result<()> {
    let form = if q.args.is_set("new_todo") {
        new_todo_form()
    } else {
        if q.args.is_set("add_todo") {
            let label = q.args.get_str("label").filter(|l| !l.is_empty()).unwrap_or("Untitled");
            add_todo(&q, label)?;
        }
        let todos = toggle_todos(&q)?;
        list_form(&todos)
    };

    q.page().add(
        "form",
        card! { "view" => "form", "box" => "1 1 4 10", "items" => form },
    )?;
    q.page().save().await?;
    Ok(())
}

/// The user's items, seeded with samples on first use.
fn load(user: &mut crate::core::Expando) -> anyhow::Result<Vec<TodoItem>> {
    if let Some(todos) = user.get("todos") {
        return Ok(serde_json::from_value(todos.clone())?);
    }
    let todos: Vec<_> = ["Do this", "Do that", "Do something else"]
        .into_iter()
        .map(|label| next_item(user, label))
        .collect();
    user.set("todos", serde_json::to_value(&todos)?);
    Ok(todos)
}

fn next_item(user: &mut crate::core::Expando, label: &str) -> TodoItem {
    let seq = user.get("todo_seq").and_then(Json::as_u64).unwrap_or(0) + 1;
    user.set("todo_seq", seq);
    TodoItem {
        id: format!("todo_{seq}"),
        label: label.to_string(),
        done: false,
    }
}

fn add_todo(q: &Query, label: &str) -> anyhow::Result<()> {
    let mut user = q.user();
    let mut todos = load(&mut user)?;
    let item = next_item(&mut user, label);
    todos.insert(0, item);
    user.set("todos", serde_json::to_value(&todos)?);
    Ok(())
}

/// Apply checkbox values from the query args.
fn toggle_todos(q: &Query) -> anyhow::Result<Vec<TodoItem>> {
    let mut user = q.user();
    let mut todos = load(&mut user)?;
    for todo in &mut todos {
        if let Some(done) = q.args.get(&todo.id).and_then(Json::as_bool) {
            todo.done = done;
        }
    }
    user.set("todos", serde_json::to_value(&todos)?);
    Ok(todos)
}

fn checkbox(todo: &TodoItem) -> Json {
    json!({"checkbox": {"name": todo.id, "label": todo.label, "value": todo.done, "trigger": true}})
}

fn list_form(todos: &[TodoItem]) -> Json {
    let mut items = vec![
        json!({"text_l": {"content": "To Do"}}),
        json!({"button": {"name": "new_todo", "label": "Add To Do...", "primary": true}}),
    ];
    items.extend(todos.iter().filter(|t| !t.done).map(checkbox));
    if todos.iter().any(|t| t.done) {
        items.push(json!({"separator": {"label": "Done"}}));
        items.extend(todos.iter().filter(|t| t.done).map(checkbox));
    }
    Json::Array(items)
}

fn new_todo_form() -> Json {
    json!([
        {"text_l": {"content": "Add To Do"}},
        {"textbox": {"name": "label", "label": "What needs to be done?", "multiline": true}},
        {"buttons": {"items": [
            {"button": {"name": "add_todo", "label": "Add", "primary": true}},
            {"button": {"name": "show_todos", "label": "Back"}},
        ]}},
    ])
}
