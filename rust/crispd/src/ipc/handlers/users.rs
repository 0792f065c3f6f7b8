use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{optional_str, required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Role, User};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn users_create(conn: &Connection, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: required_str(params, "name")?,
        identifier: optional_str(params, "identifier"),
    };
    db::insert_user(conn, &user)?;
    Ok(json!({ "userId": user.id }))
}

fn users_list(conn: &Connection, _params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    Ok(json!({ "users": db::list_users(conn)? }))
}

fn accounts_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let user_id = required_str(params, "userId")?;
    let email = required_str(params, "email")?.to_lowercase();
    let role: Role = match params.get("role") {
        None | Some(serde_json::Value::Null) => Role::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| ServiceError::bad_request(format!("unknown role: {}", v)))?,
    };

    if db::get_user(conn, &user_id)?.is_none() {
        return Err(ServiceError::not_found("User not found"));
    }
    if db::account_email_taken(conn, &email)? {
        return Err(ServiceError::bad_request(format!(
            "An account with email {} already exists",
            email
        )));
    }

    let account = Account {
        id: Uuid::new_v4().to_string(),
        user: user_id,
        email,
        role,
    };
    db::insert_account(conn, &account)?;
    Ok(json!({ "accountId": account.id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(with_db(state, req, users_create)),
        "users.list" => Some(with_db(state, req, users_list)),
        "accounts.create" => Some(with_db(state, req, accounts_create)),
        _ => None,
    }
}
