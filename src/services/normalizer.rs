use crate::schema::{EventAction, NewEvent};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPayload {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("ref `{0}` does not name a branch")]
    InvalidRef(String),
}

/// Which mapping rule an inbound webhook falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Push,
    PullRequestOpened,
    PullRequestMerged,
    /// Accepted but not persisted.
    Ignored,
}

pub fn classify(
    event_type: Option<&str>,
    payload: &Value,
) -> Result<Classification, MalformedPayload> {
    match event_type {
        Some("push") => Ok(Classification::Push),
        Some("pull_request") => match str_at(payload, "/action", "action")? {
            "opened" => Ok(Classification::PullRequestOpened),
            "closed" => {
                if bool_at(payload, "/pull_request/merged", "pull_request.merged")? {
                    Ok(Classification::PullRequestMerged)
                } else {
                    Ok(Classification::Ignored)
                }
            }
            _ => Ok(Classification::Ignored),
        },
        _ => Ok(Classification::Ignored),
    }
}

/// Classifies and maps in one step. `Ok(None)` means the event is accepted
/// but has nothing to persist.
pub fn normalize(
    event_type: Option<&str>,
    payload: &Value,
) -> Result<Option<NewEvent>, MalformedPayload> {
    match classify(event_type, payload)? {
        Classification::Push => map_push(payload).map(Some),
        Classification::PullRequestOpened => map_pull_request_opened(payload).map(Some),
        Classification::PullRequestMerged => map_merge(payload).map(Some),
        Classification::Ignored => Ok(None),
    }
}

pub fn map_push(payload: &Value) -> Result<NewEvent, MalformedPayload> {
    let author = str_at(payload, "/head_commit/author/name", "head_commit.author.name")?;
    let commit_id = str_at(payload, "/head_commit/id", "head_commit.id")?;
    let git_ref = str_at(payload, "/ref", "ref")?;

    Ok(NewEvent {
        id: commit_id.to_string(),
        request_id: commit_id.to_string(),
        author: author.to_string(),
        action: EventAction::Push,
        from_branch: None,
        to_branch: branch_from_ref(git_ref)?.to_string(),
    })
}

pub fn map_pull_request_opened(payload: &Value) -> Result<NewEvent, MalformedPayload> {
    let author = str_at(payload, "/pull_request/user/login", "pull_request.user.login")?;
    let (pr_id, from_branch, to_branch) = pull_request_parts(payload)?;

    Ok(NewEvent {
        id: pr_id.clone(),
        request_id: pr_id,
        author: author.to_string(),
        action: EventAction::PullRequest,
        from_branch: Some(from_branch),
        to_branch,
    })
}

pub fn map_merge(payload: &Value) -> Result<NewEvent, MalformedPayload> {
    let author = str_at(
        payload,
        "/pull_request/merged_by/login",
        "pull_request.merged_by.login",
    )?;
    let (pr_id, from_branch, to_branch) = pull_request_parts(payload)?;

    Ok(NewEvent {
        id: format!("{pr_id}_merge"),
        request_id: pr_id,
        author: author.to_string(),
        action: EventAction::Merge,
        from_branch: Some(from_branch),
        to_branch,
    })
}

fn pull_request_parts(payload: &Value) -> Result<(String, String, String), MalformedPayload> {
    let from_branch = str_at(payload, "/pull_request/head/ref", "pull_request.head.ref")?;
    let to_branch = str_at(payload, "/pull_request/base/ref", "pull_request.base.ref")?;
    let pr_id = id_at(payload, "/pull_request/id", "pull_request.id")?;
    Ok((pr_id, from_branch.to_string(), to_branch.to_string()))
}

/// `refs/heads/main` -> `main`. Only the final segment is kept.
fn branch_from_ref(git_ref: &str) -> Result<&str, MalformedPayload> {
    match git_ref.rsplit_once('/') {
        Some((_, branch)) if !branch.is_empty() => Ok(branch),
        _ => Err(MalformedPayload::InvalidRef(git_ref.to_string())),
    }
}

fn field_at<'a>(
    payload: &'a Value,
    pointer: &str,
    field: &'static str,
) -> Result<&'a Value, MalformedPayload> {
    match payload.pointer(pointer) {
        None | Some(Value::Null) => Err(MalformedPayload::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn str_at<'a>(
    payload: &'a Value,
    pointer: &str,
    field: &'static str,
) -> Result<&'a str, MalformedPayload> {
    field_at(payload, pointer, field)?
        .as_str()
        .ok_or(MalformedPayload::WrongType {
            field,
            expected: "a string",
        })
}

fn bool_at(payload: &Value, pointer: &str, field: &'static str) -> Result<bool, MalformedPayload> {
    field_at(payload, pointer, field)?
        .as_bool()
        .ok_or(MalformedPayload::WrongType {
            field,
            expected: "a boolean",
        })
}

// GitHub sends numeric ids; accept strings too so relayed payloads still map.
fn id_at(payload: &Value, pointer: &str, field: &'static str) -> Result<String, MalformedPayload> {
    match field_at(payload, pointer, field)? {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        _ => Err(MalformedPayload::WrongType {
            field,
            expected: "a number or non-empty string",
        }),
    }
}
