use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::social::{FriendshipRow, FriendshipStatus};
use crate::models::user::UserSummary;
use crate::state::AppState;
use crate::users::queries::{find_user, load_users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendFilter {
    All,
    Friends,
    Pending,
    Sent,
}

impl FriendFilter {
    /// Unknown or missing values list everything.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("friends") => FriendFilter::Friends,
            Some("pending") => FriendFilter::Pending,
            Some("sent") => FriendFilter::Sent,
            _ => FriendFilter::All,
        }
    }

    /// Whether `f` belongs in this listing for `user_id`.
    pub fn matches(&self, f: &FriendshipRow, user_id: Uuid) -> bool {
        let pending = f.status == FriendshipStatus::Pending.as_str();
        match self {
            FriendFilter::All => f.involves(user_id),
            FriendFilter::Friends => {
                f.involves(user_id) && f.status == FriendshipStatus::Accepted.as_str()
            }
            FriendFilter::Pending => f.friend_id == user_id && pending,
            FriendFilter::Sent => f.user_id == user_id && pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendAction {
    Accept,
    Reject,
}

impl FriendAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "accept" => Some(FriendAction::Accept),
            "reject" => Some(FriendAction::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FriendsQuery {
    #[serde(rename = "type")]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub friend_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipView {
    pub id: Uuid,
    pub friend: Option<UserSummary>,
    pub status: String,
    pub requested_by: Uuid,
    pub is_sender: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub success: bool,
    pub friendships: Vec<FriendshipView>,
}

#[derive(Debug, Serialize)]
pub struct FriendshipResponse {
    pub success: bool,
    pub message: String,
    pub friendship: FriendshipRow,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Refusal message for a new request when a relationship already exists.
/// Rejected relationships may be requested again.
pub fn existing_conflict(status: &str) -> Option<&'static str> {
    match FriendshipStatus::parse(status)? {
        FriendshipStatus::Accepted => Some("Already friends"),
        FriendshipStatus::Pending => Some("Friend request already sent"),
        FriendshipStatus::Blocked => Some("Cannot send friend request"),
        FriendshipStatus::Rejected => None,
    }
}

/// The relationship between two users in either direction, if any.
pub async fn find_between(
    state: &AppState,
    a: Uuid,
    b: Uuid,
) -> Result<Option<FriendshipRow>, sqlx::Error> {
    sqlx::query_as::<_, FriendshipRow>(
        "SELECT * FROM friendships
         WHERE (user_id = $1 AND friend_id = $2) OR (user_id = $2 AND friend_id = $1)
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(&state.db)
    .await
}

async fn require_friendship(state: &AppState, id: Uuid, missing: &str) -> Result<FriendshipRow, AppError> {
    sqlx::query_as::<_, FriendshipRow>("SELECT * FROM friendships WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found(missing))
}

/// GET /api/friends?type=all|friends|pending|sent
pub async fn handle_list_friends(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FriendsQuery>,
) -> Result<Json<FriendsResponse>, AppError> {
    let rows = sqlx::query_as::<_, FriendshipRow>(
        "SELECT * FROM friendships WHERE user_id = $1 OR friend_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let filter = FriendFilter::parse(query.filter.as_deref());
    let rows: Vec<FriendshipRow> = rows
        .into_iter()
        .filter(|f| filter.matches(f, user.id))
        .collect();

    let others: Vec<Uuid> = rows.iter().map(|f| f.other_party(user.id)).collect();
    let users = load_users(&state.db, &others).await?;

    let friendships = rows
        .into_iter()
        .map(|f| {
            let friend = users.get(&f.other_party(user.id)).map(|u| u.summary());
            FriendshipView {
                id: f.id,
                friend,
                is_sender: f.user_id == user.id,
                status: f.status,
                requested_by: f.requested_by,
                created_at: f.created_at,
            }
        })
        .collect();

    Ok(Json(FriendsResponse {
        success: true,
        friendships,
    }))
}

/// POST /api/friends
pub async fn handle_send_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<FriendRequest>,
) -> Result<(StatusCode, Json<FriendshipResponse>), AppError> {
    let friend_id = req
        .friend_id
        .ok_or_else(|| AppError::validation("Friend ID is required"))?;

    if friend_id == user.id {
        return Err(AppError::validation("Cannot add yourself as a friend"));
    }

    if find_user(&state.db, friend_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let friendship = match find_between(&state, user.id, friend_id).await? {
        Some(existing) => {
            if let Some(reason) = existing_conflict(&existing.status) {
                return Err(AppError::validation(reason));
            }
            sqlx::query_as::<_, FriendshipRow>(
                "UPDATE friendships
                 SET user_id = $2, friend_id = $3, requested_by = $2, status = 'pending', updated_at = NOW()
                 WHERE id = $1
                 RETURNING *",
            )
            .bind(existing.id)
            .bind(user.id)
            .bind(friend_id)
            .fetch_one(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, FriendshipRow>(
                "INSERT INTO friendships (id, user_id, friend_id, status, requested_by)
                 VALUES ($1, $2, $3, 'pending', $2)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(user.id)
            .bind(friend_id)
            .fetch_one(&state.db)
            .await?
        }
    };

    info!("User {} sent a friend request to {friend_id}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(FriendshipResponse {
            success: true,
            message: "Friend request sent successfully".to_string(),
            friendship,
        }),
    ))
}

/// PATCH /api/friends/:id
pub async fn handle_respond(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<FriendshipResponse>, AppError> {
    let action = req
        .action
        .as_deref()
        .and_then(FriendAction::parse)
        .ok_or_else(|| AppError::validation("Invalid action"))?;

    let friendship = require_friendship(&state, id, "Friend request not found").await?;

    if friendship.friend_id != user.id {
        return Err(AppError::Forbidden(
            "Unauthorized to modify this request".to_string(),
        ));
    }

    let (status, verb) = match action {
        FriendAction::Accept => (FriendshipStatus::Accepted, "accepted"),
        FriendAction::Reject => (FriendshipStatus::Rejected, "rejected"),
    };

    let friendship = sqlx::query_as::<_, FriendshipRow>(
        "UPDATE friendships SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(FriendshipResponse {
        success: true,
        message: format!("Friend request {verb} successfully"),
        friendship,
    }))
}

/// DELETE /api/friends/:id
pub async fn handle_remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let friendship = require_friendship(&state, id, "Friendship not found").await?;

    if !friendship.involves(user.id) {
        return Err(AppError::Forbidden(
            "Unauthorized to delete this friendship".to_string(),
        ));
    }

    sqlx::query("DELETE FROM friendships WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Friendship removed successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn friendship(from: Uuid, to: Uuid, status: FriendshipStatus) -> FriendshipRow {
        FriendshipRow {
            id: Uuid::new_v4(),
            user_id: from,
            friend_id: to,
            status: status.as_str().to_string(),
            requested_by: from,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_filters() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let incoming = friendship(other, me, FriendshipStatus::Pending);
        let outgoing = friendship(me, other, FriendshipStatus::Pending);
        let accepted = friendship(other, me, FriendshipStatus::Accepted);

        assert!(FriendFilter::Pending.matches(&incoming, me));
        assert!(!FriendFilter::Pending.matches(&outgoing, me));
        assert!(FriendFilter::Sent.matches(&outgoing, me));
        assert!(!FriendFilter::Sent.matches(&incoming, me));
        assert!(FriendFilter::Friends.matches(&accepted, me));
        assert!(!FriendFilter::Friends.matches(&incoming, me));
        assert!(FriendFilter::All.matches(&incoming, me));
        assert!(!FriendFilter::All.matches(&incoming, Uuid::new_v4()));
    }

    #[test]
    fn test_existing_conflict() {
        assert_eq!(existing_conflict("accepted"), Some("Already friends"));
        assert_eq!(existing_conflict("pending"), Some("Friend request already sent"));
        assert_eq!(existing_conflict("blocked"), Some("Cannot send friend request"));
        assert_eq!(existing_conflict("rejected"), None);
    }

    #[test]
    fn test_parsing() {
        assert_eq!(FriendFilter::parse(Some("sent")), FriendFilter::Sent);
        assert_eq!(FriendFilter::parse(Some("bogus")), FriendFilter::All);
        assert_eq!(FriendFilter::parse(None), FriendFilter::All);
        assert_eq!(FriendAction::parse("accept"), Some(FriendAction::Accept));
        assert_eq!(FriendAction::parse("block"), None);
    }
}
