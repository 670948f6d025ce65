use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::social::{PostCommentRow, SocialPostRow};
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::users::queries::load_users;

pub const MAX_POST_CHARS: usize = 1000;
pub const MAX_COMMENT_CHARS: usize = 500;
const DEFAULT_FEED_LIMIT: i64 = 20;
const MAX_FEED_LIMIT: i64 = 100;

// ────────────────────────────────────────────────────────────
// Views
// ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl From<&UserRow> for Author {
    fn from(u: &UserRow) -> Self {
        Author {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub author: Option<Author>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: SocialPostRow,
    pub author: Option<Author>,
    pub likes: Vec<Uuid>,
    pub likes_count: usize,
    pub comments: Vec<CommentView>,
}

// ────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub activity_id: Option<Uuid>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub success: bool,
    pub post: PostView,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub success: bool,
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: CommentView,
}

/// Trims `raw` and checks it is non-empty and at most `max` characters.
pub fn validate_text(raw: Option<&str>, max: usize, missing: &str) -> Result<String, AppError> {
    let text = raw.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(AppError::validation(missing));
    }
    if text.chars().count() > max {
        return Err(AppError::validation(format!(
            "Content must be at most {max} characters"
        )));
    }
    Ok(text.to_string())
}

/// Joins posts with their authors, likes and comments.
pub fn assemble_feed(
    posts: Vec<SocialPostRow>,
    likes: &[(Uuid, Uuid)],
    comments: Vec<PostCommentRow>,
    users: &HashMap<Uuid, UserRow>,
) -> Vec<PostView> {
    let mut likes_by_post: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (post_id, user_id) in likes {
        likes_by_post.entry(*post_id).or_default().push(*user_id);
    }

    let mut comments_by_post: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
    for c in comments {
        comments_by_post.entry(c.post_id).or_default().push(CommentView {
            id: c.id,
            author: users.get(&c.user_id).map(Author::from),
            content: c.content,
            created_at: c.created_at,
        });
    }

    posts
        .into_iter()
        .map(|post| {
            let likes = likes_by_post.remove(&post.id).unwrap_or_default();
            PostView {
                author: users.get(&post.user_id).map(Author::from),
                likes_count: likes.len(),
                likes,
                comments: comments_by_post.remove(&post.id).unwrap_or_default(),
                post,
            }
        })
        .collect()
}

async fn require_post(state: &AppState, post_id: Uuid) -> Result<SocialPostRow, AppError> {
    sqlx::query_as::<_, SocialPostRow>("SELECT * FROM social_posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))
}

// ────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────

/// POST /api/social/posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let content = validate_text(req.content.as_deref(), MAX_POST_CHARS, "Content is required")?;
    let category = req
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("general");

    let post = sqlx::query_as::<_, SocialPostRow>(
        "INSERT INTO social_posts (id, user_id, content, category, activity_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&content)
    .bind(category)
    .bind(req.activity_id)
    .fetch_one(&state.db)
    .await?;

    let users = load_users(&state.db, &[user.id]).await?;
    let mut views = assemble_feed(vec![post], &[], vec![], &users);
    let post = views
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("created post missing from view")))?;

    Ok((StatusCode::CREATED, Json(PostResponse { success: true, post })))
}

/// GET /api/social/posts?limit=20
pub async fn handle_list_posts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT);

    let posts = sqlx::query_as::<_, SocialPostRow>(
        "SELECT * FROM social_posts ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    let likes: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT post_id, user_id FROM post_likes WHERE post_id = ANY($1) ORDER BY created_at ASC",
    )
    .bind(&post_ids)
    .fetch_all(&state.db)
    .await?;

    let comments = sqlx::query_as::<_, PostCommentRow>(
        "SELECT * FROM post_comments WHERE post_id = ANY($1) ORDER BY created_at ASC",
    )
    .bind(&post_ids)
    .fetch_all(&state.db)
    .await?;

    let mut user_ids: Vec<Uuid> = posts
        .iter()
        .map(|p| p.user_id)
        .chain(comments.iter().map(|c| c.user_id))
        .collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let users = load_users(&state.db, &user_ids).await?;

    Ok(Json(FeedResponse {
        success: true,
        posts: assemble_feed(posts, &likes, comments, &users),
    }))
}

/// POST /api/social/posts/:id/like
///
/// Toggles the caller's like. Inside one transaction so the returned count
/// reflects the toggle.
pub async fn handle_toggle_like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    require_post(&state, post_id).await?;

    let mut tx = state.db.begin().await?;

    let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let liked = removed == 0;
    if liked {
        sqlx::query(
            "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    }

    let likes_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(LikeResponse {
        success: true,
        liked,
        likes_count,
    }))
}

/// POST /api/social/posts/:id/comment
pub async fn handle_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let content = validate_text(
        req.content.as_deref(),
        MAX_COMMENT_CHARS,
        "Comment content is required",
    )?;
    require_post(&state, post_id).await?;

    let row = sqlx::query_as::<_, PostCommentRow>(
        "INSERT INTO post_comments (id, post_id, user_id, content)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(post_id)
    .bind(user.id)
    .bind(&content)
    .fetch_one(&state.db)
    .await?;

    let users = load_users(&state.db, &[user.id]).await?;

    Ok(Json(CommentResponse {
        success: true,
        comment: CommentView {
            id: row.id,
            author: users.get(&user.id).map(Author::from),
            content: row.content,
            created_at: row.created_at,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(user_id: Uuid) -> SocialPostRow {
        SocialPostRow {
            id: Uuid::new_v4(),
            user_id,
            content: "Ran 5k".to_string(),
            category: "general".to_string(),
            activity_id: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_text_trims_and_limits() {
        assert_eq!(
            validate_text(Some("  hello  "), 10, "required").unwrap(),
            "hello"
        );
        assert!(validate_text(Some("   "), 10, "required").is_err());
        assert!(validate_text(None, 10, "required").is_err());
        assert!(validate_text(Some(&"x".repeat(11)), 10, "required").is_err());
        // limit counts characters, not bytes
        assert!(validate_text(Some(&"é".repeat(10)), 10, "required").is_ok());
    }

    #[test]
    fn test_assemble_feed_groups_likes_and_comments() {
        let author = UserRow::fixture();
        let fan = Uuid::new_v4();
        let first = post(author.id);
        let second = post(author.id);

        let likes = vec![(first.id, fan), (first.id, author.id)];
        let comments = vec![PostCommentRow {
            id: Uuid::new_v4(),
            post_id: second.id,
            user_id: author.id,
            content: "Nice".to_string(),
            created_at: Utc::now(),
        }];
        let users = HashMap::from([(author.id, author.clone())]);

        let feed = assemble_feed(vec![first, second], &likes, comments, &users);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].likes_count, 2);
        assert!(feed[0].comments.is_empty());
        assert_eq!(feed[1].likes_count, 0);
        assert_eq!(feed[1].comments.len(), 1);
        assert_eq!(
            feed[1].comments[0].author.as_ref().map(|a| a.name.as_str()),
            Some("Runner")
        );
    }

    #[test]
    fn test_post_view_flattens_row() {
        let author = UserRow::fixture();
        let users = HashMap::from([(author.id, author.clone())]);
        let feed = assemble_feed(vec![post(author.id)], &[], vec![], &users);
        let json = serde_json::to_value(&feed[0]).unwrap();
        assert_eq!(json["content"], "Ran 5k");
        assert_eq!(json["likesCount"], 0);
        assert_eq!(json["author"]["email"], "runner@example.com");
    }
}
