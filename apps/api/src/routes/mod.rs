pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::{
    activities, auth, calories, challenges, chatbot, gamification, googlefit, ml, social, users,
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/auth/signup", post(auth::handlers::handle_signup))
        .route("/api/auth/signin", post(auth::handlers::handle_signin))
        .route(
            "/api/auth/callback/google-fit",
            get(googlefit::handlers::handle_callback),
        )
        // User
        .route(
            "/api/user/profile",
            get(users::handlers::handle_get_profile).patch(users::handlers::handle_update_profile),
        )
        .route("/api/user/status", patch(users::handlers::handle_update_status))
        .route("/api/users/search", get(users::handlers::handle_search))
        .route("/api/dashboard", get(users::handlers::handle_dashboard))
        // Activities, hydration, vitals
        .route(
            "/api/activities",
            get(activities::handlers::handle_list_activities)
                .post(activities::handlers::handle_log_activity),
        )
        .route(
            "/api/water",
            get(activities::hydration::handle_water_today)
                .post(activities::hydration::handle_log_water),
        )
        .route(
            "/api/vitals",
            get(activities::vitals::handle_list_vitals)
                .post(activities::vitals::handle_record_vitals),
        )
        // Calories
        .route("/api/calories", get(calories::handlers::handle_calorie_summary))
        .route(
            "/api/calories/activity",
            post(calories::handlers::handle_log_calorie_activity),
        )
        // Gamification
        .route(
            "/api/gamification",
            get(gamification::handlers::handle_achievements)
                .post(gamification::handlers::handle_award),
        )
        .route("/api/leaderboard", get(gamification::handlers::handle_leaderboard))
        // Challenges
        .route(
            "/api/challenges",
            get(challenges::handlers::handle_list_challenges)
                .post(challenges::handlers::handle_create_challenge),
        )
        .route(
            "/api/challenges/enroll",
            get(challenges::handlers::handle_list_enrollments)
                .post(challenges::handlers::handle_enroll),
        )
        .route(
            "/api/challenges/progress",
            get(challenges::handlers::handle_get_progress)
                .post(challenges::handlers::handle_update_progress),
        )
        .route(
            "/api/challenges/recommendations",
            get(challenges::handlers::handle_recommendations),
        )
        // Social
        .route(
            "/api/social/posts",
            get(social::handlers::handle_list_posts).post(social::handlers::handle_create_post),
        )
        .route(
            "/api/social/posts/:id/like",
            post(social::handlers::handle_toggle_like),
        )
        .route(
            "/api/social/posts/:id/comment",
            post(social::handlers::handle_comment),
        )
        .route(
            "/api/friends",
            get(social::friends::handle_list_friends).post(social::friends::handle_send_request),
        )
        .route(
            "/api/friends/:id",
            patch(social::friends::handle_respond).delete(social::friends::handle_remove),
        )
        // ML proxies
        .route("/api/ml/predictions", post(ml::handlers::handle_predictions))
        .route("/api/ml/motivation", post(ml::handlers::handle_motivation))
        .route("/api/ml/compare", post(ml::handlers::handle_compare))
        .route(
            "/api/ml/dropout-quantum",
            post(ml::handlers::handle_dropout_quantum),
        )
        // Assistant
        .route("/api/chatbot", post(chatbot::handlers::handle_chat))
        // Google Fit
        .route("/api/googlefit/connect", get(googlefit::handlers::handle_connect))
        .route(
            "/api/googlefit/disconnect",
            post(googlefit::handlers::handle_disconnect),
        )
        .route("/api/googlefit/data", get(googlefit::handlers::handle_data))
        .route(
            "/api/googlefit/vitals",
            post(googlefit::handlers::handle_sync_vitals),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn bearer(state: &AppState) -> String {
        let token = state
            .sessions
            .issue(Uuid::new_v4(), "runner@example.com")
            .unwrap();
        format!("Bearer {token}")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(AppState::for_tests());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "peakpulse-api");
    }

    #[tokio::test]
    async fn test_protected_route_requires_session() {
        let app = build_router(AppState::for_tests());
        let response = app
            .oneshot(Request::get("/api/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let app = build_router(AppState::for_tests());
        let response = app
            .oneshot(
                Request::get("/api/activities")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_progress_requires_challenge_id() {
        let state = AppState::for_tests();
        let auth = bearer(&state);
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::get("/api/challenges/progress")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Challenge ID is required");
    }

    #[tokio::test]
    async fn test_chatbot_without_key_reports_not_configured() {
        let state = AppState::for_tests();
        let auth = bearer(&state);
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::post("/api/chatbot")
                    .header(header::AUTHORIZATION, auth)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "Chat assistant not configured"
        );
    }

    #[tokio::test]
    async fn test_google_fit_callback_without_code_redirects_with_error() {
        let app = build_router(AppState::for_tests());
        let response = app
            .oneshot(
                Request::get("/api/auth/callback/google-fit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost:3000/dashboard/insights?error=missing_code"
        );
    }
}
