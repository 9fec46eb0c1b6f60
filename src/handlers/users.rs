use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for registering a user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// Address notifications are sent to (must be unique)
    #[validate(email)]
    pub email: String,
    /// Name used in greetings
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateUserRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering create_user function");
    debug!("Creating user with email: {}", request.email);

    let new_user = user::ActiveModel {
        email: Set(request.email.clone()),
        name: Set(request.name.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match new_user.insert(&state.db).await {
        Ok(user_model) => {
            info!("User created successfully with ID: {}", user_model.id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(UserResponse::from(user_model), "User created successfully")),
            ))
        }
        Err(db_error) => {
            let is_conflict = matches!(&db_error, DbErr::Exec(_) | DbErr::Query(_))
                && db_error.to_string().to_lowercase().contains("unique");
            if is_conflict {
                warn!("Email '{}' is already registered", request.email);
                return Err(ErrorResponse::new(
                    StatusCode::CONFLICT,
                    "EMAIL_ALREADY_EXISTS",
                    format!("Email '{}' is already registered", request.email),
                ));
            }
            error!("Failed to create user '{}': {}", request.email, db_error);
            Err(ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Internal server error while creating user",
            ))
        }
    }
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering get_user function for user_id: {}", user_id);

    match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(user_model)) => {
            debug!("Retrieved user {}", user_model.id);
            Ok(Json(ApiResponse::ok(
                UserResponse::from(user_model),
                "User retrieved successfully",
            )))
        }
        Ok(None) => {
            warn!("User with ID {} not found", user_id);
            Err(ErrorResponse::new(
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                format!("User with id {} does not exist", user_id),
            ))
        }
        Err(db_error) => {
            error!("Failed to retrieve user {}: {}", user_id, db_error);
            Err(ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Failed to retrieve user",
            ))
        }
    }
}
