//! SeaORM implementation of UserRepository, including API tokens

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set, TransactionTrait,
};

use crate::domain::{
    CurrentUser, DomainError, NewUser, UserCredentials, UserProfile, UserRepository,
};
use crate::infrastructure::auth::generate_token_key;
use crate::models::{auth_token, review, user};

impl From<&user::Model> for CurrentUser {
    fn from(model: &user::Model) -> Self {
        CurrentUser {
            id: model.id,
            username: model.username.clone(),
            email: model.email.clone(),
            is_staff: model.is_staff,
            is_active: model.is_active,
        }
    }
}

impl From<user::Model> for UserCredentials {
    fn from(model: user::Model) -> Self {
        UserCredentials {
            user: CurrentUser::from(&model),
            password_hash: model.password_hash,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct ProfileRow {
    id: i32,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    reviews_count: i64,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            reviews_count: row.reviews_count,
        }
    }
}

fn profile_query() -> Select<user::Entity> {
    user::Entity::find()
        .column_as(
            Expr::col((review::Entity, review::Column::Id)).count(),
            "reviews_count",
        )
        .join(JoinType::LeftJoin, user::Relation::Reviews.def())
        .group_by(user::Column::Id)
}

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        Ok(user.map(UserCredentials::from))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<UserCredentials>, DomainError> {
        let user = user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(user.map(UserCredentials::from))
    }

    async fn find_by_token(&self, key: &str) -> Result<Option<CurrentUser>, DomainError> {
        let found = auth_token::Entity::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?;

        Ok(found.and_then(|(_, user)| user).map(|u| CurrentUser::from(&u)))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DomainError> {
        let count = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DomainError> {
        let count = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, new_user: NewUser) -> Result<CurrentUser, DomainError> {
        let user = user::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            password_hash: Set(new_user.password_hash),
            is_active: Set(true),
            is_staff: Set(new_user.is_staff),
            is_superuser: Set(new_user.is_superuser),
            date_joined: Set(Utc::now()),
            last_login: Set(None),
            ..Default::default()
        };

        let model = user.insert(&self.db).await?;
        tracing::info!("Created user {} ({})", model.id, model.username);
        Ok(CurrentUser::from(&model))
    }

    async fn set_password(&self, id: i32, password_hash: String) -> Result<(), DomainError> {
        let existing = user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active = existing.into_active_model();
        active.password_hash = Set(password_hash);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn record_login(&self, id: i32) -> Result<(), DomainError> {
        user::Entity::update_many()
            .col_expr(user::Column::LastLogin, Expr::value(Some(Utc::now())))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn profile(&self, id: i32) -> Result<Option<UserProfile>, DomainError> {
        let row = profile_query()
            .filter(user::Column::Id.eq(id))
            .into_model::<ProfileRow>()
            .one(&self.db)
            .await?;

        Ok(row.map(UserProfile::from))
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, DomainError> {
        let rows = profile_query()
            .order_by_asc(user::Column::Username)
            .into_model::<ProfileRow>()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn get_or_create_token(&self, user_id: i32) -> Result<String, DomainError> {
        let existing = auth_token::Entity::find()
            .filter(auth_token::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        if let Some(token) = existing {
            return Ok(token.key);
        }

        let token = auth_token::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        let model = token.insert(&self.db).await?;
        Ok(model.key)
    }

    async fn rotate_token(&self, user_id: i32) -> Result<String, DomainError> {
        let txn = self.db.begin().await?;

        auth_token::Entity::delete_many()
            .filter(auth_token::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let token = auth_token::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        let model = token.insert(&txn).await?;

        txn.commit().await?;
        Ok(model.key)
    }

    async fn delete_token(&self, user_id: i32) -> Result<(), DomainError> {
        auth_token::Entity::delete_many()
            .filter(auth_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
