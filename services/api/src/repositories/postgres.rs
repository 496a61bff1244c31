//! PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recipe_common::error::DatabaseResult;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction, migrate::Migrator};
use std::collections::HashMap;
use tracing::info;

use super::{Store, StoreTx};
use crate::models::{
    Attribute, AttributeKind, NewUser, Recipe, RecipeChanges, RecipeFields, RecipeFilter, User,
    UserChanges,
};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, created_at, updated_at";

const RECIPE_COLUMNS: &str =
    "id, user_id, title, description, time_minutes, price, link, image, created_at, updated_at";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> DatabaseResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        recipe_common::database::health_check(&self.pool).await
    }
}

#[derive(FromRow)]
struct RecipeRow {
    id: i64,
    user_id: i64,
    title: String,
    description: String,
    time_minutes: i32,
    price: Decimal,
    link: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecipeRow {
    fn into_recipe(self, tags: Vec<Attribute>, ingredients: Vec<Attribute>) -> Recipe {
        Recipe {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            time_minutes: self.time_minutes,
            price: self.price,
            link: self.link,
            image: self.image,
            tags,
            ingredients,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Transaction on [`PgStore`]; rolled back by sqlx when dropped
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTx {
    /// Attributes of `kind` linked to each of `recipe_ids`, ordered by id
    async fn load_attributes(
        &mut self,
        kind: AttributeKind,
        recipe_ids: &[i64],
    ) -> DatabaseResult<HashMap<i64, Vec<Attribute>>> {
        let mut by_recipe: HashMap<i64, Vec<Attribute>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(by_recipe);
        }

        let query = format!(
            r#"
            SELECT l.recipe_id, a.id, a.user_id, a.name
            FROM {link} l
            JOIN {table} a ON a.id = l.{column}
            WHERE l.recipe_id = ANY($1)
            ORDER BY a.id
            "#,
            link = kind.link_table(),
            table = kind.table(),
            column = kind.link_column(),
        );

        let rows = sqlx::query(&query)
            .bind(recipe_ids)
            .fetch_all(&mut *self.tx)
            .await?;

        for row in rows {
            let recipe_id: i64 = row.get("recipe_id");
            by_recipe.entry(recipe_id).or_default().push(Attribute {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
            });
        }

        Ok(by_recipe)
    }

    /// Owned recipe row with relations, with an optional locking clause
    async fn fetch_recipe(
        &mut self,
        id: i64,
        user_id: i64,
        locking: &str,
    ) -> DatabaseResult<Option<Recipe>> {
        let query = format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2 {locking}"
        );
        let row = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn assemble(&mut self, rows: Vec<RecipeRow>) -> DatabaseResult<Vec<Recipe>> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut tags = self.load_attributes(AttributeKind::Tag, &ids).await?;
        let mut ingredients = self.load_attributes(AttributeKind::Ingredient, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                row.into_recipe(
                    tags.remove(&id).unwrap_or_default(),
                    ingredients.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.email);

        let query = format!(
            r#"
            INSERT INTO users (email, name, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.password_hash)
            .bind(new_user.is_staff)
            .bind(new_user.is_superuser)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_id(&mut self, id: i64) -> DatabaseResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn update_user(
        &mut self,
        id: i64,
        changes: &UserChanges,
    ) -> DatabaseResult<Option<User>> {
        let query = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(changes.email.as_deref())
            .bind(changes.name.as_deref())
            .bind(changes.password_hash.as_deref())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_token(&mut self, user_id: i64) -> DatabaseResult<Option<String>> {
        let key = sqlx::query_scalar::<_, String>("SELECT key FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(key)
    }

    async fn insert_token(&mut self, user_id: i64, key: &str) -> DatabaseResult<()> {
        sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)")
            .bind(key)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_user_by_token(&mut self, key: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.name, u.password_hash, u.is_active, u.is_staff,
                   u.is_superuser, u.created_at, u.updated_at
            FROM users u
            JOIN auth_tokens t ON t.user_id = u.id
            WHERE t.key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn insert_recipe(&mut self, user_id: i64, fields: &RecipeFields) -> DatabaseResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.time_minutes)
        .bind(fields.price)
        .bind(&fields.link)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn find_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<Option<Recipe>> {
        self.fetch_recipe(id, user_id, "").await
    }

    async fn find_recipe_for_update(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Recipe>> {
        self.fetch_recipe(id, user_id, "FOR UPDATE").await
    }

    async fn list_recipes(
        &mut self,
        user_id: i64,
        filter: &RecipeFilter,
    ) -> DatabaseResult<Vec<Recipe>> {
        let query = format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes r
            WHERE r.user_id = $1
              AND (cardinality($2::bigint[]) = 0 OR EXISTS (
                    SELECT 1 FROM recipe_tags rt
                    WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
              AND (cardinality($3::bigint[]) = 0 OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri
                    WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
            ORDER BY r.id DESC
            "#
        );

        let rows = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(user_id)
            .bind(filter.tags.as_slice())
            .bind(filter.ingredients.as_slice())
            .fetch_all(&mut *self.tx)
            .await?;

        self.assemble(rows).await
    }

    async fn update_recipe(&mut self, id: i64, changes: &RecipeChanges) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE recipes
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                time_minutes = COALESCE($4, time_minutes),
                price = COALESCE($5, price),
                link = COALESCE($6, link),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.time_minutes)
        .bind(changes.price)
        .bind(changes.link.as_deref())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_recipe_image(&mut self, id: i64, image: Option<&str>) -> DatabaseResult<()> {
        sqlx::query("UPDATE recipes SET image = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(image)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_or_create_attribute(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute> {
        // A concurrent creator makes the insert a no-op; the follow-up select
        // runs on a fresh snapshot and sees the committed row.
        let insert = format!(
            r#"
            INSERT INTO {table} (user_id, name) VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO NOTHING
            RETURNING id, user_id, name
            "#,
            table = kind.table(),
        );

        let created = sqlx::query_as::<_, Attribute>(&insert)
            .bind(user_id)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;

        if let Some(attribute) = created {
            return Ok(attribute);
        }

        let select = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND name = $2",
            kind.table()
        );
        let attribute = sqlx::query_as::<_, Attribute>(&select)
            .bind(user_id)
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(attribute)
    }

    async fn attach_attribute(
        &mut self,
        kind: AttributeKind,
        recipe_id: i64,
        attribute_id: i64,
    ) -> DatabaseResult<()> {
        let query = format!(
            "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        );

        sqlx::query(&query)
            .bind(recipe_id)
            .bind(attribute_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn clear_attributes(
        &mut self,
        kind: AttributeKind,
        recipe_id: i64,
    ) -> DatabaseResult<()> {
        let query = format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table());
        sqlx::query(&query)
            .bind(recipe_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_attributes(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        assigned_only: bool,
    ) -> DatabaseResult<Vec<Attribute>> {
        let query = format!(
            r#"
            SELECT a.id, a.user_id, a.name
            FROM {table} a
            WHERE a.user_id = $1
              AND (NOT $2 OR EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = a.id))
            ORDER BY a.name DESC
            "#,
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        );

        let attributes = sqlx::query_as::<_, Attribute>(&query)
            .bind(user_id)
            .bind(assigned_only)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(attributes)
    }

    async fn find_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Attribute>> {
        let query = format!(
            "SELECT id, user_id, name FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        );
        let attribute = sqlx::query_as::<_, Attribute>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(attribute)
    }

    async fn rename_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute> {
        let query = format!(
            "UPDATE {} SET name = $2 WHERE id = $1 RETURNING id, user_id, name",
            kind.table()
        );
        let attribute = sqlx::query_as::<_, Attribute>(&query)
            .bind(id)
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(attribute)
    }

    async fn delete_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<bool> {
        let query = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", kind.table());
        let result = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
