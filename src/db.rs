// connexion BD + création du schéma

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::models::{reviews, tour_guides, tours, users};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);

    // Une base SQLite en mémoire n'existe que dans sa propre connexion
    if database_url.starts_with("sqlite::memory:") {
        options.max_connections(1).min_connections(1);
    }

    Database::connect(options).await
}

/// Crée les tables (si absentes) et l'index unique (tour_id, user_id) des reviews
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Ordre imposé par les clés étrangères
    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, tours::Entity).await?;
    create_table(db, &schema, reviews::Entity).await?;
    create_table(db, &schema, tour_guides::Entity).await?;

    let unique_review = Index::create()
        .if_not_exists()
        .name("idx_reviews_tour_user")
        .table(reviews::Entity)
        .col(reviews::Column::TourId)
        .col(reviews::Column::UserId)
        .unique()
        .to_owned();
    db.execute(backend.build(&unique_review)).await?;

    info!("Database schema is up to date");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    let db = establish_connection("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sync_schema(&db).await.expect("schema");
    db
}
