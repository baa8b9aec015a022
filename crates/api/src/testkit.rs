//! 服务层测试的共享脚手架：内存 SQLite 上跑真实迁移，
//! 并填充一条活动/用户/报名目录数据。

use chrono::Utc;
use medevents_common::entities::{events, registrations, users};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

pub const BASE_URL: &str = "https://events.example.org";

pub async fn test_db() -> DatabaseConnection {
    // 内存库随连接存亡，限制单连接以免各连接各见一个空库
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("connect sqlite");
    medevents_migration::Migrator::up(&db, None)
        .await
        .expect("run migrations");
    db
}

pub async fn seed_registration(db: &DatabaseConnection, status: &str) -> registrations::Model {
    let event = events::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Regional Cardiology Summit".to_string()),
        venue: Set(Some("Tunis".to_string())),
        starts_at: Set(Utc::now().into()),
        ends_at: Set(Utc::now().into()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("insert event");

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        full_name: Set("Dr. Amina Haddad".to_string()),
        organization: Set(Some("CHU Sahloul".to_string())),
        email: Set("amina@example.org".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("insert user");

    registrations::ActiveModel {
        id: Set(Uuid::new_v4()),
        event_id: Set(event.id),
        user_id: Set(user.id),
        status: Set(status.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("insert registration")
}
