use sea_orm_migration::prelude::*;

mod m20260824_000001_directory;
mod m20260824_000002_certificates;
mod m20260824_000003_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260824_000001_directory::Migration),
            Box::new(m20260824_000002_certificates::Migration),
            Box::new(m20260824_000003_audit_logs::Migration),
        ]
    }
}
