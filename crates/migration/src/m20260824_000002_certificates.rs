use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Certificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Certificates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Certificates::RegistrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Certificates::CertificateNumber)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Certificates::VerifyUrl).string().not_null())
                    .col(ColumnDef::new(Certificates::QrCode).text().not_null())
                    .col(
                        ColumnDef::new(Certificates::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Certificates::Revoked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Certificates::RevokedReason).string())
                    .col(ColumnDef::new(Certificates::RevokedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Certificates::RevokedBy).uuid())
                    .col(
                        ColumnDef::new(Certificates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Certificates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_certificates_registration")
                            .from(Certificates::Table, Certificates::RegistrationId)
                            .to(Registrations::Table, Registrations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 并发模型依赖这两个唯一索引：
        // 同一报名至多一行，编号全局不重复，竞态由存储层裁决。
        manager
            .create_index(
                Index::create()
                    .name("certificates_registration_id_idx")
                    .table(Certificates::Table)
                    .col(Certificates::RegistrationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("certificates_certificate_number_idx")
                    .table(Certificates::Table)
                    .col(Certificates::CertificateNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Certificates::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Certificates {
    Table,
    Id,
    RegistrationId,
    CertificateNumber,
    VerifyUrl,
    QrCode,
    IssuedAt,
    Revoked,
    RevokedReason,
    RevokedAt,
    RevokedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Registrations {
    Table,
    Id,
}
