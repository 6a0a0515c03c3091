use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Account::Id).big_integer().primary_key().auto_increment())
                    .col(ColumnDef::new(Account::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Account::Email).string().not_null())
                    .col(ColumnDef::new(Account::SuspendedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Account::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Project::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Project::Id).big_integer().primary_key().auto_increment())
                    .col(ColumnDef::new(Project::Name).string().not_null())
                    .col(ColumnDef::new(Project::Description).string().not_null())
                    .col(ColumnDef::new(Project::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Membership::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Membership::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(Membership::ProjectId).big_integer().not_null())
                    .primary_key(Index::create().col(Membership::AccountId).col(Membership::ProjectId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContainerZone::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ContainerZone::Name).string().primary_key())
                    .col(ColumnDef::new(ContainerZone::DefaultRoutingIp).string().not_null())
                    .col(ColumnDef::new(ContainerZone::CpuMillicores).integer().not_null())
                    .col(ColumnDef::new(ContainerZone::MemoryMb).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DbZone::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DbZone::Name).string().primary_key())
                    .col(ColumnDef::new(DbZone::ConnectionUrl).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContainerClaim::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ContainerClaim::Id).big_integer().primary_key().auto_increment())
                    .col(ColumnDef::new(ContainerClaim::ProjectId).big_integer().not_null())
                    .col(ColumnDef::new(ContainerClaim::CreatorAccountId).big_integer().not_null())
                    .col(ColumnDef::new(ContainerClaim::Name).string().not_null())
                    .col(ColumnDef::new(ContainerClaim::ImageRef).string().not_null())
                    .col(ColumnDef::new(ContainerClaim::ImageTag).string().not_null())
                    .col(ColumnDef::new(ContainerClaim::Command).json().not_null())
                    .col(ColumnDef::new(ContainerClaim::RunType).string().not_null())
                    .col(ColumnDef::new(ContainerClaim::TargetPorts).json().not_null())
                    .col(ColumnDef::new(ContainerClaim::PublicPorts).json().not_null())
                    .col(ColumnDef::new(ContainerClaim::Zones).json().not_null())
                    .col(ColumnDef::new(ContainerClaim::EnvVarNames).json().not_null())
                    .col(ColumnDef::new(ContainerClaim::CpuMillicores).integer().not_null())
                    .col(ColumnDef::new(ContainerClaim::MemoryMb).integer().not_null())
                    .col(ColumnDef::new(ContainerClaim::NodeIp).string())
                    .col(ColumnDef::new(ContainerClaim::Status).string().not_null())
                    .col(ColumnDef::new(ContainerClaim::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ContainerClaim::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DatabaseClaim::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DatabaseClaim::Id).big_integer().primary_key().auto_increment())
                    .col(ColumnDef::new(DatabaseClaim::ProjectId).big_integer().not_null())
                    .col(ColumnDef::new(DatabaseClaim::Zones).json().not_null())
                    .col(ColumnDef::new(DatabaseClaim::DatabaseName).string().not_null())
                    .col(ColumnDef::new(DatabaseClaim::Credentials).json().not_null())
                    .col(ColumnDef::new(DatabaseClaim::Status).string().not_null())
                    .col(ColumnDef::new(DatabaseClaim::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(DatabaseClaim::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ObjectStorageClaim::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ObjectStorageClaim::Id).big_integer().primary_key().auto_increment())
                    .col(ColumnDef::new(ObjectStorageClaim::ProjectId).big_integer().not_null())
                    .col(ColumnDef::new(ObjectStorageClaim::Name).string().not_null())
                    .col(ColumnDef::new(ObjectStorageClaim::Zones).json().not_null())
                    .col(ColumnDef::new(ObjectStorageClaim::Status).string().not_null())
                    .col(ColumnDef::new(ObjectStorageClaim::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ObjectStorageClaim::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsageCounter::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UsageCounter::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(UsageCounter::ZoneName).string().not_null())
                    .col(
                        ColumnDef::new(UsageCounter::UsedCpuMillicores)
                            .integer()
                            .not_null()
                            .check(Expr::col(UsageCounter::UsedCpuMillicores).gte(0)),
                    )
                    .col(
                        ColumnDef::new(UsageCounter::UsedMemoryMb)
                            .integer()
                            .not_null()
                            .check(Expr::col(UsageCounter::UsedMemoryMb).gte(0)),
                    )
                    .primary_key(Index::create().col(UsageCounter::AccountId).col(UsageCounter::ZoneName))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Session::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Session::Token).string().primary_key())
                    .col(ColumnDef::new(Session::AccountId).big_integer().not_null())
                    .col(ColumnDef::new(Session::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApiToken::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApiToken::Token).string().primary_key())
                    .col(ColumnDef::new(ApiToken::AccountId).big_integer().not_null().unique_key())
                    .col(ColumnDef::new(ApiToken::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Billing::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Billing::ProjectId).big_integer().primary_key())
                    .col(ColumnDef::new(Billing::CurrentCredits).big_integer().not_null())
                    .col(ColumnDef::new(Billing::CreditsDelta).big_integer().not_null())
                    .col(ColumnDef::new(Billing::Details).json().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Billing::Table.into_iden(),
            ApiToken::Table.into_iden(),
            Session::Table.into_iden(),
            UsageCounter::Table.into_iden(),
            ObjectStorageClaim::Table.into_iden(),
            DatabaseClaim::Table.into_iden(),
            ContainerClaim::Table.into_iden(),
            DbZone::Table.into_iden(),
            ContainerZone::Table.into_iden(),
            Membership::Table.into_iden(),
            Project::Table.into_iden(),
            Account::Table.into_iden(),
        ] {
            manager.drop_table(Table::drop().table(table).if_exists().to_owned()).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Account {
    Table,
    Id,
    Username,
    Email,
    SuspendedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
    Name,
    Description,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Membership {
    Table,
    AccountId,
    ProjectId,
}

#[derive(DeriveIden)]
enum ContainerZone {
    Table,
    Name,
    DefaultRoutingIp,
    CpuMillicores,
    MemoryMb,
}

#[derive(DeriveIden)]
enum DbZone {
    Table,
    Name,
    ConnectionUrl,
}

#[derive(DeriveIden)]
enum ContainerClaim {
    Table,
    Id,
    ProjectId,
    CreatorAccountId,
    Name,
    ImageRef,
    ImageTag,
    Command,
    RunType,
    TargetPorts,
    PublicPorts,
    Zones,
    EnvVarNames,
    CpuMillicores,
    MemoryMb,
    NodeIp,
    Status,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum DatabaseClaim {
    Table,
    Id,
    ProjectId,
    Zones,
    DatabaseName,
    Credentials,
    Status,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum ObjectStorageClaim {
    Table,
    Id,
    ProjectId,
    Name,
    Zones,
    Status,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum UsageCounter {
    Table,
    AccountId,
    ZoneName,
    UsedCpuMillicores,
    UsedMemoryMb,
}

#[derive(DeriveIden)]
enum Session {
    Table,
    Token,
    AccountId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ApiToken {
    Table,
    Token,
    AccountId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Billing {
    Table,
    ProjectId,
    CurrentCredits,
    CreditsDelta,
    Details,
}
