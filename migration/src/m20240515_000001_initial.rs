use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Schools {
    Table,
    Id,
    Name,
    Slug,
    ShortName,
    Mascot,
    MailDomains,
    MailTag,
    MailDots,
    AllowSubdomains,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Students {
    Table,
    Id,
    SchoolId,
    Email,
    Hash,
    FirstName,
    LastName,
    OtherEmails,
    EmailValidatedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Contests {
    Table,
    Id,
    SchoolId,
    Name,
    StartAt,
    EndAt,
    Kind,
    InN,
    Amount,
    Prize,
    PrizeLong,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ContestEntries {
    Table,
    Id,
    StudentId,
    ContestId,
    Roll,
    AmountWon,
    RequestToken,
    CreationRequestId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EmailValidationLinks {
    Table,
    Id,
    StudentId,
    ContestEntryId,
    Email,
    Token,
    ConsumedAt,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Initial schema.
///
/// Two indexes carry the correctness of the whole system:
/// - `uq_students_school_hash`: one student row per (school, normalized email hash)
/// - `uq_contest_entries_student_contest`: one entry per (student, contest) -
///   the constraint that makes re-submitting the check form a no-op instead of
///   a fresh dice roll.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Schools::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Schools::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Schools::Name).string().not_null())
                    .col(ColumnDef::new(Schools::Slug).string().not_null())
                    .col(
                        ColumnDef::new(Schools::ShortName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Schools::Mascot)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Schools::MailDomains).json().not_null())
                    .col(ColumnDef::new(Schools::MailTag).string().null())
                    .col(
                        ColumnDef::new(Schools::MailDots)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Schools::AllowSubdomains)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Schools::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Schools::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_schools_slug")
                    .table(Schools::Table)
                    .col(Schools::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Students::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Students::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Students::SchoolId).big_integer().not_null())
                    .col(ColumnDef::new(Students::Email).string().not_null())
                    .col(ColumnDef::new(Students::Hash).string().not_null())
                    .col(ColumnDef::new(Students::FirstName).string().not_null())
                    .col(ColumnDef::new(Students::LastName).string().not_null())
                    .col(ColumnDef::new(Students::OtherEmails).json().not_null())
                    .col(
                        ColumnDef::new(Students::EmailValidatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Students::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Students::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_students_school")
                            .from(Students::Table, Students::SchoolId)
                            .to(Schools::Table, Schools::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_students_school_hash")
                    .table(Students::Table)
                    .col(Students::SchoolId)
                    .col(Students::Hash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Contests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contests::SchoolId).big_integer().not_null())
                    .col(ColumnDef::new(Contests::Name).string().not_null())
                    .col(
                        ColumnDef::new(Contests::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Contests::EndAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Contests::Kind)
                            .string_len(32)
                            .not_null()
                            .default("giveaway"),
                    )
                    .col(
                        ColumnDef::new(Contests::InN)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Contests::Amount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Contests::Prize)
                            .string()
                            .not_null()
                            .default("gift card"),
                    )
                    .col(
                        ColumnDef::new(Contests::PrizeLong)
                            .string()
                            .not_null()
                            .default("Amazon gift card"),
                    )
                    .col(
                        ColumnDef::new(Contests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Contests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contests_school")
                            .from(Contests::Table, Contests::SchoolId)
                            .to(Schools::Table, Schools::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ContestEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContestEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContestEntries::StudentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContestEntries::ContestId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContestEntries::Roll).integer().not_null())
                    .col(
                        ColumnDef::new(ContestEntries::AmountWon)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContestEntries::RequestToken)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContestEntries::CreationRequestId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ContestEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contest_entries_student")
                            .from(ContestEntries::Table, ContestEntries::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contest_entries_contest")
                            .from(ContestEntries::Table, ContestEntries::ContestId)
                            .to(Contests::Table, Contests::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_contest_entries_student_contest")
                    .table(ContestEntries::Table)
                    .col(ContestEntries::StudentId)
                    .col(ContestEntries::ContestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailValidationLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailValidationLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::StudentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::ContestEntryId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::Email)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::Token)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::ConsumedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailValidationLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_validation_links_student")
                            .from(EmailValidationLinks::Table, EmailValidationLinks::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_validation_links_entry")
                            .from(
                                EmailValidationLinks::Table,
                                EmailValidationLinks::ContestEntryId,
                            )
                            .to(ContestEntries::Table, ContestEntries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_email_validation_links_token")
                    .table(EmailValidationLinks::Table)
                    .col(EmailValidationLinks::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailValidationLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContestEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Students::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Schools::Table).to_owned())
            .await?;
        Ok(())
    }
}
