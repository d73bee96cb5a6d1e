use sea_orm_migration::prelude::*;

/// Shows (节目/剧集系列，携带赔付经济参数)
#[derive(DeriveIden)]
enum Shows {
    Table,
    Id,
    ThumbnailUrl,
    Title,
    SeasonNumber,
    Description,
    MinimumAmount,
    MaximumAmount,
    PayoutAmount,
    PlotpicksVig,
    BonusKicker,
    BonusAmount,
    CreatedAt,
    UpdatedAt,
}

/// Plots (单集预测轮次)
#[derive(DeriveIden)]
enum Plots {
    Table,
    Id,
    ShowId,
    EpisodeNumber,
    PlotType,
    NumberOfQuestions,
    ActiveStartDate,
    ActiveStartTime,
    CloseEndDate,
    CloseEndTime,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// Questions (每个 plot 的问题，可独立暂停)
#[derive(DeriveIden)]
enum Questions {
    Table,
    Id,
    PlotId,
    QuestionText,
    QuestionType,
    Order,
    IsPaused,
    CorrectOptionId,
    CreatedAt,
    UpdatedAt,
}

/// Question Options (固定数量的选项)
#[derive(DeriveIden)]
enum QuestionOptions {
    Table,
    Id,
    QuestionId,
    OptionText,
    Order,
    CreatedAt,
    UpdatedAt,
}

/// Plot Predictions (用户对单个 plot 的唯一预测)
#[derive(DeriveIden)]
enum PlotPredictions {
    Table,
    Id,
    UserId,
    PlotId,
    PredictedAmount,
    CreatedAt,
    UpdatedAt,
}

/// Question Predictions (预测内每题的选项选择)
#[derive(DeriveIden)]
enum QuestionPredictions {
    Table,
    Id,
    PlotPredictionId,
    QuestionId,
    OptionId,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 金额字段统一使用美分 (big integer)，plotpicks_vig 为百分比 (double, 0-100)。
/// 唯一约束:
/// - shows(title, season_number)
/// - plots(show_id, episode_number)
/// - plot_predictions(user_id, plot_id)   并发重复提交由它兜底
/// - question_predictions(plot_prediction_id, question_id)
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 节目表
        manager
            .create_table(
                Table::create()
                    .table(Shows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Shows::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Shows::ThumbnailUrl).string_len(1024).null())
                    .col(ColumnDef::new(Shows::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Shows::SeasonNumber).integer().not_null())
                    .col(ColumnDef::new(Shows::Description).text().null())
                    .col(
                        ColumnDef::new(Shows::MinimumAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shows::MaximumAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shows::PayoutAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Shows::PlotpicksVig).double().not_null())
                    .col(
                        ColumnDef::new(Shows::BonusKicker)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Shows::BonusAmount).big_integer().null())
                    .col(
                        ColumnDef::new(Shows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Shows::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // 同名同季唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shows_title_season_unique")
                    .table(Shows::Table)
                    .col(Shows::Title)
                    .col(Shows::SeasonNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 预测轮次表
        manager
            .create_table(
                Table::create()
                    .table(Plots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Plots::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Plots::ShowId).big_integer().not_null())
                    .col(ColumnDef::new(Plots::EpisodeNumber).integer().not_null())
                    .col(ColumnDef::new(Plots::PlotType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Plots::NumberOfQuestions)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plots::ActiveStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plots::ActiveStartTime)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plots::CloseEndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plots::CloseEndTime)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plots::Status)
                            .string_len(32)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Plots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Plots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一节目下集数唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_plots_show_episode_unique")
                    .table(Plots::Table)
                    .col(Plots::ShowId)
                    .col(Plots::EpisodeNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Plots::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_plots_show")
                            .from_tbl(Plots::Table)
                            .from_col(Plots::ShowId)
                            .to_tbl(Shows::Table)
                            .to_col(Shows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 问题表
        manager
            .create_table(
                Table::create()
                    .table(Questions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Questions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Questions::PlotId).big_integer().not_null())
                    .col(ColumnDef::new(Questions::QuestionText).text().not_null())
                    .col(
                        ColumnDef::new(Questions::QuestionType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Questions::Order).integer().not_null())
                    .col(
                        ColumnDef::new(Questions::IsPaused)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Questions::CorrectOptionId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Questions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Questions::UpdatedAt)
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
                    .if_not_exists()
                    .name("idx_questions_plot")
                    .table(Questions::Table)
                    .col(Questions::PlotId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Questions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_questions_plot")
                            .from_tbl(Questions::Table)
                            .from_col(Questions::PlotId)
                            .to_tbl(Plots::Table)
                            .to_col(Plots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 选项表
        manager
            .create_table(
                Table::create()
                    .table(QuestionOptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestionOptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::QuestionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::OptionText)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QuestionOptions::Order).integer().not_null())
                    .col(
                        ColumnDef::new(QuestionOptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::UpdatedAt)
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
                    .if_not_exists()
                    .name("idx_question_options_question")
                    .table(QuestionOptions::Table)
                    .col(QuestionOptions::QuestionId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(QuestionOptions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_question_options_question")
                            .from_tbl(QuestionOptions::Table)
                            .from_col(QuestionOptions::QuestionId)
                            .to_tbl(Questions::Table)
                            .to_col(Questions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 预测表
        manager
            .create_table(
                Table::create()
                    .table(PlotPredictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlotPredictions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlotPredictions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlotPredictions::PlotId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlotPredictions::PredictedAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlotPredictions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(PlotPredictions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // 一个用户对一个 plot 只能有一条预测
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_plot_predictions_user_plot_unique")
                    .table(PlotPredictions::Table)
                    .col(PlotPredictions::UserId)
                    .col(PlotPredictions::PlotId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(PlotPredictions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_plot_predictions_plot")
                            .from_tbl(PlotPredictions::Table)
                            .from_col(PlotPredictions::PlotId)
                            .to_tbl(Plots::Table)
                            .to_col(Plots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 每题选择表
        manager
            .create_table(
                Table::create()
                    .table(QuestionPredictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestionPredictions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuestionPredictions::PlotPredictionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionPredictions::QuestionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionPredictions::OptionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionPredictions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一条预测内每题只允许一个选择
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_question_predictions_prediction_question_unique")
                    .table(QuestionPredictions::Table)
                    .col(QuestionPredictions::PlotPredictionId)
                    .col(QuestionPredictions::QuestionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_question_predictions_question")
                    .table(QuestionPredictions::Table)
                    .col(QuestionPredictions::QuestionId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(QuestionPredictions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_question_predictions_prediction")
                            .from_tbl(QuestionPredictions::Table)
                            .from_col(QuestionPredictions::PlotPredictionId)
                            .to_tbl(PlotPredictions::Table)
                            .to_col(PlotPredictions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(QuestionPredictions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_question_predictions_question")
                            .from_tbl(QuestionPredictions::Table)
                            .from_col(QuestionPredictions::QuestionId)
                            .to_tbl(Questions::Table)
                            .to_col(Questions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(QuestionPredictions::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_question_predictions_option")
                            .from_tbl(QuestionPredictions::Table)
                            .from_col(QuestionPredictions::OptionId)
                            .to_tbl(QuestionOptions::Table)
                            .to_col(QuestionOptions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：选择 -> 预测 -> 选项 -> 问题 -> plot -> show
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(QuestionPredictions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(PlotPredictions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(QuestionOptions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Questions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Plots::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Shows::Table).to_owned())
            .await?;

        Ok(())
    }
}
